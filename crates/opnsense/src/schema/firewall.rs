//! Firewall filter rules (`/api/firewall/filter`).

use super::{FieldSpec, KindSchema};
use crate::types::ResourceKind;

/// Filter rule table.
///
/// `invert` is the old name of `destination_not`. Both write the same wire
/// key and the later entry wins when both are set.
pub static RULE: KindSchema = KindSchema {
    kind: ResourceKind::FirewallRule,
    envelope: "rule",
    module: "firewall",
    controller: "filter",
    item: "rule",
    activation: "/api/firewall/filter/apply",
    fields: &[
        FieldSpec::string("description", "description").required(),
        FieldSpec::string("interface", "interface"),
        FieldSpec::string("direction", "direction").default("in"),
        FieldSpec::string("ip_protocol", "ipprotocol").default("inet"),
        FieldSpec::string("protocol", "protocol").required(),
        FieldSpec::string("source_net", "source_net").required(),
        FieldSpec::string("source_port", "source_port"),
        FieldSpec::bool("source_not", "source_not"),
        FieldSpec::string("destination_net", "destination_net").required(),
        FieldSpec::string("destination_port", "destination_port"),
        FieldSpec::bool("invert", "destination_not").deprecated(),
        FieldSpec::bool("destination_not", "destination_not"),
        FieldSpec::string("action", "action").default("pass"),
        FieldSpec::bool("enabled", "enabled").default("1"),
        FieldSpec::bool("log", "log"),
        FieldSpec::bool("quick", "quick"),
        FieldSpec::int("sequence", "sequence"),
        FieldSpec::list("categories", "category"),
    ],
    read_back_after_create: false,
};
