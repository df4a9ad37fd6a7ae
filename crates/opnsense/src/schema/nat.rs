//! Destination NAT (`/api/firewall/d_nat`).
//!
//! This controller nests source and destination under dotted keys and names
//! the redirect port `local-port`. It also stores `disabled` rather than
//! `enabled`.

use super::{Encoding, FieldSpec, KindSchema};
use crate::types::ResourceKind;

/// Port forward table.
pub static DESTINATION: KindSchema = KindSchema {
    kind: ResourceKind::NatDestination,
    envelope: "destination",
    module: "firewall",
    controller: "d_nat",
    item: "rule",
    activation: "/api/firewall/d_nat/apply",
    fields: &[
        FieldSpec::bool("enabled", "disabled")
            .encoding(Encoding::Inverted)
            .default("0"),
        FieldSpec::int("sequence", "sequence"),
        FieldSpec::string("interface", "interface").required(),
        FieldSpec::string("protocol", "protocol").required(),
        FieldSpec::string("ip_protocol", "ipprotocol"),
        FieldSpec::string("source_net", "source.network"),
        FieldSpec::string("source_port", "source.port"),
        FieldSpec::bool("source_not", "source.not").encoding(Encoding::FlagWhenTrue),
        FieldSpec::string("destination_net", "destination.network"),
        FieldSpec::string("destination_port", "destination.port").required(),
        FieldSpec::bool("destination_not", "destination.not").encoding(Encoding::FlagWhenTrue),
        FieldSpec::string("target_ip", "target").required(),
        FieldSpec::string("target_port", "local-port").required(),
        FieldSpec::string("description", "descr"),
        FieldSpec::bool("log", "log").encoding(Encoding::FlagWhenTrue),
        FieldSpec::string("nat_reflection", "natreflection"),
    ],
    read_back_after_create: false,
};
