//! Kea DHCPv4 subnets and reservations (`/api/kea/dhcpv4`).
//!
//! Both kinds share the Kea service reconfigure endpoint.

use super::{Encoding, FieldSpec, KindSchema};
use crate::types::ResourceKind;

const RECONFIGURE: &str = "/api/kea/service/reconfigure";

/// Subnet table.
///
/// `option_data` keys are Kea option names (`domain-name-servers`,
/// `routers`, ...). They are written as single-selection option maps.
pub static SUBNET: KindSchema = KindSchema {
    kind: ResourceKind::KeaSubnet,
    envelope: "subnet4",
    module: "kea",
    controller: "dhcpv4",
    item: "subnet",
    activation: RECONFIGURE,
    fields: &[
        FieldSpec::string("subnet", "subnet").required(),
        FieldSpec::string("pools", "pools"),
        FieldSpec::string("description", "description"),
        FieldSpec::bool("auto_collect", "option_data_autocollect").default("1"),
        FieldSpec::map("option_data", "option_data").encoding(Encoding::KeaOptionData),
    ],
    read_back_after_create: false,
};

/// Static reservation table. `subnet` holds the parent subnet's identifier.
pub static RESERVATION: KindSchema = KindSchema {
    kind: ResourceKind::KeaReservation,
    envelope: "reservation4",
    module: "kea",
    controller: "dhcpv4",
    item: "reservation",
    activation: RECONFIGURE,
    fields: &[
        FieldSpec::string("subnet", "subnet").required(),
        FieldSpec::string("ip_address", "ip_address").required(),
        FieldSpec::string("hw_address", "hw_address").required(),
        FieldSpec::string("hostname", "hostname"),
        FieldSpec::string("description", "description"),
    ],
    read_back_after_create: false,
};
