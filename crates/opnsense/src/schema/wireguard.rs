//! WireGuard server instances (`/api/wireguard/server`).

use super::{Encoding, FieldSpec, KindSchema};
use crate::types::ResourceKind;

/// Server table.
///
/// The appliance generates a key pair when `private_key` is left unset, so
/// the object is read back after create.
pub static SERVER: KindSchema = KindSchema {
    kind: ResourceKind::WireguardServer,
    envelope: "server",
    module: "wireguard",
    controller: "server",
    item: "server",
    activation: "/api/wireguard/service/reconfigure",
    fields: &[
        FieldSpec::string("name", "name").required(),
        FieldSpec::bool("enabled", "enabled").default("1"),
        FieldSpec::string("public_key", "pubkey").computed(),
        FieldSpec::string("private_key", "privkey")
            .optional_computed()
            .sensitive(),
        FieldSpec::int("listen_port", "port").required(),
        FieldSpec::string("tunnel_address", "tunneladdress").required(),
        FieldSpec::list("peers", "peers"),
        FieldSpec::bool("disable_routes", "disableroutes").encoding(Encoding::FlagWhenTrue),
        FieldSpec::string("dns", "dns"),
        FieldSpec::int("mtu", "mtu"),
        FieldSpec::string("gateway", "gateway"),
    ],
    read_back_after_create: true,
};
