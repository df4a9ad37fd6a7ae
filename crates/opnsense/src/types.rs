//! Core types for managed appliance objects.
//!
//! A [`Descriptor`] is the unit of reconciliation: a resource kind, the
//! identity the appliance assigned to it (if any), and a typed attribute set.

use crate::error::{Error, Result};
use crate::identity::{Identifier, Identity};
use crate::schema::{self, KindSchema, Presence};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Supported resource kinds.
///
/// # Example
///
/// ```
/// use opnsense::ResourceKind;
///
/// let kind: ResourceKind = "nat_destination".parse().unwrap();
/// assert_eq!(kind, ResourceKind::NatDestination);
/// assert_eq!(kind.schema().envelope, "destination");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Firewall filter rule.
    FirewallRule,
    /// Destination NAT (port forward).
    NatDestination,
    /// Kea DHCPv4 subnet.
    KeaSubnet,
    /// Kea DHCPv4 static reservation.
    KeaReservation,
    /// WireGuard server instance.
    WireguardServer,
}

impl ResourceKind {
    /// Kind name as used in config files and state keys.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FirewallRule => "firewall_rule",
            Self::NatDestination => "nat_destination",
            Self::KeaSubnet => "kea_subnet",
            Self::KeaReservation => "kea_reservation",
            Self::WireguardServer => "wireguard_server",
        }
    }

    /// Wire table for this kind.
    #[must_use]
    pub fn schema(&self) -> &'static KindSchema {
        schema::for_kind(*self)
    }

    /// All supported kinds.
    #[must_use]
    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::FirewallRule,
            ResourceKind::NatDestination,
            ResourceKind::KeaSubnet,
            ResourceKind::KeaReservation,
            ResourceKind::WireguardServer,
        ]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| Error::UnknownKind(s.to_string()))
    }
}

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Free text.
    String,
    /// Boolean, sent as `"1"`/`"0"`.
    Bool,
    /// Integer, sent as decimal text.
    Int,
    /// List of strings, sent comma-joined.
    List,
    /// String to string map.
    Map,
}

impl FieldType {
    /// Type name for messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::List => "list",
            Self::Map => "map",
        }
    }

    /// Whether `value` can be stored in a field of this type.
    ///
    /// String fields also take integers so ports can be written unquoted.
    #[must_use]
    pub fn accepts(&self, value: &FieldValue) -> bool {
        matches!(
            (self, value),
            (Self::String, FieldValue::String(_) | FieldValue::Int(_))
                | (Self::Bool, FieldValue::Bool(_))
                | (Self::Int, FieldValue::Int(_))
                | (Self::List, FieldValue::List(_))
                | (Self::Map, FieldValue::Map(_))
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Text.
    String(String),
    /// List of strings.
    List(Vec<String>),
    /// Map of strings.
    Map(BTreeMap<String, String>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => write!(f, "[{}]", items.join(", ")),
            Self::Map(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
                write!(f, "{{{}}}", pairs.join(", "))
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// Attribute set of a descriptor, keyed by attribute name.
pub type Attributes = BTreeMap<String, FieldValue>;

/// Desired or observed state of one managed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Identity assigned by the appliance.
    pub identity: Identity,
    /// Typed attributes.
    pub attributes: Attributes,
}

impl Descriptor {
    /// Create an unmanaged descriptor.
    #[must_use]
    pub fn new(kind: ResourceKind, attributes: Attributes) -> Self {
        Self {
            kind,
            identity: Identity::Unmanaged,
            attributes,
        }
    }

    /// Create a descriptor that already tracks an identifier.
    #[must_use]
    pub fn managed(kind: ResourceKind, id: Identifier, attributes: Attributes) -> Self {
        Self {
            kind,
            identity: Identity::Managed(id),
            attributes,
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    /// Check attributes against the kind's schema.
    pub fn validate(&self) -> Result<()> {
        self.kind.schema().validate(&self.attributes)
    }

    /// Coerce integer literals given for text fields into text.
    pub fn normalize(&mut self) {
        self.kind.schema().normalize(&mut self.attributes);
    }

    /// Identifier if the object is managed.
    #[must_use]
    pub fn id(&self) -> Option<&Identifier> {
        self.identity.identifier()
    }

    /// Copy server-assigned attributes from a tracked copy.
    ///
    /// Computed attributes are always taken from `prior`. Optional-computed
    /// ones only when this descriptor leaves them unset.
    pub fn carry_computed(&mut self, prior: &Descriptor) {
        for field in self.kind.schema().fields {
            let carry = match field.presence {
                Presence::Computed => true,
                Presence::OptionalComputed => !self.attributes.contains_key(field.name),
                Presence::Required | Presence::Optional => false,
            };
            if !carry {
                continue;
            }
            match prior.attributes.get(field.name) {
                Some(value) => {
                    self.attributes.insert(field.name.to_string(), value.clone());
                }
                None if field.presence == Presence::Computed => {
                    self.attributes.remove(field.name);
                }
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ResourceKind::all() {
            assert_eq!(kind.name().parse::<ResourceKind>().unwrap(), *kind);
            assert_eq!(kind.to_string(), kind.name());
        }
        assert!("dns_override".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_kind_serde_snake_case() {
        let json = serde_json::to_string(&ResourceKind::KeaReservation).unwrap();
        assert_eq!(json, "\"kea_reservation\"");
    }

    #[test]
    fn test_field_value_untagged() {
        let value: FieldValue = serde_json::from_str("true").unwrap();
        assert_eq!(value, FieldValue::Bool(true));
        let value: FieldValue = serde_json::from_str("51820").unwrap();
        assert_eq!(value, FieldValue::Int(51820));
        let value: FieldValue = serde_json::from_str("\"lan\"").unwrap();
        assert_eq!(value, FieldValue::String("lan".to_string()));
        let value: FieldValue = serde_json::from_str("[\"a\",\"b\"]").unwrap();
        assert_eq!(value, FieldValue::List(vec!["a".into(), "b".into()]));
        let value: FieldValue = serde_json::from_str("{\"domain-name\":\"lan\"}").unwrap();
        assert!(matches!(value, FieldValue::Map(_)));
    }

    #[test]
    fn test_field_type_accepts() {
        assert!(FieldType::String.accepts(&FieldValue::Int(443)));
        assert!(!FieldType::Int.accepts(&FieldValue::String("443".into())));
        assert!(!FieldType::Bool.accepts(&FieldValue::String("1".into())));
        assert!(FieldType::List.accepts(&FieldValue::List(vec![])));
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::from("lan").to_string(), "\"lan\"");
        assert_eq!(
            FieldValue::List(vec!["a".into(), "b".into()]).to_string(),
            "[a, b]"
        );
    }

    #[test]
    fn test_carry_computed() {
        let prior = Descriptor::managed(
            ResourceKind::WireguardServer,
            Identifier::new("wg-1"),
            Attributes::new(),
        )
        .with("public_key", "PUB")
        .with("private_key", "PRIV")
        .with("name", "old");

        let mut desired = Descriptor::new(ResourceKind::WireguardServer, Attributes::new())
            .with("name", "wg0");
        desired.carry_computed(&prior);

        assert_eq!(desired.attributes["public_key"], FieldValue::from("PUB"));
        assert_eq!(desired.attributes["private_key"], FieldValue::from("PRIV"));
        assert_eq!(desired.attributes["name"], FieldValue::from("wg0"));

        let mut explicit = Descriptor::new(ResourceKind::WireguardServer, Attributes::new())
            .with("private_key", "MINE");
        explicit.carry_computed(&prior);
        assert_eq!(explicit.attributes["private_key"], FieldValue::from("MINE"));
    }

    #[test]
    fn test_normalize_int_to_string() {
        let mut desc = Descriptor::new(ResourceKind::NatDestination, Attributes::new())
            .with("destination_port", 443_i64)
            .with("sequence", 10_i64);
        desc.normalize();
        assert_eq!(desc.attributes["destination_port"], FieldValue::from("443"));
        assert_eq!(desc.attributes["sequence"], FieldValue::Int(10));
    }
}
