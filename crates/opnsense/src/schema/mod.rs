//! Per-kind wire tables.
//!
//! Each resource kind is described by a static [`KindSchema`]: where its
//! endpoints live, which envelope key groups its fields, and how every
//! attribute maps onto a wire key. The codec is driven entirely by these
//! tables, so adding a kind means adding a table, not new control flow.
//!
//! # Supported Kinds
//!
//! - [`firewall::RULE`] - firewall filter rules
//! - [`nat::DESTINATION`] - destination NAT
//! - [`kea::SUBNET`] and [`kea::RESERVATION`] - Kea DHCPv4
//! - [`wireguard::SERVER`] - WireGuard server instances

pub mod firewall;
pub mod kea;
pub mod nat;
pub mod wireguard;

use crate::error::{Error, Result};
use crate::identity::Identifier;
use crate::types::{Attributes, FieldType, FieldValue, ResourceKind};

/// Who sets an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Caller must set it.
    Required,
    /// Caller may set it.
    Optional,
    /// Appliance assigns it; callers may not set it.
    Computed,
    /// Caller may set it, otherwise the appliance fills it in.
    OptionalComputed,
}

impl Presence {
    /// Whether a caller-supplied value is sent on the wire.
    #[must_use]
    pub fn is_settable(&self) -> bool {
        !matches!(self, Self::Computed)
    }

    /// Short label for listings.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Computed => "computed",
            Self::OptionalComputed => "optional, computed",
        }
    }
}

/// How a value is written to its wire key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Booleans as `"1"`/`"0"`, everything else as text.
    Plain,
    /// Booleans flipped: `true` is `"0"`. Used for `disabled` keys.
    Inverted,
    /// `"1"` when true, key omitted otherwise.
    FlagWhenTrue,
    /// Kea `option_data` selection maps.
    KeaOptionData,
}

/// One attribute of a kind and its wire mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Attribute name.
    pub name: &'static str,
    /// Wire key inside the envelope.
    pub wire: &'static str,
    /// Declared type.
    pub ty: FieldType,
    /// Who sets it.
    pub presence: Presence,
    /// Wire encoding.
    pub encoding: Encoding,
    /// Wire text sent when the attribute is absent.
    pub default: Option<&'static str>,
    /// Old alias kept for compatibility.
    pub deprecated: bool,
    /// Masked in user-facing output.
    pub sensitive: bool,
}

impl FieldSpec {
    /// An optional, plainly encoded field.
    #[must_use]
    pub const fn new(name: &'static str, wire: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            wire,
            ty,
            presence: Presence::Optional,
            encoding: Encoding::Plain,
            default: None,
            deprecated: false,
            sensitive: false,
        }
    }

    /// Text field.
    #[must_use]
    pub const fn string(name: &'static str, wire: &'static str) -> Self {
        Self::new(name, wire, FieldType::String)
    }

    /// Boolean field.
    #[must_use]
    pub const fn bool(name: &'static str, wire: &'static str) -> Self {
        Self::new(name, wire, FieldType::Bool)
    }

    /// Integer field.
    #[must_use]
    pub const fn int(name: &'static str, wire: &'static str) -> Self {
        Self::new(name, wire, FieldType::Int)
    }

    /// List field.
    #[must_use]
    pub const fn list(name: &'static str, wire: &'static str) -> Self {
        Self::new(name, wire, FieldType::List)
    }

    /// Map field.
    #[must_use]
    pub const fn map(name: &'static str, wire: &'static str) -> Self {
        Self::new(name, wire, FieldType::Map)
    }

    /// Mark as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    /// Mark as appliance-assigned.
    #[must_use]
    pub const fn computed(mut self) -> Self {
        self.presence = Presence::Computed;
        self
    }

    /// Mark as settable but filled by the appliance when unset.
    #[must_use]
    pub const fn optional_computed(mut self) -> Self {
        self.presence = Presence::OptionalComputed;
        self
    }

    /// Set the wire encoding.
    #[must_use]
    pub const fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Wire text sent when the attribute is absent.
    #[must_use]
    pub const fn default(mut self, text: &'static str) -> Self {
        self.default = Some(text);
        self
    }

    /// Mark as a deprecated alias.
    #[must_use]
    pub const fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Mark as sensitive.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// Endpoint operation for a kind's controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Create.
    Add,
    /// Read by id.
    Get,
    /// Update by id.
    Set,
    /// Delete by id.
    Del,
}

impl Operation {
    /// Path prefix of the operation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Get => "get",
            Self::Set => "set",
            Self::Del => "del",
        }
    }
}

/// Wire table of one resource kind.
#[derive(Debug)]
pub struct KindSchema {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Envelope key grouping the fields.
    pub envelope: &'static str,
    /// API module (`firewall`, `kea`, ...).
    pub module: &'static str,
    /// API controller (`filter`, `dhcpv4`, ...).
    pub controller: &'static str,
    /// Item suffix of the operation endpoints (`rule`, `subnet`, ...).
    pub item: &'static str,
    /// Absolute path of the activation endpoint.
    pub activation: &'static str,
    /// Fields in encoder processing order.
    pub fields: &'static [FieldSpec],
    /// Read the object back after create to pick up generated values.
    pub read_back_after_create: bool,
}

impl KindSchema {
    /// Look up a field by attribute name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Path of an operation endpoint.
    ///
    /// ```
    /// use opnsense::{Identifier, ResourceKind};
    /// use opnsense::schema::Operation;
    ///
    /// let schema = ResourceKind::NatDestination.schema();
    /// let id = Identifier::new("abc");
    /// assert_eq!(
    ///     schema.endpoint(Operation::Set, Some(&id)),
    ///     "/api/firewall/d_nat/set_rule/abc"
    /// );
    /// ```
    #[must_use]
    pub fn endpoint(&self, op: Operation, id: Option<&Identifier>) -> String {
        let base = format!(
            "/api/{}/{}/{}_{}",
            self.module,
            self.controller,
            op.as_str(),
            self.item
        );
        match id {
            Some(id) => format!("{base}/{id}"),
            None => base,
        }
    }

    /// Check an attribute set against this table.
    ///
    /// Computed attributes may be present (they are carried from tracked
    /// state and never encoded). Network semantics such as CIDR syntax or
    /// port ranges are left to the appliance.
    pub fn validate(&self, attributes: &Attributes) -> Result<()> {
        for (name, value) in attributes {
            let field = self.field(name).ok_or_else(|| Error::UnknownAttribute {
                kind: self.kind,
                name: name.clone(),
            })?;
            if !field.ty.accepts(value) {
                return Err(Error::TypeMismatch {
                    kind: self.kind,
                    name: name.clone(),
                    expected: field.ty.name(),
                });
            }
        }
        for field in self.fields {
            if field.presence == Presence::Required && !attributes.contains_key(field.name) {
                return Err(Error::MissingAttribute {
                    kind: self.kind,
                    name: field.name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate attributes written by a user, which may not set computed ones.
    pub fn validate_declared(&self, attributes: &Attributes) -> Result<()> {
        if let Some(field) = self
            .fields
            .iter()
            .find(|f| f.presence == Presence::Computed && attributes.contains_key(f.name))
        {
            return Err(Error::ComputedAttribute {
                kind: self.kind,
                name: field.name.to_string(),
            });
        }
        self.validate(attributes)
    }

    /// Turn integers given for text fields into text.
    pub fn normalize(&self, attributes: &mut Attributes) {
        for (name, value) in attributes.iter_mut() {
            let Some(field) = self.field(name) else {
                continue;
            };
            if let (FieldType::String, FieldValue::Int(i)) = (field.ty, &*value) {
                *value = FieldValue::String(i.to_string());
            }
        }
    }

    /// Render a value for display, masking sensitive fields.
    #[must_use]
    pub fn display_value(&self, name: &str, value: &FieldValue) -> String {
        match self.field(name) {
            Some(field) if field.sensitive => "(sensitive)".to_string(),
            _ => value.to_string(),
        }
    }

    /// Attributes that are compared when planning changes.
    pub fn diffable_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields
            .iter()
            .filter(|f| f.presence != Presence::Computed)
    }
}

/// Wire table for a kind.
#[must_use]
pub fn for_kind(kind: ResourceKind) -> &'static KindSchema {
    match kind {
        ResourceKind::FirewallRule => &firewall::RULE,
        ResourceKind::NatDestination => &nat::DESTINATION,
        ResourceKind::KeaSubnet => &kea::SUBNET,
        ResourceKind::KeaReservation => &kea::RESERVATION,
        ResourceKind::WireguardServer => &wireguard::SERVER,
    }
}
