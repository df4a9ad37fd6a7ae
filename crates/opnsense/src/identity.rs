//! Identity tracking for managed objects.
//!
//! The appliance owns identifiers. Locally they are only cached: assigned
//! once after a successful create and released when the object is deleted
//! or found missing.

use crate::error::{Error, Result};
use crate::types::ResourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier assigned by the appliance (a UUID in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse user input, accepting only text that is safe as one path segment.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::InvalidIdentifier(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Raw identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a managed object sits in its lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Identity {
    /// Never successfully created.
    #[default]
    Unmanaged,
    /// Corresponds to exactly one remote object.
    Managed(Identifier),
    /// Deleted, or found absent on read.
    Removed {
        /// Identifier the object had while managed.
        last: Identifier,
    },
}

impl Identity {
    /// Record the identifier returned by a create.
    ///
    /// Re-assigning the same identifier is a no-op. A different one is
    /// rejected since identifiers never change for the lifetime of an object.
    pub fn assign(&mut self, id: Identifier) -> Result<()> {
        match self {
            Identity::Managed(current) if *current == id => Ok(()),
            Identity::Managed(current) => Err(Error::IdentifierConflict {
                current: current.to_string(),
                proposed: id.to_string(),
            }),
            Identity::Unmanaged | Identity::Removed { .. } => {
                *self = Identity::Managed(id);
                Ok(())
            }
        }
    }

    /// Drop the identifier, returning it if one was held.
    pub fn release(&mut self) -> Option<Identifier> {
        match std::mem::take(self) {
            Identity::Managed(id) => {
                *self = Identity::Removed { last: id.clone() };
                Some(id)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    /// Identifier for addressing the object, if managed.
    #[must_use]
    pub fn identifier(&self) -> Option<&Identifier> {
        match self {
            Identity::Managed(id) => Some(id),
            _ => None,
        }
    }

    /// Identifier or a state error naming the kind.
    pub fn require(&self, kind: ResourceKind) -> Result<&Identifier> {
        self.identifier().ok_or(Error::NotManaged { kind })
    }

    /// Whether an identifier is held.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        matches!(self, Identity::Managed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_from_unmanaged() {
        let mut identity = Identity::default();
        assert!(!identity.is_managed());
        identity.assign(Identifier::new("abc")).unwrap();
        assert_eq!(identity.identifier().unwrap().as_str(), "abc");
    }

    #[test]
    fn test_assign_same_id_is_noop() {
        let mut identity = Identity::Managed(Identifier::new("abc"));
        identity.assign(Identifier::new("abc")).unwrap();
        assert!(identity.is_managed());
    }

    #[test]
    fn test_assign_different_id_rejected() {
        let mut identity = Identity::Managed(Identifier::new("abc"));
        let err = identity.assign(Identifier::new("def")).unwrap_err();
        assert!(matches!(err, Error::IdentifierConflict { .. }));
        assert_eq!(identity.identifier().unwrap().as_str(), "abc");
    }

    #[test]
    fn test_release() {
        let mut identity = Identity::Managed(Identifier::new("abc"));
        assert_eq!(identity.release(), Some(Identifier::new("abc")));
        assert_eq!(
            identity,
            Identity::Removed {
                last: Identifier::new("abc")
            }
        );
        assert!(identity.identifier().is_none());
        assert_eq!(identity.release(), None);
    }

    #[test]
    fn test_require() {
        let identity = Identity::Unmanaged;
        let err = identity.require(ResourceKind::KeaSubnet).unwrap_err();
        assert!(matches!(err, Error::NotManaged { .. }));
    }

    #[test]
    fn test_parse_accepts_uuid() {
        let id = Identifier::parse(" 3f2b8c1e-0d4a-4e6f-9a7b-1c2d3e4f5a6b ").unwrap();
        assert_eq!(id.as_str(), "3f2b8c1e-0d4a-4e6f-9a7b-1c2d3e4f5a6b");
    }

    #[test]
    fn test_parse_rejects_non_segment_text() {
        for raw in ["", "   ", "a/b", "x?y", "..", "a#b", "a%2Fb"] {
            let err = Identifier::parse(raw).unwrap_err();
            assert!(matches!(err, Error::InvalidIdentifier(_)), "{raw:?}");
        }
    }

    #[test]
    fn test_identifier_serde_transparent() {
        let id = Identifier::new("1234-5678");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"1234-5678\"");
    }
}
