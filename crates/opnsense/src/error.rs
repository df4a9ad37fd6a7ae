//! Error types for appliance synchronization.
//!
//! Every failure surfaced by the engine carries a structured kind so callers
//! can tell a dead network apart from a rejected payload. Categories mirror
//! the layers a request passes through: transport, HTTP status, response
//! body, and the local descriptor itself.

use crate::types::ResourceKind;
use std::fmt;

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of synchronization errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// DNS, connect, TLS, or timeout failure before a status was received.
    Transport,
    /// The appliance answered with a non-2xx status.
    Protocol,
    /// A 2xx answer whose body encodes a rejection.
    Validation,
    /// A 2xx answer that matches no known success or failure shape.
    UnrecognizedShape,
    /// The descriptor does not fit its kind's schema.
    Schema,
    /// The identity tracker was used out of order.
    State,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    ///
    /// Advisory only. The engine itself never retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transport => "Appliance unreachable",
            Self::Protocol => "Appliance returned an HTTP error",
            Self::Validation => "Appliance rejected the object",
            Self::UnrecognizedShape => "Unrecognized appliance response",
            Self::Schema => "Invalid resource attributes",
            Self::State => "Inconsistent tracked state",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Transport => "Check the appliance host, network path and TLS settings",
            Self::Protocol => "Verify the API key has access to this module and the plugin is installed",
            Self::Validation => "Fix the listed fields and apply again",
            Self::UnrecognizedShape => {
                "The API version may differ from the one supported; run with -vvv to see the raw body"
            }
            Self::Schema => "Run `opnsync kinds` to list the attributes each kind accepts",
            Self::State => "Run `opnsync refresh` or remove the entry with `opnsync state rm`",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while synchronizing a managed object.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced an HTTP status.
    #[error("transport failure for {url}: {message}")]
    Transport {
        /// Target URL.
        url: String,
        /// Underlying failure.
        message: String,
    },

    /// Non-2xx status. The body is kept verbatim.
    #[error("HTTP {status} from {url}: {body}")]
    Protocol {
        /// Target URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The appliance rejected the object.
    #[error("{kind} rejected: {}", messages.join("; "))]
    Validation {
        /// Kind being mutated.
        kind: ResourceKind,
        /// One entry per rejected field or array element.
        messages: Vec<String>,
    },

    /// A create answered 2xx with nothing in the body.
    #[error("{kind} {operation} returned an empty body")]
    EmptyResponse {
        /// Kind being mutated.
        kind: ResourceKind,
        /// Operation name.
        operation: &'static str,
    },

    /// No identifier and no known failure shape.
    #[error("no identifier in {kind} response: {body}")]
    UnrecognizedShape {
        /// Kind being processed.
        kind: ResourceKind,
        /// Raw response body.
        body: String,
    },

    /// A required attribute is absent.
    #[error("{kind}: missing required attribute `{name}`")]
    MissingAttribute {
        /// Resource kind.
        kind: ResourceKind,
        /// Attribute name.
        name: String,
    },

    /// The attribute is not part of the kind's schema.
    #[error("{kind}: unknown attribute `{name}`")]
    UnknownAttribute {
        /// Resource kind.
        kind: ResourceKind,
        /// Attribute name.
        name: String,
    },

    /// The attribute value has the wrong type.
    #[error("{kind}: attribute `{name}` must be a {expected}")]
    TypeMismatch {
        /// Resource kind.
        kind: ResourceKind,
        /// Attribute name.
        name: String,
        /// Expected type name.
        expected: &'static str,
    },

    /// A server-assigned attribute was set by the caller.
    #[error("{kind}: attribute `{name}` is computed by the appliance")]
    ComputedAttribute {
        /// Resource kind.
        kind: ResourceKind,
        /// Attribute name.
        name: String,
    },

    /// Unknown resource kind name.
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    /// An operation that needs an identifier was given an unmanaged object.
    #[error("{kind} has no assigned identifier")]
    NotManaged {
        /// Resource kind.
        kind: ResourceKind,
    },

    /// Create was asked for an object that already has an identifier.
    #[error("{kind} is already managed as {id}")]
    AlreadyManaged {
        /// Resource kind.
        kind: ResourceKind,
        /// Identifier already tracked.
        id: String,
    },

    /// The appliance handed back a different identifier for a tracked object.
    #[error("identifier is immutable: tracked {current}, got {proposed}")]
    IdentifierConflict {
        /// Identifier already tracked.
        current: String,
        /// Identifier that was offered.
        proposed: String,
    },

    /// An identifier that cannot be used as a single URL path segment.
    #[error("invalid identifier '{0}': expected letters, digits, '-' or '_'")]
    InvalidIdentifier(String),
}

impl Error {
    /// Create a transport error.
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transport { .. } => ErrorCategory::Transport,
            Error::Protocol { .. } => ErrorCategory::Protocol,
            Error::Validation { .. } => ErrorCategory::Validation,
            Error::EmptyResponse { .. } => ErrorCategory::Validation,
            Error::UnrecognizedShape { .. } => ErrorCategory::UnrecognizedShape,
            Error::MissingAttribute { .. }
            | Error::UnknownAttribute { .. }
            | Error::TypeMismatch { .. }
            | Error::ComputedAttribute { .. }
            | Error::UnknownKind(_) => ErrorCategory::Schema,
            Error::NotManaged { .. }
            | Error::AlreadyManaged { .. }
            | Error::IdentifierConflict { .. }
            | Error::InvalidIdentifier(_) => ErrorCategory::State,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Field-level messages for validation failures, empty otherwise.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        match self {
            Error::Validation { messages, .. } => messages,
            _ => &[],
        }
    }
}
