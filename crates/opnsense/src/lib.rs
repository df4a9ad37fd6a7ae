//! # opnsense
//!
//! Synchronization engine for OPNsense configuration objects.
//!
//! This crate provides functionality for:
//! - Translating typed descriptors into the API's wire format and back
//! - Creating, reading, updating and deleting one object at a time
//! - Telling success, rejection and absence apart in 2xx answers
//! - Activating staged changes after every mutation
//!
//! ## Example
//!
//! ```no_run
//! use opnsense::{Attributes, Client, ClientConfig, Credentials, Descriptor, ResourceKind};
//!
//! let config = ClientConfig::new("https://192.168.1.1", Credentials::new("key", "secret"));
//! let client = Client::new(&config);
//!
//! let reservation = Descriptor::new(ResourceKind::KeaReservation, Attributes::new())
//!     .with("subnet", "6f1c0a1e-7d0b-4d51-9a53-1b2b5f0a7c11")
//!     .with("ip_address", "192.168.1.50")
//!     .with("hw_address", "aa:bb:cc:dd:ee:ff");
//!
//! let created = client.create(&reservation).expect("create failed");
//! println!("tracked as {}", created.descriptor.id().unwrap());
//! ```
//!
//! ## Supported Kinds
//!
//! | Kind             | Endpoints                     | Activation                        |
//! |------------------|-------------------------------|-----------------------------------|
//! | firewall_rule    | /api/firewall/filter/*_rule   | /api/firewall/filter/apply        |
//! | nat_destination  | /api/firewall/d_nat/*_rule    | /api/firewall/d_nat/apply         |
//! | kea_subnet       | /api/kea/dhcpv4/*_subnet      | /api/kea/service/reconfigure      |
//! | kea_reservation  | /api/kea/dhcpv4/*_reservation | /api/kea/service/reconfigure      |
//! | wireguard_server | /api/wireguard/server/*_server| /api/wireguard/service/reconfigure|
//!
//! ## Concurrency
//!
//! Every call blocks until the answer is fully read. Nothing here locks or
//! retries. Objects of one kind share an activation endpoint, so callers
//! that reconcile them in parallel must not assume activations serialize.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod response;
pub mod schema;
pub mod transport;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use identity::{Identifier, Identity};
pub use lifecycle::{Activation, Mutation, ReadOutcome};
pub use transport::{ClientConfig, Credentials, MockTransport};
pub use types::{Attributes, Descriptor, FieldType, FieldValue, ResourceKind};

use transport::{ApiRequest, HttpTransport, RawResponse, Transport};

/// High-level client for one appliance.
///
/// Holds the base host and a transport. Configuration is passed in
/// explicitly; there is no process-wide client.
pub struct Client {
    transport: Box<dyn Transport>,
    host: String,
}

impl Client {
    /// Create a client that talks HTTPS to the configured appliance.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_transport(&config.host, Box::new(HttpTransport::new(config)))
    }

    /// Create a client with a custom transport (useful for testing).
    #[must_use]
    pub fn with_transport(host: &str, transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            host: host.trim_end_matches('/').to_string(),
        }
    }

    /// Base host URL.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Absolute URL for an API path.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }

    /// Send a raw request through the transport.
    pub fn send(&self, request: &ApiRequest) -> Result<RawResponse> {
        self.transport.send(request)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create a remote object. See [`lifecycle::create`].
    pub fn create(&self, desired: &Descriptor) -> Result<Mutation> {
        lifecycle::create(self, desired)
    }

    /// Read a tracked object. See [`lifecycle::read`].
    pub fn read(&self, tracked: &Descriptor) -> Result<ReadOutcome> {
        lifecycle::read(self, tracked)
    }

    /// Update a tracked object. See [`lifecycle::update`].
    pub fn update(&self, desired: &Descriptor) -> Result<Mutation> {
        lifecycle::update(self, desired)
    }

    /// Delete a tracked object. See [`lifecycle::delete`].
    pub fn delete(&self, tracked: &Descriptor) -> Result<Mutation> {
        lifecycle::delete(self, tracked)
    }

    /// Look up an existing object by identifier. See [`lifecycle::import`].
    pub fn import(&self, kind: ResourceKind, id: Identifier) -> Result<Option<Descriptor>> {
        lifecycle::import(self, kind, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = Client::with_transport("https://fw/", Box::new(MockTransport::new()));
        assert_eq!(client.host(), "https://fw");
        assert_eq!(
            client.url("/api/firewall/filter/apply"),
            "https://fw/api/firewall/filter/apply"
        );
    }

    #[test]
    fn test_client_new_from_config() {
        let config = ClientConfig::new("https://192.168.1.1", Credentials::new("k", "s"));
        let client = Client::new(&config);
        assert_eq!(client.host(), "https://192.168.1.1");
    }

    #[test]
    fn test_client_full_lifecycle_with_mock() {
        let mock = MockTransport::new();
        let client = Client::with_transport("https://fw", Box::new(mock.clone()));
        mock.respond(Method::Post, "https://fw/api/kea/dhcpv4/add_reservation", 200, r#"{"uuid":"r-1"}"#);
        mock.respond(Method::Post, "https://fw/api/kea/service/reconfigure", 200, "{}");
        mock.respond(
            Method::Get,
            "https://fw/api/kea/dhcpv4/get_reservation/r-1",
            200,
            r#"{"reservation4":{"hostname":"printer"}}"#,
        );
        mock.respond(Method::Post, "https://fw/api/kea/dhcpv4/set_reservation/r-1", 200, r#"{"result":"saved"}"#);
        mock.respond(Method::Post, "https://fw/api/kea/service/reconfigure", 200, "{}");
        mock.respond(Method::Post, "https://fw/api/kea/dhcpv4/del_reservation/r-1", 200, r#"{"result":"deleted"}"#);
        mock.respond(Method::Post, "https://fw/api/kea/service/reconfigure", 200, "{}");

        let desired = Descriptor::new(ResourceKind::KeaReservation, Attributes::new())
            .with("subnet", "s-1")
            .with("ip_address", "10.0.0.50")
            .with("hw_address", "aa:bb:cc:dd:ee:ff");

        let created = client.create(&desired).unwrap().descriptor;
        let ReadOutcome::Present(current) = client.read(&created).unwrap() else {
            panic!("expected present");
        };
        assert_eq!(current.attributes["hostname"], FieldValue::from("printer"));

        let updated = client
            .update(&current.with("description", "office printer"))
            .unwrap()
            .descriptor;
        let deleted = client.delete(&updated).unwrap().descriptor;
        assert_eq!(
            deleted.identity,
            Identity::Removed {
                last: Identifier::new("r-1")
            }
        );
        assert_eq!(mock.requests().len(), 7);
    }
}
