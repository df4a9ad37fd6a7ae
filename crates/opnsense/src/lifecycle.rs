//! Lifecycle orchestration for one managed object.
//!
//! Each operation sequences codec, transport, disambiguator and identity
//! tracker for a single descriptor:
//!
//! ```text
//! Unmanaged --create--> Managed --read/update--> Managed
//!                          |                        |
//!                          +--delete / drift--> Removed
//! ```
//!
//! Mutations end with an activation call that pushes staged configuration
//! live. Its outcome is reported in [`Mutation::activation`] and never turns
//! a successful mutation into a failure.

use crate::Client;
use crate::codec;
use crate::error::{Error, Result};
use crate::identity::Identifier;
use crate::response::{Outcome, disambiguate, validation_failure};
use crate::schema::{Operation, Presence};
use crate::transport::{ApiRequest, BodyShape};
use crate::types::{Descriptor, ResourceKind};
use log::{debug, info, warn};
use serde_json::Value;

/// Result of the activation call that follows a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The activation endpoint answered 2xx.
    Applied,
    /// The activation call failed. The mutation itself stands.
    Failed {
        /// What went wrong.
        reason: String,
    },
}

impl Activation {
    /// Whether activation succeeded.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// A completed create, update or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// Descriptor as tracked after the mutation.
    pub descriptor: Descriptor,
    /// Outcome of the follow-up activation call.
    pub activation: Activation,
}

/// Result of reading a tracked object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The object exists; observed fields are merged in.
    Present(Descriptor),
    /// The object is gone and should no longer be tracked.
    Removed,
}

/// Create a new remote object.
///
/// On any failure the caller's descriptor is left untouched, so no
/// identifier is ever tracked for an object that was not created.
pub fn create(client: &Client, desired: &Descriptor) -> Result<Mutation> {
    let kind = desired.kind;
    let schema = kind.schema();
    if let Some(id) = desired.id() {
        return Err(Error::AlreadyManaged {
            kind,
            id: id.to_string(),
        });
    }
    desired.validate()?;

    let url = client.url(&schema.endpoint(Operation::Add, None));
    let body = codec::encode(desired);
    debug!("create {kind}: {}", codec::redact(kind, &body));

    let response = client
        .send(&ApiRequest::post(&url, Some(body)))?
        .into_success(&url)?;

    let id = match disambiguate(&response.body, schema.envelope) {
        Outcome::Identifier(id) => id,
        Outcome::Removed => {
            return Err(Error::EmptyResponse {
                kind,
                operation: "create",
            });
        }
        Outcome::ValidationError(messages) => return Err(Error::Validation { kind, messages }),
        Outcome::UnrecognizedShape => {
            return Err(Error::UnrecognizedShape {
                kind,
                body: response.body,
            });
        }
    };

    let mut created = desired.clone();
    created.identity.assign(id)?;
    info!("created {kind} {}", describe(&created));

    if schema.read_back_after_create {
        read_back(client, &mut created);
    }

    let activation = activate(client, kind);
    Ok(Mutation {
        descriptor: created,
        activation,
    })
}

/// Read a tracked object.
///
/// A 404, an empty body, or an array body means the object is gone. Fields
/// absent from the answer keep their tracked value.
pub fn read(client: &Client, tracked: &Descriptor) -> Result<ReadOutcome> {
    let kind = tracked.kind;
    let id = tracked.identity.require(kind)?;
    let url = client.url(&kind.schema().endpoint(Operation::Get, Some(id)));

    let response = client.send(&ApiRequest::get(&url))?;
    if response.status == 404 {
        warn!("{kind} {id} not found (HTTP 404), dropping from state");
        return Ok(ReadOutcome::Removed);
    }
    let response = response.into_success(&url)?;

    match response.shape() {
        BodyShape::Empty | BodyShape::Array => {
            warn!("{kind} {id} no longer exists, dropping from state");
            Ok(ReadOutcome::Removed)
        }
        BodyShape::Object => {
            let observed = response.json().unwrap_or(Value::Null);
            let mut current = tracked.clone();
            codec::merge(&mut current, codec::decode(kind, &observed));
            Ok(ReadOutcome::Present(current))
        }
        BodyShape::Other => Err(Error::UnrecognizedShape {
            kind,
            body: response.body,
        }),
    }
}

/// Push a new desired state to a tracked object.
///
/// The identifier is already known, so the answer is only checked for an
/// explicit `"result": "failed"` rejection.
pub fn update(client: &Client, desired: &Descriptor) -> Result<Mutation> {
    let kind = desired.kind;
    let id = desired.identity.require(kind)?;
    desired.validate()?;

    let url = client.url(&kind.schema().endpoint(Operation::Set, Some(id)));
    let body = codec::encode(desired);
    debug!("update {kind} {id}: {}", codec::redact(kind, &body));

    let response = client
        .send(&ApiRequest::post(&url, Some(body)))?
        .into_success(&url)?;

    if let Some(Value::Object(object)) = response.json()
        && let Some(messages) = validation_failure(&object)
    {
        let messages = if messages.is_empty() {
            vec![response.body]
        } else {
            messages
        };
        return Err(Error::Validation { kind, messages });
    }
    info!("updated {kind} {id}");

    let activation = activate(client, kind);
    Ok(Mutation {
        descriptor: desired.clone(),
        activation,
    })
}

/// Delete a tracked object.
///
/// Activation runs whether or not the delete call succeeded. A failed
/// delete is still returned as an error so the caller keeps tracking it.
pub fn delete(client: &Client, tracked: &Descriptor) -> Result<Mutation> {
    let kind = tracked.kind;
    let id = tracked.identity.require(kind)?;
    let url = client.url(&kind.schema().endpoint(Operation::Del, Some(id)));
    debug!("delete {kind} {id}");

    let result = client
        .send(&ApiRequest::post(&url, None))
        .and_then(|response| response.into_success(&url));
    let activation = activate(client, kind);
    result?;
    info!("deleted {kind} {id}");

    let mut removed = tracked.clone();
    removed.identity.release();
    Ok(Mutation {
        descriptor: removed,
        activation,
    })
}

/// Call the kind's activation endpoint.
///
/// Never fails: problems are logged and reported as [`Activation::Failed`].
pub fn activate(client: &Client, kind: ResourceKind) -> Activation {
    let url = client.url(kind.schema().activation);
    let reason = match client.send(&ApiRequest::post(&url, None)) {
        Ok(response) if response.is_success() => return Activation::Applied,
        Ok(response) => format!("HTTP {}: {}", response.status, response.body.trim()),
        Err(e) => e.to_string(),
    };
    warn!("activation of {kind} changes failed: {reason}");
    Activation::Failed { reason }
}

/// Start tracking an existing remote object by identifier.
///
/// Returns `Ok(None)` when the appliance has no such object.
pub fn import(client: &Client, kind: ResourceKind, id: Identifier) -> Result<Option<Descriptor>> {
    let id = Identifier::parse(id.as_str())?;
    let lookup = Descriptor::managed(kind, id, Default::default());
    match read(client, &lookup)? {
        ReadOutcome::Present(descriptor) => Ok(Some(descriptor)),
        ReadOutcome::Removed => Ok(None),
    }
}

/// Fill generated attributes from a fresh read. Best effort.
fn read_back(client: &Client, created: &mut Descriptor) {
    let kind = created.kind;
    let observed = match read(client, created) {
        Ok(ReadOutcome::Present(observed)) => observed,
        Ok(ReadOutcome::Removed) => {
            warn!("{kind} vanished right after create; generated fields unknown");
            return;
        }
        Err(e) => {
            warn!("could not read back {kind} after create: {e}");
            return;
        }
    };

    for field in kind.schema().fields {
        let fill = match field.presence {
            Presence::Computed => true,
            Presence::OptionalComputed => !created.attributes.contains_key(field.name),
            Presence::Required | Presence::Optional => false,
        };
        if fill && let Some(value) = observed.attributes.get(field.name) {
            created
                .attributes
                .insert(field.name.to_string(), value.clone());
        }
    }
}

fn describe(descriptor: &Descriptor) -> String {
    descriptor
        .id()
        .map_or_else(|| "(unmanaged)".to_string(), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, MockTransport};
    use crate::types::{Attributes, FieldValue};

    const HOST: &str = "https://fw";

    fn client(mock: &MockTransport) -> Client {
        Client::with_transport(HOST, Box::new(mock.clone()))
    }

    fn url(path: &str) -> String {
        format!("{HOST}{path}")
    }

    fn subnet() -> Descriptor {
        Descriptor::new(ResourceKind::KeaSubnet, Attributes::new())
            .with("subnet", "10.0.0.0/24")
            .with("description", "lab")
    }

    fn tracked_subnet() -> Descriptor {
        let mut desc = subnet();
        desc.identity.assign(Identifier::new("s-1")).unwrap();
        desc
    }

    #[test]
    fn test_create_assigns_identifier_and_activates() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, url("/api/kea/dhcpv4/add_subnet"), 200, r#"{"result":"saved","uuid":"s-1"}"#);
        mock.respond(Method::Post, url("/api/kea/service/reconfigure"), 200, r#"{"status":"ok"}"#);

        let mutation = create(&client(&mock), &subnet()).unwrap();
        assert_eq!(mutation.descriptor.id(), Some(&Identifier::new("s-1")));
        assert!(mutation.activation.is_applied());

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["subnet4"]["subnet"], "10.0.0.0/24");
        assert!(requests[1].body.is_none());
    }

    #[test]
    fn test_create_validation_error_leaves_no_identifier() {
        let mock = MockTransport::new();
        mock.respond(
            Method::Post,
            url("/api/kea/dhcpv4/add_subnet"),
            200,
            r#"{"result":"failed","validations":{"subnet":["invalid CIDR"]}}"#,
        );
        let desired = subnet();

        let err = create(&client(&mock), &desired).unwrap_err();
        assert_eq!(err.messages(), ["subnet: invalid CIDR".to_string()]);
        assert!(desired.id().is_none());
        assert_eq!(mock.requests().len(), 1, "no activation after failed create");
    }

    #[test]
    fn test_create_empty_body_is_error() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, url("/api/kea/dhcpv4/add_subnet"), 200, "");
        let err = create(&client(&mock), &subnet()).unwrap_err();
        assert!(matches!(err, Error::EmptyResponse { .. }));
    }

    #[test]
    fn test_create_empty_array_is_validation_error() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, url("/api/kea/dhcpv4/add_subnet"), 200, "[]");
        let err = create(&client(&mock), &subnet()).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_create_unrecognized_shape() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, url("/api/kea/dhcpv4/add_subnet"), 200, r#"{"status":"ok"}"#);
        let err = create(&client(&mock), &subnet()).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedShape { ref body, .. } if body.contains("status")));
    }

    #[test]
    fn test_create_protocol_and_transport_errors() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, url("/api/kea/dhcpv4/add_subnet"), 401, "unauthorized");
        let err = create(&client(&mock), &subnet()).unwrap_err();
        assert!(matches!(err, Error::Protocol { status: 401, .. }));

        mock.fail(Method::Post, url("/api/kea/dhcpv4/add_subnet"), "connection refused");
        let err = create(&client(&mock), &subnet()).unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(mock.requests().len(), 2);
    }

    #[test]
    fn test_create_rejects_invalid_descriptor_without_network() {
        let mock = MockTransport::new();
        let desired = Descriptor::new(ResourceKind::KeaSubnet, Attributes::new());
        let err = create(&client(&mock), &desired).unwrap_err();
        assert!(matches!(err, Error::MissingAttribute { .. }));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_create_rejects_managed_descriptor() {
        let mock = MockTransport::new();
        let err = create(&client(&mock), &tracked_subnet()).unwrap_err();
        assert!(matches!(err, Error::AlreadyManaged { .. }));
    }

    #[test]
    fn test_activation_failure_is_not_fatal() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, url("/api/kea/dhcpv4/add_subnet"), 200, r#"{"uuid":"s-1"}"#);
        mock.respond(Method::Post, url("/api/kea/service/reconfigure"), 500, "reconfigure failed");

        let mutation = create(&client(&mock), &subnet()).unwrap();
        assert!(mutation.descriptor.identity.is_managed());
        assert_eq!(
            mutation.activation,
            Activation::Failed {
                reason: "HTTP 500: reconfigure failed".to_string()
            }
        );

        mock.respond(Method::Post, url("/api/kea/dhcpv4/set_subnet/s-1"), 200, r#"{"result":"saved"}"#);
        let mutation = update(&client(&mock), &tracked_subnet()).unwrap();
        assert!(!mutation.activation.is_applied());
    }

    #[test]
    fn test_wireguard_read_back_fills_generated_keys() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, url("/api/wireguard/server/add_server"), 200, r#"{"uuid":"w-1"}"#);
        mock.respond(
            Method::Get,
            url("/api/wireguard/server/get_server/w-1"),
            200,
            r#"{"server":{"name":"wg0","pubkey":"PUB","privkey":"PRIV","port":"51820"}}"#,
        );
        mock.respond(Method::Post, url("/api/wireguard/service/reconfigure"), 200, "{}");

        let desired = Descriptor::new(ResourceKind::WireguardServer, Attributes::new())
            .with("name", "wg0")
            .with("listen_port", 51820_i64)
            .with("tunnel_address", "10.9.0.1/24");
        let mutation = create(&client(&mock), &desired).unwrap();
        let attrs = &mutation.descriptor.attributes;
        assert_eq!(attrs["public_key"], FieldValue::from("PUB"));
        assert_eq!(attrs["private_key"], FieldValue::from("PRIV"));
        assert_eq!(attrs["tunnel_address"], FieldValue::from("10.9.0.1/24"));
        assert_eq!(
            mock.calls(),
            vec![
                "POST https://fw/api/wireguard/server/add_server",
                "GET https://fw/api/wireguard/server/get_server/w-1",
                "POST https://fw/api/wireguard/service/reconfigure",
            ]
        );
    }

    #[test]
    fn test_wireguard_read_back_failure_is_not_fatal() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, url("/api/wireguard/server/add_server"), 200, r#"{"uuid":"w-1"}"#);
        mock.respond(Method::Post, url("/api/wireguard/service/reconfigure"), 200, "{}");

        let desired = Descriptor::new(ResourceKind::WireguardServer, Attributes::new())
            .with("name", "wg0")
            .with("listen_port", 51820_i64)
            .with("tunnel_address", "10.9.0.1/24");
        let mutation = create(&client(&mock), &desired).unwrap();
        assert!(mutation.descriptor.identity.is_managed());
        assert!(!mutation.descriptor.attributes.contains_key("public_key"));
    }

    #[test]
    fn test_read_merges_observed_fields() {
        let mock = MockTransport::new();
        mock.respond(
            Method::Get,
            url("/api/kea/dhcpv4/get_subnet/s-1"),
            200,
            r#"{"subnet4":{"subnet":"10.0.1.0/24","option_data_autocollect":"0"}}"#,
        );
        let ReadOutcome::Present(current) = read(&client(&mock), &tracked_subnet()).unwrap() else {
            panic!("expected present");
        };
        assert_eq!(current.attributes["subnet"], FieldValue::from("10.0.1.0/24"));
        assert_eq!(current.attributes["auto_collect"], FieldValue::Bool(false));
        assert_eq!(current.attributes["description"], FieldValue::from("lab"));
        assert!(current.identity.is_managed());
    }

    #[test]
    fn test_read_drift_paths() {
        for (status, body) in [(404, "not found"), (200, ""), (200, "[]"), (200, "[{\"x\":1}]")] {
            let mock = MockTransport::new();
            mock.respond(Method::Get, url("/api/kea/dhcpv4/get_subnet/s-1"), status, body);
            let outcome = read(&client(&mock), &tracked_subnet()).unwrap();
            assert_eq!(outcome, ReadOutcome::Removed, "{status} {body:?}");
        }
    }

    #[test]
    fn test_read_errors() {
        let mock = MockTransport::new();
        mock.respond(Method::Get, url("/api/kea/dhcpv4/get_subnet/s-1"), 500, "oops");
        mock.respond(Method::Get, url("/api/kea/dhcpv4/get_subnet/s-1"), 200, "<html>");
        let client = client(&mock);
        assert!(matches!(
            read(&client, &tracked_subnet()),
            Err(Error::Protocol { status: 500, .. })
        ));
        assert!(matches!(
            read(&client, &tracked_subnet()),
            Err(Error::UnrecognizedShape { .. })
        ));
        assert!(matches!(read(&client, &subnet()), Err(Error::NotManaged { .. })));
    }

    #[test]
    fn test_update_posts_to_set_with_id() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, url("/api/kea/dhcpv4/set_subnet/s-1"), 200, r#"{"result":"saved"}"#);
        mock.respond(Method::Post, url("/api/kea/service/reconfigure"), 200, "{}");

        let desired = tracked_subnet().with("description", "changed");
        let mutation = update(&client(&mock), &desired).unwrap();
        assert_eq!(mutation.descriptor, desired);
        assert!(mutation.activation.is_applied());
        let body = mock.requests()[0].body.clone().unwrap();
        assert_eq!(body["subnet4"]["description"], "changed");
    }

    #[test]
    fn test_update_failures() {
        let mock = MockTransport::new();
        mock.respond(
            Method::Post,
            url("/api/kea/dhcpv4/set_subnet/s-1"),
            200,
            r#"{"result":"failed","validations":{"subnet4.pools":"out of range"}}"#,
        );
        mock.respond(Method::Post, url("/api/kea/dhcpv4/set_subnet/s-1"), 400, "bad");
        let client = client(&mock);

        let err = update(&client, &tracked_subnet()).unwrap_err();
        assert_eq!(err.messages(), ["subnet4.pools: out of range".to_string()]);
        let err = update(&client, &tracked_subnet()).unwrap_err();
        assert!(matches!(err, Error::Protocol { status: 400, .. }));
        assert!(matches!(update(&client, &subnet()), Err(Error::NotManaged { .. })));
        assert_eq!(mock.requests().len(), 2, "no activation after failed update");
    }

    #[test]
    fn test_delete_releases_identifier() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, url("/api/kea/dhcpv4/del_subnet/s-1"), 200, r#"{"result":"deleted"}"#);
        mock.respond(Method::Post, url("/api/kea/service/reconfigure"), 200, "{}");

        let mutation = delete(&client(&mock), &tracked_subnet()).unwrap();
        assert!(mutation.descriptor.id().is_none());
        assert!(mutation.activation.is_applied());
    }

    #[test]
    fn test_delete_failure_still_activates() {
        let mock = MockTransport::new();
        mock.fail(Method::Post, url("/api/kea/dhcpv4/del_subnet/s-1"), "timed out");
        mock.respond(Method::Post, url("/api/kea/service/reconfigure"), 200, "{}");

        let err = delete(&client(&mock), &tracked_subnet()).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            mock.calls(),
            vec![
                "POST https://fw/api/kea/dhcpv4/del_subnet/s-1",
                "POST https://fw/api/kea/service/reconfigure",
            ]
        );
    }

    #[test]
    fn test_delete_activation_failure_is_not_fatal() {
        let mock = MockTransport::new();
        mock.respond(Method::Post, url("/api/kea/dhcpv4/del_subnet/s-1"), 200, r#"{"result":"deleted"}"#);
        mock.respond(Method::Post, url("/api/kea/service/reconfigure"), 500, "boom");

        let mutation = delete(&client(&mock), &tracked_subnet()).unwrap();
        assert!(mutation.descriptor.id().is_none());
        assert!(matches!(mutation.activation, Activation::Failed { .. }));
    }

    #[test]
    fn test_activate_transport_failure() {
        let mock = MockTransport::new();
        let activation = activate(&client(&mock), ResourceKind::FirewallRule);
        assert!(matches!(activation, Activation::Failed { ref reason } if reason.contains("apply")));
    }

    #[test]
    fn test_import() {
        let mock = MockTransport::new();
        mock.respond(
            Method::Get,
            url("/api/firewall/d_nat/get_rule/n-1"),
            200,
            r#"{"interface":{"wan":{"value":"WAN","selected":1}},"local-port":"22"}"#,
        );
        mock.respond(Method::Get, url("/api/firewall/d_nat/get_rule/n-2"), 200, "[]");
        let client = client(&mock);

        let imported = import(&client, ResourceKind::NatDestination, Identifier::new("n-1"))
            .unwrap()
            .unwrap();
        assert_eq!(imported.id(), Some(&Identifier::new("n-1")));
        assert_eq!(imported.attributes["interface"], FieldValue::from("wan"));
        assert_eq!(imported.attributes["target_port"], FieldValue::from("22"));

        let missing = import(&client, ResourceKind::NatDestination, Identifier::new("n-2")).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_import_rejects_path_like_identifier() {
        let mock = MockTransport::new();
        let client = client(&mock);

        let err = import(&client, ResourceKind::NatDestination, Identifier::new("../del_rule/n-1"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier(_)));
        assert!(mock.requests().is_empty());
    }
}
