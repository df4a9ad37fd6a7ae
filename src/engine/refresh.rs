//! Re-read tracked objects from the appliance

use anyhow::{Context, Result};
use chrono::Utc;
use opnsense::{Client, ReadOutcome};
use std::collections::BTreeSet;

use super::planner::{Target, in_scope};
use crate::state::{Address, SyncState};

#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Objects read back and updated in state
    pub refreshed: usize,
    /// Objects the appliance no longer has, now dropped from state
    pub drifted: BTreeSet<Address>,
}

/// Read every tracked object in scope, one at a time.
///
/// Objects the appliance reports as gone are removed from `state`. Any
/// other read failure aborts the refresh.
pub fn refresh(client: &Client, state: &mut SyncState, target: Option<&Target>) -> Result<RefreshReport> {
    let mut report = RefreshReport::default();
    let addresses: Vec<Address> = state
        .objects
        .keys()
        .filter(|a| in_scope(target, a))
        .cloned()
        .collect();

    for address in addresses {
        let Some(obj) = state.objects.get_mut(&address) else {
            continue;
        };

        match client
            .read(&obj.descriptor())
            .with_context(|| format!("Failed to refresh {address}"))?
        {
            ReadOutcome::Present(observed) => {
                obj.attributes = observed.attributes;
                obj.last_synced = Utc::now();
                report.refreshed += 1;
            }
            ReadOutcome::Removed => {
                log::warn!("{address} ({}) no longer exists on the appliance", obj.id);
                state.forget(&address);
                report.drifted.insert(address);
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opnsense::transport::Method;
    use opnsense::{Attributes, Descriptor, FieldValue, Identifier, MockTransport, ResourceKind};

    const HOST: &str = "https://fw";

    fn state_with(entries: &[(&str, &str)]) -> SyncState {
        let mut state = SyncState::default();
        for (name, id) in entries {
            let descriptor = Descriptor::managed(
                ResourceKind::KeaSubnet,
                Identifier::new(*id),
                Attributes::new(),
            )
            .with("subnet", "10.0.0.0/24");
            state
                .track(&Address::new(ResourceKind::KeaSubnet, *name), &descriptor)
                .unwrap();
        }
        state
    }

    #[test]
    fn test_refresh_updates_and_drops() {
        let mock = MockTransport::new();
        mock.respond(
            Method::Get,
            format!("{HOST}/api/kea/dhcpv4/get_subnet/s-1"),
            200,
            r#"{"subnet4":{"subnet":"10.0.0.0/24","description":"lab"}}"#,
        );
        mock.respond(Method::Get, format!("{HOST}/api/kea/dhcpv4/get_subnet/s-2"), 404, "");
        let client = Client::with_transport(HOST, Box::new(mock));

        let mut state = state_with(&[("lab", "s-1"), ("old", "s-2")]);
        let report = refresh(&client, &mut state, None).unwrap();

        assert_eq!(report.refreshed, 1);
        let old = Address::new(ResourceKind::KeaSubnet, "old");
        assert!(report.drifted.contains(&old));
        assert!(state.get(&old).is_none());

        let lab = state.get(&Address::new(ResourceKind::KeaSubnet, "lab")).unwrap();
        assert_eq!(lab.attributes["description"], FieldValue::from("lab"));
    }

    #[test]
    fn test_refresh_respects_target() {
        let mock = MockTransport::new();
        mock.respond(
            Method::Get,
            format!("{HOST}/api/kea/dhcpv4/get_subnet/s-1"),
            200,
            r#"{"subnet4":{"subnet":"10.0.0.0/24"}}"#,
        );
        let client = Client::with_transport(HOST, Box::new(mock.clone()));

        let mut state = state_with(&[("lab", "s-1"), ("old", "s-2")]);
        let target = Target {
            kind: ResourceKind::KeaSubnet,
            name: Some("lab".to_string()),
        };
        let report = refresh(&client, &mut state, Some(&target)).unwrap();

        assert_eq!(report.refreshed, 1);
        assert_eq!(mock.requests().len(), 1);
        assert_eq!(state.objects.len(), 2);
    }

    #[test]
    fn test_refresh_aborts_on_protocol_error() {
        let mock = MockTransport::new();
        mock.respond(
            Method::Get,
            format!("{HOST}/api/kea/dhcpv4/get_subnet/s-1"),
            500,
            "boom",
        );
        let client = Client::with_transport(HOST, Box::new(mock));

        let mut state = state_with(&[("lab", "s-1")]);
        let err = refresh(&client, &mut state, None).unwrap_err();
        assert!(format!("{err:#}").contains("kea_subnet.lab"));
        assert_eq!(state.objects.len(), 1);
    }
}
