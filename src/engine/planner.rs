//! Plan computation: declared objects vs tracked state

use anyhow::{Context, Result};
use opnsense::{Descriptor, ResourceKind, codec};
use std::collections::{BTreeMap, BTreeSet};

use crate::state::{Address, SyncState, validate_name};

/// Restricts an operation to one kind, or one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: ResourceKind,
    pub name: Option<String>,
}

impl Target {
    pub fn matches(&self, address: &Address) -> bool {
        address.kind == self.kind && self.name.as_ref().is_none_or(|n| *n == address.name)
    }
}

/// Parse target string like "kea_subnet" or "kea_subnet.lab"
pub fn parse_target(target: &str) -> Result<Target> {
    let (kind, name) = match target.split_once('.') {
        Some((kind, name)) => (kind, Some(name)),
        None => (target, None),
    };

    let kind: ResourceKind = kind.parse()?;
    if let Some(name) = name {
        validate_name(name).with_context(|| format!("Invalid target '{target}'"))?;
    }

    Ok(Target {
        kind,
        name: name.map(str::to_string),
    })
}

/// Whether `address` falls inside an optional target.
pub fn in_scope(target: Option<&Target>, address: &Address) -> bool {
    target.is_none_or(|t| t.matches(address))
}

/// One attribute that differs between config and tracked state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub name: &'static str,
    /// Display form of the tracked value, `None` when unset
    pub from: Option<String>,
    /// Display form of the declared value
    pub to: String,
}

#[derive(Debug, Clone)]
pub enum Action {
    /// Declared but not tracked
    Create { desired: Descriptor },
    /// Tracked, but gone from the appliance when last read
    Recreate { desired: Descriptor },
    /// Tracked and declared with different attributes
    Update {
        desired: Descriptor,
        changes: Vec<FieldChange>,
    },
    /// Tracked but no longer declared
    Delete { tracked: Descriptor },
}

impl Action {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Recreate { .. } => "recreate",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub address: Address,
    pub action: Action,
}

/// Ordered list of changes.
///
/// Creates and updates run in kind order (subnets before reservations),
/// deletes afterwards in reverse.
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    pub changes: Vec<PlannedChange>,
    /// Declared objects already in sync
    pub unchanged: usize,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.changes
            .iter()
            .filter(|c| c.action.verb() == verb)
            .count()
    }
}

/// Compare declared objects with tracked state.
///
/// `drifted` lists addresses a refresh just dropped; declared ones among
/// them are recreated rather than created.
pub fn plan(
    declared: &BTreeMap<Address, Descriptor>,
    state: &SyncState,
    drifted: &BTreeSet<Address>,
    target: Option<&Target>,
) -> ExecutionPlan {
    let mut plan = ExecutionPlan::default();

    for (address, desired) in declared {
        if !in_scope(target, address) {
            continue;
        }

        let action = match state.get(address) {
            None if drifted.contains(address) => Action::Recreate {
                desired: desired.clone(),
            },
            None => Action::Create {
                desired: desired.clone(),
            },
            Some(obj) => {
                let tracked = obj.descriptor();
                let changes = diff(desired, &tracked);
                if changes.is_empty() {
                    plan.unchanged += 1;
                    continue;
                }
                let mut next = desired.clone();
                next.identity = tracked.identity.clone();
                next.carry_computed(&tracked);
                Action::Update {
                    desired: next,
                    changes,
                }
            }
        };

        plan.changes.push(PlannedChange {
            address: address.clone(),
            action,
        });
    }

    for (address, obj) in state.objects.iter().rev() {
        if !in_scope(target, address) || declared.contains_key(address) {
            continue;
        }
        plan.changes.push(PlannedChange {
            address: address.clone(),
            action: Action::Delete {
                tracked: obj.descriptor(),
            },
        });
    }

    plan
}

/// Plan that deletes every tracked object in scope.
pub fn plan_destroy(state: &SyncState, target: Option<&Target>) -> ExecutionPlan {
    plan(&BTreeMap::new(), state, &BTreeSet::new(), target)
}

/// Settable attributes whose declared value differs from the tracked one.
///
/// Attributes the config leaves unset (and that have no default) are not
/// compared, so values the appliance fills in never show up as drift.
/// Deprecated aliases overridden by their current name are skipped too.
pub fn diff(desired: &Descriptor, tracked: &Descriptor) -> Vec<FieldChange> {
    let schema = desired.kind.schema();
    schema
        .diffable_fields()
        .filter(|field| !codec::shadowed(desired.kind, field, &desired.attributes))
        .filter_map(|field| {
            let want = codec::effective(field, &desired.attributes)?;
            let have = codec::effective(field, &tracked.attributes);
            if have.as_ref() == Some(&want) {
                return None;
            }
            Some(FieldChange {
                name: field.name,
                from: have.map(|v| schema.display_value(field.name, &v)),
                to: schema.display_value(field.name, &want),
            })
        })
        .collect()
}
