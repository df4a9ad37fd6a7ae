use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use opnsense::{Attributes, Descriptor, Identifier, ResourceKind};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Layout version written into every state file.
pub const STATE_VERSION: u32 = 1;

// ============================================================================
// Addresses
// ============================================================================

/// Local address of a managed object: `<kind>.<name>`.
///
/// Ordering follows kind declaration order, then name, so iterating a
/// `BTreeMap<Address, _>` visits subnets before their reservations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    pub kind: ResourceKind,
    pub name: String,
}

impl Address {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Check that a local object name can be used in an address.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("object name cannot be empty");
    }
    if name.contains('.') || name.chars().any(char::is_whitespace) {
        bail!("object name '{name}' may not contain dots or whitespace");
    }
    Ok(())
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.name)
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, name) = s
            .split_once('.')
            .with_context(|| format!("invalid address '{s}' (expected kind.name)"))?;
        let kind: ResourceKind = kind.parse()?;
        validate_name(name)?;
        Ok(Self::new(kind, name))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// State Structures
// ============================================================================

/// One object the appliance has confirmed, with its last observed attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub kind: ResourceKind,
    pub name: String,
    pub id: Identifier,
    #[serde(default)]
    pub attributes: Attributes,
    pub last_synced: DateTime<Utc>,
}

impl TrackedObject {
    /// Managed descriptor for lifecycle calls.
    pub fn descriptor(&self) -> Descriptor {
        Descriptor::managed(self.kind, self.id.clone(), self.attributes.clone())
    }
}

/// Everything opnsync knows about objects it created or imported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub version: u32,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,

    #[serde(default)]
    pub objects: BTreeMap<Address, TrackedObject>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            last_updated: Utc::now(),
            objects: BTreeMap::new(),
        }
    }
}

impl SyncState {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, using empty state", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        if state.version > STATE_VERSION {
            bail!(
                "State file {} has version {}, this build understands up to {}",
                path.display(),
                state.version,
                STATE_VERSION
            );
        }

        log::debug!("Loaded {} tracked objects from {}", state.objects.len(), path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize state to JSON")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save(path)
    }

    pub fn get(&self, address: &Address) -> Option<&TrackedObject> {
        self.objects.get(address)
    }

    /// Address already tracking `id` for `kind`, if any.
    pub fn find_id(&self, kind: ResourceKind, id: &Identifier) -> Option<&Address> {
        self.objects
            .iter()
            .find(|(_, obj)| obj.kind == kind && &obj.id == id)
            .map(|(address, _)| address)
    }

    /// Record a managed descriptor under `address`, replacing what was there.
    pub fn track(&mut self, address: &Address, descriptor: &Descriptor) -> Result<()> {
        let id = descriptor.identity.require(descriptor.kind)?.clone();
        self.objects.insert(
            address.clone(),
            TrackedObject {
                kind: address.kind,
                name: address.name.clone(),
                id,
                attributes: descriptor.attributes.clone(),
                last_synced: Utc::now(),
            },
        );
        Ok(())
    }

    /// Stop tracking an object.
    pub fn forget(&mut self, address: &Address) -> Option<TrackedObject> {
        self.objects.remove(address)
    }
}
