use anyhow::{Context, Result, bail};
use opnsense::{Attributes, ClientConfig, Credentials, Descriptor, ResourceKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::state::{Address, validate_name};

/// Default config file name, looked up in the working directory first.
pub const CONFIG_FILE: &str = "opnsync.toml";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_HOST: &str = "OPNSYNC_HOST";
pub const ENV_API_KEY: &str = "OPNSYNC_API_KEY";
pub const ENV_API_SECRET: &str = "OPNSYNC_API_SECRET";

/// Resolve the config path: explicit flag, then `./opnsync.toml`, then
/// `~/.config/opnsync/opnsync.toml`.
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return expand(path);
    }

    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|dir| dir.join("opnsync").join(CONFIG_FILE))
        .unwrap_or(local)
}

/// Expand a leading `~` in a user-supplied path.
pub fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).as_ref())
}

// ============================================================================
// Appliance Section
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplianceConfig {
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Skip TLS verification (self-signed appliance certificates)
    #[serde(default)]
    pub insecure: bool,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ApplianceConfig {
    fn default() -> Self {
        Self {
            host: None,
            api_key: None,
            api_secret: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            insecure: false,
        }
    }
}

// ============================================================================
// Sync Config
// ============================================================================

/// Parsed `opnsync.toml`.
///
/// Every table other than `[appliance]` is a kind, and each of its
/// sub-tables declares one object: `[firewall_rule.allow_dns]`.
#[derive(Debug, Default, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub appliance: ApplianceConfig,

    #[serde(flatten)]
    declared: BTreeMap<String, BTreeMap<String, Attributes>>,
}

impl SyncConfig {
    /// Load the config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load the config file, or an empty config when it doesn't exist.
    ///
    /// Commands that only work from state (destroy, import, refresh) still
    /// need appliance credentials, which may come from the environment.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("Config file {} does not exist, using environment only", path.display());
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML")
    }

    /// Declared objects, validated against their kind's schema.
    pub fn objects(&self) -> Result<BTreeMap<Address, Descriptor>> {
        let mut objects = BTreeMap::new();

        for (kind_name, entries) in &self.declared {
            let kind: ResourceKind = kind_name.parse().with_context(|| {
                let known: Vec<&str> = ResourceKind::all().iter().map(ResourceKind::name).collect();
                format!("Unknown table [{kind_name}] (expected one of: appliance, {})", known.join(", "))
            })?;

            for (name, attributes) in entries {
                validate_name(name).with_context(|| format!("Invalid [{kind_name}.{name}]"))?;
                let address = Address::new(kind, name.clone());

                let mut descriptor = Descriptor::new(kind, attributes.clone());
                descriptor.normalize();
                kind.schema()
                    .validate_declared(&descriptor.attributes)
                    .with_context(|| format!("Invalid [{address}]"))?;

                objects.insert(address, descriptor);
            }
        }

        Ok(objects)
    }

    /// Connection settings, with environment variables taking precedence.
    pub fn client_config(&self) -> Result<ClientConfig> {
        self.client_config_from(|key| std::env::var(key).ok())
    }

    pub fn client_config_from(&self, env: impl Fn(&str) -> Option<String>) -> Result<ClientConfig> {
        let pick = |key: &str, fallback: &Option<String>| {
            env(key)
                .filter(|v| !v.is_empty())
                .or_else(|| fallback.clone())
        };

        let Some(host) = pick(ENV_HOST, &self.appliance.host) else {
            bail!("No appliance host configured (set [appliance].host or {ENV_HOST})");
        };
        let Some(key) = pick(ENV_API_KEY, &self.appliance.api_key) else {
            bail!("No API key configured (set [appliance].api_key or {ENV_API_KEY})");
        };
        let Some(secret) = pick(ENV_API_SECRET, &self.appliance.api_secret) else {
            bail!("No API secret configured (set [appliance].api_secret or {ENV_API_SECRET})");
        };

        if !host.starts_with("https://") && !host.starts_with("http://") {
            bail!("Appliance host '{host}' must start with https:// or http://");
        }

        Ok(ClientConfig::new(host, Credentials::new(key, secret))
            .timeout(Duration::from_secs(self.appliance.timeout_secs))
            .insecure(self.appliance.insecure))
    }
}
