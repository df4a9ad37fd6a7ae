//! Command implementations

pub mod apply;
pub mod destroy;
pub mod import;
pub mod kinds;
pub mod plan;
pub mod refresh;
pub mod state;

use anyhow::Result;
use opnsense::Client;
use std::path::PathBuf;

use crate::Context;
use crate::config::{self, SyncConfig};
use crate::engine::{Target, parse_target};

/// Config file for this invocation.
pub fn config_path(ctx: &Context) -> PathBuf {
    config::resolve_path(ctx.config.as_deref())
}

/// State file for this invocation.
pub fn state_path(ctx: &Context) -> PathBuf {
    config::expand(&ctx.state)
}

/// Load the config file. It must exist.
pub fn load_config(ctx: &Context) -> Result<SyncConfig> {
    let path = config_path(ctx);
    log::debug!("Using config file {}", path.display());
    SyncConfig::load(&path)
}

/// Load the config file if present. Credentials may come from the environment.
pub fn load_config_or_default(ctx: &Context) -> Result<SyncConfig> {
    SyncConfig::load_or_default(&config_path(ctx))
}

/// Build a client for the configured appliance.
pub fn connect(config: &SyncConfig) -> Result<Client> {
    let client_config = config.client_config()?;
    log::info!("Using appliance {}", client_config.host);
    Ok(Client::new(&client_config))
}

pub fn target(raw: Option<&str>) -> Result<Option<Target>> {
    raw.map(parse_target).transpose()
}
