use anyhow::{Result, bail};
use opnsense::{Identifier, ResourceKind};

use super::{connect, load_config_or_default, state_path};
use crate::Context;
use crate::state::{Address, SyncState, validate_name};
use crate::ui;

/// Start tracking an object that already exists on the appliance.
pub fn run(ctx: &Context, kind: &str, name: &str, id: &str) -> Result<()> {
    let kind: ResourceKind = kind.parse()?;
    validate_name(name)?;
    let address = Address::new(kind, name);
    let id = Identifier::parse(id)?;

    let path = state_path(ctx);
    let mut state = SyncState::load(&path)?;
    if let Some(existing) = state.get(&address) {
        bail!("{address} is already tracked (id {})", existing.id);
    }
    if let Some(other) = state.find_id(kind, &id) {
        bail!("{kind} {id} is already tracked as {other}");
    }

    let config = load_config_or_default(ctx)?;
    let client = connect(&config)?;

    let Some(descriptor) = client.import(kind, id.clone())? else {
        bail!("No {kind} with id {id} on {}", client.host());
    };

    state.track(&address, &descriptor)?;
    state.touch(&path)?;
    ui::success(&format!("Imported {address} ({id})"));

    let declared = config
        .objects()
        .map(|objects| objects.contains_key(&address))
        .unwrap_or(false);
    if !declared {
        ui::dim(&format!(
            "Declare [{address}] in the config, or the next apply will delete it"
        ));
    }

    Ok(())
}
