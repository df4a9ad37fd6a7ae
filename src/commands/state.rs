use anyhow::{Context as _, Result};
use colored::Colorize;

use super::state_path;
use crate::Context;
use crate::cli::StateCommand;
use crate::state::{Address, SyncState};
use crate::ui;

pub fn run(ctx: &Context, cmd: &StateCommand) -> Result<()> {
    match cmd {
        StateCommand::List => list(ctx),
        StateCommand::Show { address } => show(ctx, address),
        StateCommand::Rm { address } => rm(ctx, address),
    }
}

fn list(ctx: &Context) -> Result<()> {
    let state = SyncState::load(&state_path(ctx))?;
    if state.objects.is_empty() {
        ui::info("Nothing tracked yet");
        return Ok(());
    }

    ui::header(&format!("Tracked objects ({})", state.objects.len()));
    for (address, obj) in &state.objects {
        println!(
            "  {:<40} {}  {}",
            address.to_string(),
            obj.id.as_str().dimmed(),
            obj.last_synced.format("%Y-%m-%d %H:%M").to_string().dimmed()
        );
    }
    Ok(())
}

fn show(ctx: &Context, raw: &str) -> Result<()> {
    let address: Address = raw.parse()?;
    let state = SyncState::load(&state_path(ctx))?;
    let obj = state
        .get(&address)
        .with_context(|| format!("{address} is not tracked"))?;
    let schema = address.kind.schema();

    ui::header(&address.to_string());
    ui::kv("kind", address.kind.name());
    ui::kv("id", obj.id.as_str());
    ui::kv("last synced", &obj.last_synced.to_rfc3339());

    ui::section("Attributes");
    if obj.attributes.is_empty() {
        ui::dim("(none recorded)");
    }
    for (name, value) in &obj.attributes {
        ui::kv(name, &schema.display_value(name, value));
    }
    Ok(())
}

fn rm(ctx: &Context, raw: &str) -> Result<()> {
    let address: Address = raw.parse()?;
    let path = state_path(ctx);
    let mut state = SyncState::load(&path)?;
    let obj = state
        .forget(&address)
        .with_context(|| format!("{address} is not tracked"))?;
    state.touch(&path)?;

    ui::success(&format!("Stopped tracking {address} ({})", obj.id));
    ui::dim("The object was left untouched on the appliance");
    Ok(())
}
