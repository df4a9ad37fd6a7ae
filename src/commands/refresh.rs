use anyhow::Result;

use super::{connect, load_config_or_default, state_path, target};
use crate::Context;
use crate::cli::TargetArgs;
use crate::engine::refresh;
use crate::state::SyncState;
use crate::ui;

/// Re-read tracked objects and drop the ones the appliance no longer has.
pub fn run(ctx: &Context, args: &TargetArgs) -> Result<()> {
    let path = state_path(ctx);
    let mut state = SyncState::load(&path)?;
    if state.objects.is_empty() {
        ui::info("Nothing tracked yet");
        return Ok(());
    }

    let config = load_config_or_default(ctx)?;
    let client = connect(&config)?;
    let target = target(args.target.as_deref())?;

    let report = refresh(&client, &mut state, target.as_ref())?;
    state.touch(&path)?;

    if !ctx.quiet {
        ui::success(&format!("Refreshed {} objects", report.refreshed));
    }
    for address in &report.drifted {
        ui::warn(&format!("{address} no longer exists on the appliance; dropped from state"));
    }

    Ok(())
}
