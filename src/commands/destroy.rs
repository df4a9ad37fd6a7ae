use anyhow::{Result, bail};

use super::{connect, load_config_or_default, state_path, target};
use crate::Context;
use crate::cli::DestroyArgs;
use crate::engine::{ExecuteOptions, execute, planner, refresh};
use crate::state::SyncState;
use crate::ui;

/// Delete every tracked object in scope, reservations before subnets.
pub fn run(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    let path = state_path(ctx);
    let mut state = SyncState::load(&path)?;
    if state.objects.is_empty() {
        ui::info("Nothing tracked; nothing to destroy");
        return Ok(());
    }

    let config = load_config_or_default(ctx)?;
    let client = connect(&config)?;
    let target = target(args.target.target.as_deref())?;

    let report = refresh(&client, &mut state, target.as_ref())?;
    if !report.drifted.is_empty() && !args.dry_run {
        state.touch(&path)?;
    }

    let plan = planner::plan_destroy(&state, target.as_ref());
    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        yes: args.yes,
    };
    let summary = execute(&client, &plan, &mut state, &path, &opts)?;

    if !summary.is_success() {
        bail!("{} objects could not be deleted and are still tracked", summary.failed);
    }

    Ok(())
}
