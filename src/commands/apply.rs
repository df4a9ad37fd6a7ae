use anyhow::{Result, bail};
use std::collections::BTreeSet;

use super::{connect, load_config, state_path, target};
use crate::Context;
use crate::cli::ApplyArgs;
use crate::engine::{ExecuteOptions, execute, planner, refresh};
use crate::state::SyncState;
use crate::ui;

/// Make the appliance match the config.
pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let config = load_config(ctx)?;
    let declared = config.objects()?;
    let target = target(args.target.target.as_deref())?;
    let path = state_path(ctx);
    let mut state = SyncState::load(&path)?;
    let client = connect(&config)?;

    let drifted = if args.no_refresh {
        BTreeSet::new()
    } else {
        let report = refresh(&client, &mut state, target.as_ref())?;
        if !args.dry_run {
            state.touch(&path)?;
        }
        report.drifted
    };

    let plan = planner::plan(&declared, &state, &drifted, target.as_ref());
    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        yes: args.yes,
    };
    let summary = execute(&client, &plan, &mut state, &path, &opts)?;

    if !summary.is_success() {
        bail!(
            "{} of {} changes failed",
            summary.failed,
            summary.failed + summary.total_changes()
        );
    }
    if summary.total_changes() > 0 && !ctx.quiet {
        ui::dim(&format!("State saved to {}", path.display()));
    }

    Ok(())
}
