use anyhow::Result;
use std::collections::BTreeSet;

use super::{connect, load_config, state_path, target};
use crate::Context;
use crate::cli::PlanArgs;
use crate::engine::{differ, planner, refresh};
use crate::state::SyncState;
use crate::ui;

/// Show what apply would change.
///
/// Drift found while refreshing is shown in the plan but not written to the
/// state file.
pub fn run(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let config = load_config(ctx)?;
    let declared = config.objects()?;
    let target = target(args.target.target.as_deref())?;
    let mut state = SyncState::load(&state_path(ctx))?;

    let drifted = if args.no_refresh {
        BTreeSet::new()
    } else {
        let client = connect(&config)?;
        refresh(&client, &mut state, target.as_ref())?.drifted
    };

    let plan = planner::plan(&declared, &state, &drifted, target.as_ref());
    differ::display_diff(&plan);

    if !plan.is_empty() && !ctx.quiet {
        println!();
        ui::dim("Run `opnsync apply` to make these changes");
    }

    Ok(())
}
