//! Plan execution, one object at a time

use anyhow::Result;
use colored::Colorize;
use opnsense::{Activation, Client, Error as ApiError};
use std::path::Path;

use super::differ::display_diff;
use super::planner::{Action, ExecutionPlan, PlannedChange};
use crate::state::SyncState;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
}

/// Result of applying one planned change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    Created,
    Modified,
    Removed,
    Failed { error: String },
}

/// Summary of execution results
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Mutations that were staged but whose activation call failed
    pub not_activated: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::Created => self.created += 1,
            ApplyResult::Modified => self.modified += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
        }
    }
}

/// Execute the plan against the appliance.
///
/// Changes run strictly in plan order. State is saved after every change
/// so an interrupted run never loses an identifier the appliance assigned.
pub fn execute(
    client: &Client,
    plan: &ExecutionPlan,
    state: &mut SyncState,
    state_path: &Path,
    opts: &ExecuteOptions,
) -> Result<ExecuteSummary> {
    display_diff(plan);

    if plan.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(ExecuteSummary::default());
    }

    if !opts.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(ExecuteSummary {
            skipped: plan.len(),
            ..Default::default()
        });
    }

    println!();
    let mut summary = ExecuteSummary::default();
    let total = plan.len();

    for (i, change) in plan.changes.iter().enumerate() {
        ui::step(i + 1, total, &format!("{} {}", change.action.verb(), change.address));

        let (result, activation) = apply_change(client, change, state);
        summary.add_result(&result);

        if let ApplyResult::Failed { error } = &result {
            println!("    {} {}", "✗".red(), error);
        }
        if let Some(Activation::Failed { reason }) = &activation {
            summary.not_activated += 1;
            println!(
                "    {} staged but not activated: {}",
                "⚠".yellow(),
                reason
            );
        }

        state.touch(state_path)?;
    }

    print_summary(&summary);
    Ok(summary)
}

/// Run one change and record its outcome in `state`.
fn apply_change(
    client: &Client,
    change: &PlannedChange,
    state: &mut SyncState,
) -> (ApplyResult, Option<Activation>) {
    let address = &change.address;
    match &change.action {
        Action::Create { desired } | Action::Recreate { desired } => match client.create(desired) {
            Ok(mutation) => {
                let result = match state.track(address, &mutation.descriptor) {
                    Ok(()) => ApplyResult::Created,
                    Err(e) => ApplyResult::Failed {
                        error: format!("{e:#}"),
                    },
                };
                (result, Some(mutation.activation))
            }
            Err(e) => (failed(&e), None),
        },
        Action::Update { desired, .. } => match client.update(desired) {
            Ok(mutation) => {
                let result = match state.track(address, &mutation.descriptor) {
                    Ok(()) => ApplyResult::Modified,
                    Err(e) => ApplyResult::Failed {
                        error: format!("{e:#}"),
                    },
                };
                (result, Some(mutation.activation))
            }
            Err(e) => (failed(&e), None),
        },
        Action::Delete { tracked } => match client.delete(tracked) {
            Ok(mutation) => {
                state.forget(address);
                (ApplyResult::Removed, Some(mutation.activation))
            }
            Err(e) => (failed(&e), None),
        },
    }
}

fn failed(e: &ApiError) -> ApplyResult {
    log::debug!("{} error: {}", e.category(), e.category().advice());
    let error = match e {
        ApiError::Validation { kind, messages } => {
            format!("{kind} rejected by appliance:\n      {}", messages.join("\n      "))
        }
        other => other.to_string(),
    };
    ApplyResult::Failed { error }
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    println!();
    let confirmed = Confirm::new()
        .with_prompt("Apply these changes?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}

fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!(
            "  {} Configuration applied successfully!",
            "✓".green().bold()
        );
    } else {
        println!(
            "  {} Configuration applied with errors",
            "⚠".yellow().bold()
        );
    }

    if summary.created > 0 {
        println!("    • {} objects created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} objects updated", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} objects deleted", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} objects skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "objects".red());
    }
    if summary.not_activated > 0 {
        println!(
            "    • {} {} (run apply again or reconfigure the service)",
            summary.not_activated,
            "changes not activated".yellow()
        );
    }
}
