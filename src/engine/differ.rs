//! Plan display

use colored::Colorize;
use opnsense::ResourceKind;

use super::planner::{Action, ExecutionPlan, PlannedChange};

fn kind_title(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::FirewallRule => "Firewall rules",
        ResourceKind::NatDestination => "Port forwards (destination NAT)",
        ResourceKind::KeaSubnet => "DHCP subnets (Kea)",
        ResourceKind::KeaReservation => "DHCP reservations (Kea)",
        ResourceKind::WireguardServer => "WireGuard servers",
    }
}

fn symbol(action: &Action) -> String {
    match action {
        Action::Create { .. } => "+".green().to_string(),
        Action::Recreate { .. } => "-/+".yellow().to_string(),
        Action::Update { .. } => "~".yellow().to_string(),
        Action::Delete { .. } => "-".red().to_string(),
    }
}

fn describe(change: &PlannedChange) -> String {
    match &change.action {
        Action::Create { .. } => "(will create)".to_string(),
        Action::Recreate { .. } => "(gone from appliance, will recreate)".to_string(),
        Action::Update { changes, .. } => format!(
            "({} {})",
            changes.len(),
            if changes.len() == 1 { "change" } else { "changes" }
        ),
        Action::Delete { tracked } => match tracked.id() {
            Some(id) => format!("(will delete {id})"),
            None => "(will delete)".to_string(),
        },
    }
}

/// Display a plan in a user-friendly format
pub fn display_diff(plan: &ExecutionPlan) {
    if plan.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Configuration Diff".bold()
    );
    println!("│");

    let mut current: Option<ResourceKind> = None;
    for change in &plan.changes {
        if current != Some(change.address.kind) {
            if current.is_some() {
                println!("│");
            }
            println!("│ {}", kind_title(change.address.kind).bold());
            current = Some(change.address.kind);
        }

        println!(
            "│   {} {:<30} {}",
            symbol(&change.action),
            change.address.name,
            describe(change).dimmed()
        );

        if let Action::Update { changes, .. } = &change.action {
            for field in changes {
                println!(
                    "│       {}: {} → {}",
                    field.name,
                    field.from.as_deref().unwrap_or("(unset)").dimmed(),
                    field.to
                );
            }
        }
    }
    println!("│");

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to create, {} to update, {} to delete, {} unchanged",
        (plan.count("create") + plan.count("recreate")).to_string().green(),
        plan.count("update").to_string().yellow(),
        plan.count("delete").to_string().red(),
        plan.unchanged
    );
    println!("└─────────────────────────────────────────────────────┘");
}
