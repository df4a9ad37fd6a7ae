use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "opnsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative configuration sync for OPNsense appliances", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace with raw bodies)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ./opnsync.toml, then ~/.config/opnsync/opnsync.toml)
    #[arg(short, long, global = true, env = "OPNSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// State file
    #[arg(
        short,
        long,
        global = true,
        env = "OPNSYNC_STATE",
        default_value = "opnsync.state.json"
    )]
    pub state: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Make the appliance match the config
    Apply(ApplyArgs),

    /// Re-read tracked objects and drop the ones that no longer exist
    Refresh(TargetArgs),

    /// Delete every tracked object from the appliance
    Destroy(DestroyArgs),

    /// Start tracking an object that already exists on the appliance
    Import {
        /// Resource kind (e.g. firewall_rule)
        kind: String,
        /// Local name for the object
        name: String,
        /// Identifier assigned by the appliance (UUID)
        id: String,
    },

    /// Inspect or edit tracked state
    #[command(subcommand)]
    State(StateCommand),

    /// List supported resource kinds and their attributes
    Kinds {
        /// Show the attribute table of one kind
        kind: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Clone, Default)]
pub struct TargetArgs {
    /// Limit to a kind or one object (e.g. kea_subnet or kea_subnet.lab)
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Plan against tracked state without reading the appliance first
    #[arg(long)]
    pub no_refresh: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Show the plan but make no changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Plan against tracked state without reading the appliance first
    #[arg(long)]
    pub no_refresh: bool,
}

#[derive(Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Show what would be deleted but make no changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum StateCommand {
    /// List tracked objects
    List,

    /// Show one tracked object
    Show {
        /// Address (kind.name)
        address: String,
    },

    /// Stop tracking an object without touching the appliance
    Rm {
        /// Address (kind.name)
        address: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply_flags() {
        let cli = Cli::try_parse_from([
            "opnsync",
            "-vv",
            "apply",
            "--target",
            "kea_subnet.lab",
            "--dry-run",
            "-y",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.target.target.as_deref(), Some("kea_subnet.lab"));
                assert!(args.dry_run);
                assert!(args.yes);
                assert!(!args.no_refresh);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from([
            "opnsync",
            "--state",
            "/tmp/s.json",
            "import",
            "nat_destination",
            "ssh",
            "6f1c0a1e",
        ])
        .unwrap();
        assert_eq!(cli.state, PathBuf::from("/tmp/s.json"));
        assert!(matches!(cli.command, Command::Import { ref kind, .. } if kind == "nat_destination"));
    }
}
