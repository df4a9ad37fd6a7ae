mod cli;
mod commands;
mod config;
mod engine;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    /// Explicit `--config`, if given
    pub config: Option<PathBuf>,
    pub state: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        ui::error(&format!("{e:#}"));
        if let Some(api) = e.chain().find_map(|c| c.downcast_ref::<opnsense::Error>()) {
            ui::dim(api.category().advice());
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        quiet: cli.quiet,
        config: cli.config,
        state: cli.state,
    };

    match cli.command {
        Command::Plan(args) => commands::plan::run(&ctx, &args),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Refresh(args) => commands::refresh::run(&ctx, &args),
        Command::Destroy(args) => commands::destroy::run(&ctx, &args),
        Command::Import { kind, name, id } => commands::import::run(&ctx, &kind, &name, &id),
        Command::State(cmd) => commands::state::run(&ctx, &cmd),
        Command::Kinds { kind } => commands::kinds::run(kind.as_deref()),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "opnsync", &mut io::stdout());
            Ok(())
        }
    }
}
