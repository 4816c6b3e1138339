//! tally CLI - batch sync between a remote time tracker and a local mirror

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::common::resolve_db_path;
use crate::error::CliError;

fn main() {
    if let Err(error) = run() {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tally_core=info".parse().unwrap())
                .add_directive("tally_cli=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Sync { command } => match command {
            SyncCommands::Tasks { json } => commands::sync::run_sync_tasks(json, &db_path),
            SyncCommands::Groups { json } => commands::sync::run_sync_groups(json, &db_path),
            SyncCommands::Times {
                from,
                to,
                full,
                json,
            } => commands::sync::run_sync_times(
                from.as_deref(),
                to.as_deref(),
                full,
                json,
                &db_path,
            ),
        },
        Commands::Import { file, json } => commands::import::run_import(&file, json),
        Commands::Status { json } => commands::status::run_status(json, &db_path),
        Commands::Completions { shell, output } => {
            commands::completions::run_completions(shell, output.as_deref())
        }
    }
}
