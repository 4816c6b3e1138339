use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Mirror tasks, teams, and time records from a remote time tracker")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local mirror database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mirror remote entities into the local store
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Import a task file into the remote tracker
    Import {
        /// CSV file with a 'path' column ('A|B|C' style task paths)
        file: PathBuf,
        /// Output the pass summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show mirror counts and sync cursor state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Mirror the remote task tree
    Tasks {
        /// Output the pass summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mirror the remote groups and their member lists
    Groups {
        /// Output the pass summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reconcile time records for a window
    Times {
        /// Window start (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        from: Option<String>,
        /// Window end (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        to: Option<String>,
        /// Ignore the stored cursor, fetch the whole window, and
        /// tombstone records absent from it
        #[arg(long)]
        full: bool,
        /// Output the pass summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
