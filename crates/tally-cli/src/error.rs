use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tally_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Import file error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Import file has no '{0}' column")]
    MissingColumn(String),
    #[error(
        "Remote is not configured. Set TALLY_API_URL and TALLY_API_TOKEN to enable sync and import."
    )]
    RemoteNotConfigured,
}
