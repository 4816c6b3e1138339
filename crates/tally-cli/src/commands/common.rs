use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tally_core::config::RemoteConfig;
use tally_core::db::Database;
use tally_core::remote::HttpTrackerRemote;
use tally_core::PassSummary;

use crate::error::CliError;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TALLY_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tally")
        .join("tally.db")
}

pub fn open_database(path: &Path) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open(path)?)
}

pub fn remote_from_env() -> Result<HttpTrackerRemote, CliError> {
    let config = RemoteConfig::from_env()?.ok_or(CliError::RemoteNotConfigured)?;
    tracing::debug!(?config, "remote configured");
    Ok(HttpTrackerRemote::new(config)?)
}

#[derive(Debug, Serialize)]
struct SummaryItem<'a> {
    pass: &'a str,
    added: usize,
    updated: usize,
    deleted: usize,
    untouched: usize,
    failures: Vec<FailureItem<'a>>,
}

#[derive(Debug, Serialize)]
struct FailureItem<'a> {
    identity: &'a str,
    message: &'a str,
}

/// Print a pass summary; failures make it success-with-warnings, not
/// an error exit.
pub fn render_summary(pass: &str, summary: &PassSummary, as_json: bool) -> Result<(), CliError> {
    if as_json {
        let item = SummaryItem {
            pass,
            added: summary.added,
            updated: summary.updated,
            deleted: summary.deleted,
            untouched: summary.untouched,
            failures: summary
                .failures
                .iter()
                .map(|failure| FailureItem {
                    identity: &failure.identity,
                    message: &failure.message,
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&item)?);
        return Ok(());
    }

    for line in format_summary_lines(pass, summary) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_summary_lines(pass: &str, summary: &PassSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "{pass}: {} added, {} updated, {} deleted, {} untouched{}",
        summary.added,
        summary.updated,
        summary.deleted,
        summary.untouched,
        if summary.is_clean() {
            String::new()
        } else {
            format!(", {} failed", summary.failures.len())
        }
    )];
    for failure in &summary.failures {
        lines.push(format!("  failed {}: {}", failure.identity, failure.message));
    }
    lines
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tally_core::ItemFailure;

    use super::*;

    #[test]
    fn clean_summary_renders_one_line() {
        let summary = PassSummary {
            added: 2,
            updated: 1,
            deleted: 0,
            untouched: 7,
            failures: vec![],
        };
        let lines = format_summary_lines("tasks", &summary);
        assert_eq!(lines, vec!["tasks: 2 added, 1 updated, 0 deleted, 7 untouched"]);
    }

    #[test]
    fn failures_are_listed_under_the_counts() {
        let summary = PassSummary {
            failures: vec![ItemFailure::new(
                "id:T-9".to_string(),
                "duplicate identity".to_string(),
            )],
            ..PassSummary::default()
        };
        let lines = format_summary_lines("tasks", &summary);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("1 failed"));
        assert_eq!(lines[1], "  failed id:T-9: duplicate identity");
    }

    #[test]
    fn resolve_db_path_prefers_cli_value() {
        let explicit = PathBuf::from("/tmp/custom.db");
        assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
    }
}
