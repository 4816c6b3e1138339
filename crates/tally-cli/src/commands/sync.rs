use std::path::Path;

use tally_core::sync::window::SyncWindow;
use tally_core::sync::{sync_groups, sync_tasks, sync_time_records};

use crate::commands::common::{open_database, remote_from_env, render_summary};
use crate::error::CliError;

pub fn run_sync_tasks(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let remote = remote_from_env()?;
    let db = open_database(db_path)?;
    let summary = sync_tasks(&remote, &db)?;
    render_summary("tasks", &summary, as_json)
}

pub fn run_sync_groups(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let remote = remote_from_env()?;
    let db = open_database(db_path)?;
    let summary = sync_groups(&remote, &db)?;
    render_summary("groups", &summary, as_json)
}

pub fn run_sync_times(
    from: Option<&str>,
    to: Option<&str>,
    full: bool,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    // Window bounds are validated before anything talks to the remote
    let window = SyncWindow::parse(from, to)?;

    let remote = remote_from_env()?;
    let db = open_database(db_path)?;
    let summary = sync_time_records(&remote, &db, &window, full)?;
    render_summary("times", &summary, as_json)
}
