use std::path::Path;

use serde::Serialize;
use tally_core::db::{
    CursorRepository, GroupRepository, SqliteCursorRepository, SqliteGroupRepository,
    SqliteTaskRepository, SqliteTimeRecordRepository, TaskRepository, TimeRecordRepository,
    TIME_RECORD_CURSOR,
};

use crate::commands::common::open_database;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusItem {
    tasks: usize,
    groups: usize,
    memberships: usize,
    time_records: usize,
    tombstoned_time_records: usize,
    time_record_cursor: Option<String>,
}

pub fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let conn = db.connection();

    let tasks = SqliteTaskRepository::new(conn).count()?;
    let group_repo = SqliteGroupRepository::new(conn);
    let record_repo = SqliteTimeRecordRepository::new(conn);

    let status = StatusItem {
        tasks,
        groups: group_repo.count()?,
        memberships: group_repo.membership_count()?,
        time_records: record_repo.count()?,
        tombstoned_time_records: record_repo.tombstone_count()?,
        time_record_cursor: SqliteCursorRepository::new(conn)
            .get(TIME_RECORD_CURSOR)?
            .map(|cursor| cursor.to_rfc3339()),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("tasks:         {}", status.tasks);
    println!("groups:        {}", status.groups);
    println!("memberships:   {}", status.memberships);
    println!(
        "time records:  {} ({} tombstoned)",
        status.time_records, status.tombstoned_time_records
    );
    match status.time_record_cursor {
        Some(cursor) => println!("times cursor:  {cursor}"),
        None => println!("times cursor:  never synced"),
    }
    Ok(())
}
