//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get::<_, i32>(0).map(|v| v != 0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        -- Mirrored task forest
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY,
            external_id TEXT UNIQUE,
            parent_id INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
            name TEXT NOT NULL,
            description TEXT,
            bookable INTEGER NOT NULL DEFAULT 1,
            billable INTEGER NOT NULL DEFAULT 0,
            custom_fields TEXT NOT NULL DEFAULT '{}',
            valid_from TEXT,
            valid_to TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id);

        -- Mirrored group forest
        CREATE TABLE IF NOT EXISTS groups (
            id INTEGER PRIMARY KEY,
            external_id TEXT UNIQUE,
            parent_id INTEGER REFERENCES groups(id) ON DELETE SET NULL,
            name TEXT NOT NULL,
            description TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_groups_parent ON groups(parent_id);

        -- Group memberships; rows go away with their group
        CREATE TABLE IF NOT EXISTS memberships (
            group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            user_uuid TEXT NOT NULL,
            PRIMARY KEY (group_id, user_uuid)
        );

        -- Mirrored time records; deletion is logical only
        CREATE TABLE IF NOT EXISTS time_records (
            uuid TEXT PRIMARY KEY,
            task_external_id TEXT,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            billable INTEGER NOT NULL DEFAULT 0,
            changed INTEGER NOT NULL DEFAULT 0,
            closed INTEGER NOT NULL DEFAULT 0,
            description TEXT,
            deleted_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_time_records_start ON time_records(start_time);
        CREATE INDEX IF NOT EXISTS idx_time_records_deleted ON time_records(deleted_at);

        -- Sync cursors and other key/value state
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Record migration version
        INSERT INTO schema_version (version) VALUES (1);
        COMMIT;",
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
