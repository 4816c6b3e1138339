//! Sync cursor repository implementation
//!
//! Cursors are single key/value rows holding the exclusive lower bound
//! used to request only changed records on the next pass. A cursor is
//! written at the end of a successful pass with the pass's *start*
//! timestamp, so records modified mid-pass are not missed.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::Result;

/// Cursor key for the time record watermark.
pub const TIME_RECORD_CURSOR: &str = "time_records.last_modified";

/// Trait for sync cursor storage operations
pub trait CursorRepository {
    /// Read a cursor, `None` when it was never set or is unparseable
    fn get(&self, key: &str) -> Result<Option<DateTime<Utc>>>;

    /// Write a cursor
    fn set(&self, key: &str, value: DateTime<Utc>) -> Result<()>;
}

/// `SQLite` implementation of `CursorRepository`
pub struct SqliteCursorRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCursorRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CursorRepository for SqliteCursorRepository<'_> {
    fn get(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let result = self.conn.query_row(
            "SELECT value FROM metadata WHERE key = ?",
            params![key],
            |row| row.get::<_, String>(0),
        );

        let raw = match result {
            Ok(raw) => raw,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => Ok(Some(parsed.with_timezone(&Utc))),
            Err(_) => {
                tracing::warn!(key, value = %raw, "unparseable cursor value ignored");
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: DateTime<Utc>) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)",
            params![key, value.to_rfc3339()],
        )?;
        Ok(())
    }
}
