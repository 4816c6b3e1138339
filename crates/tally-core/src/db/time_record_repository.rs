//! Time record mirror repository implementation

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::TimeRecord;

/// Trait for time record mirror storage operations
pub trait TimeRecordRepository {
    /// Get a record by uuid (tombstoned rows included)
    fn get(&self, uuid: Uuid) -> Result<Option<TimeRecord>>;

    /// Insert or overwrite the record keyed by its uuid
    fn upsert(&self, record: &TimeRecord) -> Result<()>;

    /// Records whose own interval touches the `[start, end]` day window,
    /// tombstoned rows included
    fn list_overlapping(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TimeRecord>>;

    /// Stamp a record's tombstone
    fn mark_deleted(&self, uuid: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Number of mirrored records
    fn count(&self) -> Result<usize>;

    /// Number of tombstoned records
    fn tombstone_count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `TimeRecordRepository`
pub struct SqliteTimeRecordRepository<'a> {
    conn: &'a Connection,
}

const RECORD_COLUMNS: &str = "uuid, task_external_id, start_time, end_time, duration_minutes, \
     billable, changed, closed, description, deleted_at";

impl<'a> SqliteTimeRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_record(row: &Row<'_>) -> rusqlite::Result<TimeRecord> {
        let uuid: String = row.get(0)?;
        Ok(TimeRecord {
            uuid: uuid.parse().unwrap_or_default(),
            task_external_id: row.get(1)?,
            start_time: row.get(2)?,
            end_time: row.get(3)?,
            duration_minutes: row.get(4)?,
            billable: row.get::<_, i32>(5)? != 0,
            changed: row.get::<_, i32>(6)? != 0,
            closed: row.get::<_, i32>(7)? != 0,
            description: row.get(8)?,
            deleted_at: row.get(9)?,
        })
    }
}

impl TimeRecordRepository for SqliteTimeRecordRepository<'_> {
    fn get(&self, uuid: Uuid) -> Result<Option<TimeRecord>> {
        let result = self.conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM time_records WHERE uuid = ?"),
            params![uuid.to_string()],
            Self::parse_record,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn upsert(&self, record: &TimeRecord) -> Result<()> {
        self.conn.execute(
            "INSERT INTO time_records (uuid, task_external_id, start_time, end_time,
                                       duration_minutes, billable, changed, closed,
                                       description, deleted_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(uuid) DO UPDATE SET
                 task_external_id = excluded.task_external_id,
                 start_time = excluded.start_time,
                 end_time = excluded.end_time,
                 duration_minutes = excluded.duration_minutes,
                 billable = excluded.billable,
                 changed = excluded.changed,
                 closed = excluded.closed,
                 description = excluded.description,
                 deleted_at = excluded.deleted_at",
            params![
                record.uuid.to_string(),
                record.task_external_id,
                record.start_time,
                record.end_time,
                record.duration_minutes,
                i32::from(record.billable),
                i32::from(record.changed),
                i32::from(record.closed),
                record.description,
                record.deleted_at,
            ],
        )?;
        Ok(())
    }

    fn list_overlapping(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<TimeRecord>> {
        // Overlap is evaluated on each record's own local calendar dates,
        // so the filter happens here rather than in SQL (SQLite's date()
        // would shift instants to UTC first).
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM time_records"))?;
        let records = stmt
            .query_map([], Self::parse_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records
            .into_iter()
            .filter(|record| record.overlaps_days(start, end))
            .collect())
    }

    fn mark_deleted(&self, uuid: Uuid, at: DateTime<Utc>) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE time_records SET deleted_at = ? WHERE uuid = ?",
            params![at, uuid.to_string()],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("time record {uuid}")));
        }
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM time_records", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn tombstone_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM time_records WHERE deleted_at IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
