//! Time-window soft-delete reconciliation.
//!
//! Every remote record sighted inside the queried window is written to
//! the mirror with its tombstone cleared. Absence is only meaningful for
//! a full-window pass: records previously imported whose own interval
//! overlaps the queried window and whose uuid is missing from the remote
//! result get `deleted_at` stamped. A record reappearing in a later
//! overlapping query is revived, so tombstone state is relative to the
//! last queried window, not to global remote truth.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::TimeRecordRepository;
use crate::error::{Error, Result};
use crate::models::TimeRecord;
use crate::sync::ItemFailure;

/// A validated, inclusive day window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl SyncWindow {
    /// Build a window, rejecting inverted bounds.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::Validation(format!(
                "window start {start} is after window end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse window bounds from raw tokens.
    ///
    /// Both bounds are required; a missing bound, an unparseable token,
    /// or inverted bounds all fail before any remote call is made.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let (Some(from), Some(to)) = (from, to) else {
            return Err(Error::Validation(
                "both window bounds are required (--from and --to)".to_string(),
            ));
        };
        Self::new(parse_date(from)?, parse_date(to)?)
    }

    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }
}

impl std::fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Parse a day token, accepting a bare date or an RFC 3339 instant
/// (truncated to its date portion).
pub fn parse_date(token: &str) -> Result<NaiveDate> {
    let token = token.trim();
    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(token) {
        return Ok(instant.date_naive());
    }
    Err(Error::Validation(format!("unparseable date '{token}'")))
}

/// How absence from the remote result is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// The remote result covers the whole window; in-window absence
    /// means "not currently active" and is tombstoned.
    Full,
    /// The remote result is filtered by a modified-since watermark;
    /// absence carries no information, so only upserts happen.
    Incremental,
}

/// Counts for one window reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowOutcome {
    pub added: usize,
    pub updated: usize,
    pub tombstoned: usize,
    pub failures: Vec<ItemFailure>,
}

/// Reconcile the remote records for `window` against the mirror.
///
/// Content fields of sighted records are overwritten unconditionally and
/// their tombstones cleared; no equality gate applies here because the
/// remote already filtered to the requested window. `now` stamps any new
/// tombstones.
pub fn reconcile_window(
    window: &SyncWindow,
    remote_records: &[TimeRecord],
    repo: &dyn TimeRecordRepository,
    mode: WindowMode,
    now: DateTime<Utc>,
) -> Result<WindowOutcome> {
    let mut outcome = WindowOutcome::default();
    let mut sighted: HashSet<Uuid> = HashSet::with_capacity(remote_records.len());

    for record in remote_records {
        if record.end_time < record.start_time {
            tracing::warn!(
                uuid = %record.uuid,
                start = %record.start_time,
                end = %record.end_time,
                "skipping time record with inverted interval"
            );
            outcome.failures.push(ItemFailure::new(
                record.uuid.to_string(),
                format!(
                    "inverted interval: starts {} ends {}",
                    record.start_time, record.end_time
                ),
            ));
            continue;
        }

        let mut fresh = record.clone();
        fresh.deleted_at = None;

        let existed = repo.get(record.uuid)?.is_some();
        repo.upsert(&fresh)?;
        sighted.insert(record.uuid);
        if existed {
            outcome.updated += 1;
        } else {
            outcome.added += 1;
        }
    }

    if mode == WindowMode::Full {
        for local in repo.list_overlapping(window.start(), window.end())? {
            if sighted.contains(&local.uuid) || local.is_tombstoned() {
                continue;
            }
            repo.mark_deleted(local.uuid, now)?;
            outcome.tombstoned += 1;
            tracing::debug!(uuid = %local.uuid, window = %window, "tombstoned by absence");
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn new_rejects_inverted_bounds() {
        let error = SyncWindow::new(day(10), day(1)).unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
    }

    #[test]
    fn parse_requires_both_bounds() {
        assert!(matches!(
            SyncWindow::parse(None, Some("2024-03-01")),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            SyncWindow::parse(Some("2024-03-01"), None),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            SyncWindow::parse(None, None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn parse_rejects_invalid_tokens() {
        assert!(matches!(
            SyncWindow::parse(Some("not-a-date"), Some("2024-03-01")),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            SyncWindow::parse(Some("2024-03-05"), Some("2024-03-01")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn parse_accepts_dates_and_instants() {
        let window =
            SyncWindow::parse(Some("2024-03-01"), Some("2024-03-05T10:00:00+02:00")).unwrap();
        assert_eq!(window.start(), day(1));
        assert_eq!(window.end(), day(5));
    }

    #[test]
    fn single_day_window_is_valid() {
        let window = SyncWindow::new(day(7), day(7)).unwrap();
        assert_eq!(window.to_string(), "2024-03-07..2024-03-07");
    }
}
