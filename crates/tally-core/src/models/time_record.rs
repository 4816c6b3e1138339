//! Time record model
//!
//! Records are identified by the remote-assigned `uuid` and are never
//! physically deleted by the reconciler; `deleted_at` is a logical
//! tombstone that toggles with window reconciliation.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A time record in the mirror store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecord {
    /// Remote-assigned, globally stable identity
    pub uuid: Uuid,
    /// Remote id of the task the time was booked on
    #[serde(default)]
    pub task_external_id: Option<String>,
    /// Start instant, kept at the record's declared UTC offset
    pub start_time: DateTime<FixedOffset>,
    /// End instant, kept at the record's declared UTC offset
    pub end_time: DateTime<FixedOffset>,
    pub duration_minutes: i64,
    pub billable: bool,
    pub changed: bool,
    pub closed: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Tombstone; set when the record's window was queried but the uuid
    /// was absent, cleared when the record is sighted again
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TimeRecord {
    /// Local calendar date the record starts on, at its declared offset.
    #[must_use]
    pub fn start_date(&self) -> NaiveDate {
        self.start_time.date_naive()
    }

    /// Local calendar date the record ends on, at its declared offset.
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.end_time.date_naive()
    }

    /// Whether the record's own interval touches the `[start, end]` day window.
    #[must_use]
    pub fn overlaps_days(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date() <= end && self.end_date() >= start
    }

    #[must_use]
    pub const fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(start: &str, end: &str) -> TimeRecord {
        TimeRecord {
            uuid: "018e5b3a2f1c7d4e8a9b0c1d2e3f4a5b".parse().unwrap(),
            task_external_id: Some("T-1".to_string()),
            start_time: DateTime::parse_from_rfc3339(start).unwrap(),
            end_time: DateTime::parse_from_rfc3339(end).unwrap(),
            duration_minutes: 480,
            billable: true,
            changed: false,
            closed: false,
            description: None,
            deleted_at: None,
        }
    }

    #[test]
    fn dates_use_the_declared_offset() {
        // 23:30+02:00 is still the same local day even though it is the
        // next day in UTC terms only when shifted the other way.
        let record = record("2024-03-01T23:30:00+02:00", "2024-03-02T00:30:00+02:00");
        assert_eq!(
            record.start_date(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(
            record.end_date(),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }

    #[test]
    fn overlap_is_inclusive_on_both_ends() {
        let record = record("2024-03-05T09:00:00+01:00", "2024-03-05T17:00:00+01:00");
        let day = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();

        assert!(record.overlaps_days(day(5), day(5)));
        assert!(record.overlaps_days(day(1), day(5)));
        assert!(record.overlaps_days(day(5), day(9)));
        assert!(!record.overlaps_days(day(6), day(9)));
        assert!(!record.overlaps_days(day(1), day(4)));
    }

    #[test]
    fn rfc3339_roundtrip_preserves_offset() {
        let record = record("2024-03-01T09:00:00+05:30", "2024-03-01T17:00:00+05:30");
        let json = serde_json::to_string(&record).unwrap();
        let back: TimeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
        assert_eq!(back.start_time.offset().local_minus_utc(), 330 * 60);
    }
}
