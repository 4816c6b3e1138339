//! Task model
//!
//! Tasks form a forest. The local `id` is assigned by the mirror store; the
//! optional `external_id` is the remote service's stable identifier. Parent
//! linkage always uses the local id of the parent row, never the remote id.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Store-assigned identifier of a mirrored task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub i64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The mutable content fields of a task.
///
/// Exactly these fields participate in equality checks during
/// reconciliation; ids and parent linkage are handled separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContent {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Whether time can be booked on this task directly
    #[serde(default = "default_true")]
    pub bookable: bool,
    #[serde(default)]
    pub billable: bool,
    /// Free-form key/value fields carried by the remote service
    #[serde(default)]
    pub custom_fields: BTreeMap<String, String>,
    /// Validity interval, day granularity
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
}

const fn default_true() -> bool {
    true
}

impl TaskContent {
    /// A minimal content value, used for synthesized ancestor placeholders.
    ///
    /// Placeholders are not bookable so nobody can record time on a node
    /// that only exists to hold children.
    #[must_use]
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bookable: false,
            ..Self::default()
        }
    }
}

/// A task row in the mirror store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Store-assigned identifier
    pub id: TaskId,
    /// Remote identifier, unique when present
    #[serde(default)]
    pub external_id: Option<String>,
    /// Local parent reference (`None` for roots)
    #[serde(default)]
    pub parent_id: Option<TaskId>,
    #[serde(flatten)]
    pub content: TaskContent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_unbookable() {
        let content = TaskContent::placeholder("Projects");
        assert_eq!(content.name, "Projects");
        assert!(!content.bookable);
        assert!(!content.billable);
        assert!(content.custom_fields.is_empty());
    }

    #[test]
    fn content_equality_is_field_by_field() {
        let a = TaskContent {
            name: "Backend".to_string(),
            description: Some("API work".to_string()),
            ..TaskContent::default()
        };
        let mut b = a.clone();
        assert_eq!(a, b);

        b.billable = true;
        assert_ne!(a, b);
    }

    #[test]
    fn content_deserializes_with_defaults() {
        let content: TaskContent = serde_json::from_str(r#"{"name":"Ops"}"#).unwrap();
        assert!(content.bookable);
        assert!(!content.billable);
        assert_eq!(content.valid_from, None);
    }
}
