//! Remote tracker service access.
//!
//! The reconciliation engine only sees the [`TrackerRemote`] trait;
//! [`HttpTrackerRemote`] is the production JSON/HTTP implementation.
//! Transport retries, if any, belong to the caller, not here.

mod client;

pub use client::HttpTrackerRemote;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{GroupContent, TaskContent, TimeRecord};
use crate::sync::tree::RemoteNode;
use crate::sync::window::SyncWindow;

/// A task to create or overwrite on the remote side (import direction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRemoteTask {
    /// Remote id of the parent task, `None` for roots
    pub parent_external_id: Option<String>,
    pub content: TaskContent,
}

/// Read/write operations the reconciliation core consumes.
pub trait TrackerRemote {
    /// Fetch the full task forest
    fn fetch_task_tree(&self) -> Result<Vec<RemoteNode<TaskContent>>>;

    /// Fetch the full group forest
    fn fetch_group_tree(&self) -> Result<Vec<RemoteNode<GroupContent>>>;

    /// Fetch the current member uuids of one group
    fn fetch_group_members(&self, group_external_id: &str) -> Result<Vec<Uuid>>;

    /// Fetch the time records active within the window, optionally
    /// restricted to records modified after the watermark
    fn fetch_time_records(
        &self,
        window: &SyncWindow,
        modified_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeRecord>>;

    /// Create a task remotely; returns its assigned remote id
    fn create_task(&self, task: &NewRemoteTask) -> Result<String>;

    /// Overwrite a remote task's content fields
    fn update_task(&self, external_id: &str, task: &NewRemoteTask) -> Result<()>;
}
