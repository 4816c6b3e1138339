//! Reconciliation engine for tally.
//!
//! One entry point per reconciliation flavor: [`sync_tasks`] and
//! [`sync_groups`] mirror the remote forests into the local store,
//! [`sync_time_records`] reconciles a time window, [`import_tasks`]
//! pushes file entries into the remote tree. Every entry point returns
//! a [`PassSummary`] so the calling layer can report status without the
//! core depending on any presentation format.

pub mod equality;
pub mod import;
pub mod membership;
pub mod path;
pub mod tree;
pub mod window;

use std::collections::BTreeSet;

use chrono::Utc;
use uuid::Uuid;

use crate::db::{
    CursorRepository, Database, GroupRepository, NewGroup, NewTask, SqliteCursorRepository,
    SqliteGroupRepository, SqliteTaskRepository, SqliteTimeRecordRepository, TaskRepository,
    TIME_RECORD_CURSOR,
};
use crate::error::Result;
use crate::models::{GroupContent, GroupId, TaskContent, TaskId};
use crate::remote::TrackerRemote;
use crate::sync::equality::ContentEquality;
use crate::sync::import::ImportEntry;
use crate::sync::membership::diff_members;
use crate::sync::tree::{Identity, MirrorRow, RemoteNode, TreeOutcome, TreeSink};
use crate::sync::window::{reconcile_window, SyncWindow, WindowMode, WindowOutcome};

/// One entity that could not be processed; the pass carried on without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub identity: String,
    pub message: String,
}

impl ItemFailure {
    #[must_use]
    pub const fn new(identity: String, message: String) -> Self {
        Self { identity, message }
    }
}

/// Counts and per-item failures for one pass.
///
/// A pass with failures but no fatal error is success-with-warnings,
/// not failure; fatal errors surface as `Err` from the entry points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub untouched: usize,
    pub failures: Vec<ItemFailure>,
}

impl PassSummary {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of write operations applied.
    #[must_use]
    pub const fn applied(&self) -> usize {
        self.added + self.updated + self.deleted
    }
}

impl From<TreeOutcome> for PassSummary {
    fn from(outcome: TreeOutcome) -> Self {
        Self {
            added: outcome.added,
            updated: outcome.updated,
            deleted: 0,
            untouched: outcome.untouched,
            failures: outcome.failures,
        }
    }
}

impl From<WindowOutcome> for PassSummary {
    fn from(outcome: WindowOutcome) -> Self {
        Self {
            added: outcome.added,
            updated: outcome.updated,
            deleted: outcome.tombstoned,
            untouched: 0,
            failures: outcome.failures,
        }
    }
}

/// Sink writing task nodes into the mirror store.
struct TaskMirrorSink<'a> {
    repo: SqliteTaskRepository<'a>,
}

impl TreeSink<TaskContent> for TaskMirrorSink<'_> {
    type Ref = TaskId;

    fn create(&mut self, node: &RemoteNode<TaskContent>, parent: Option<&TaskId>) -> Result<TaskId> {
        let task = self.repo.create(&NewTask {
            external_id: node.external_id.clone(),
            parent_id: parent.copied(),
            content: node.content.clone(),
        })?;
        Ok(task.id)
    }

    fn update(
        &mut self,
        target: &TaskId,
        node: &RemoteNode<TaskContent>,
        parent: Option<&TaskId>,
    ) -> Result<()> {
        self.repo
            .update_content(*target, parent.copied(), &node.content)
    }
}

/// Sink writing group nodes into the mirror store.
struct GroupMirrorSink<'a> {
    repo: SqliteGroupRepository<'a>,
}

impl TreeSink<GroupContent> for GroupMirrorSink<'_> {
    type Ref = GroupId;

    fn create(
        &mut self,
        node: &RemoteNode<GroupContent>,
        parent: Option<&GroupId>,
    ) -> Result<GroupId> {
        let group = self.repo.create(&NewGroup {
            external_id: node.external_id.clone(),
            parent_id: parent.copied(),
            content: node.content.clone(),
        })?;
        Ok(group.id)
    }

    fn update(
        &mut self,
        target: &GroupId,
        node: &RemoteNode<GroupContent>,
        parent: Option<&GroupId>,
    ) -> Result<()> {
        self.repo
            .update_content(*target, parent.copied(), &node.content)
    }
}

/// Mirror the remote task forest into the local store.
///
/// Tasks absent from the remote tree are left in the mirror untouched;
/// deletion-by-absence applies to groups only.
pub fn sync_tasks(remote: &dyn TrackerRemote, db: &Database) -> Result<PassSummary> {
    let remote_nodes = remote.fetch_task_tree()?;
    tracing::info!(count = remote_nodes.len(), "fetched remote task tree");

    let repo = SqliteTaskRepository::new(db.connection());
    let rows = repo
        .list_all()?
        .into_iter()
        .map(|task| MirrorRow {
            node_ref: task.id,
            external_id: task.external_id,
            parent_ref: task.parent_id,
            content: task.content,
        })
        .collect();
    let mut index = tree::mirror_index(rows);

    let mut sink = TaskMirrorSink { repo };
    let outcome = tree::reconcile(&remote_nodes, &mut index, &mut sink, &ContentEquality)?;
    Ok(outcome.into())
}

/// Mirror the remote group forest, member sets included.
///
/// After every group's tree node is resolved, its member set is diffed
/// against the mirror; once all groups are processed, local groups whose
/// identity no longer appears remotely are deleted (the store cascades
/// their memberships).
pub fn sync_groups(remote: &dyn TrackerRemote, db: &Database) -> Result<PassSummary> {
    let remote_nodes = remote.fetch_group_tree()?;
    tracing::info!(count = remote_nodes.len(), "fetched remote group tree");

    let repo = SqliteGroupRepository::new(db.connection());
    let rows = repo
        .list_all()?
        .into_iter()
        .map(|group| MirrorRow {
            node_ref: group.id,
            external_id: group.external_id,
            parent_ref: group.parent_id,
            content: group.content,
        })
        .collect();
    let mut index = tree::mirror_index(rows);
    let known_before: Vec<(Identity, GroupId)> = index
        .iter()
        .map(|(identity, entry)| (identity.clone(), entry.node_ref))
        .collect();

    let mut sink = GroupMirrorSink {
        repo: SqliteGroupRepository::new(db.connection()),
    };
    let outcome = tree::reconcile(&remote_nodes, &mut index, &mut sink, &ContentEquality)?;
    let mut summary = PassSummary::from(outcome);

    for node in &remote_nodes {
        // Membership sync needs a remote id to query members by
        let Some(external_id) = node.external_id.as_deref() else {
            continue;
        };
        let identity = Identity::External(external_id.to_string());
        let Some(entry) = index.get(&identity) else {
            continue; // node failed earlier in this pass
        };
        let group_id = entry.node_ref;

        let remote_members: BTreeSet<Uuid> =
            remote.fetch_group_members(external_id)?.into_iter().collect();
        let local_members = repo.members(group_id)?;
        let diff = diff_members(&remote_members, &local_members);

        for user in &diff.to_upsert {
            if repo.add_member(group_id, *user)? {
                summary.added += 1;
            }
        }
        for user in &diff.to_delete {
            if repo.remove_member(group_id, *user)? {
                summary.deleted += 1;
            }
        }
    }

    let remote_identities = tree::identity_set(&remote_nodes);
    for (identity, group_id) in known_before {
        if !remote_identities.contains(&identity) {
            tracing::info!(identity = %identity, "group vanished remotely, deleting mirror row");
            repo.delete(group_id)?;
            summary.deleted += 1;
        }
    }

    Ok(summary)
}

/// Reconcile the remote time records for a window into the mirror.
///
/// Without `full`, the stored cursor restricts the fetch to records
/// modified since the last pass; such a result says nothing about
/// absence, so no tombstones are written. With `full` (or on the very
/// first pass) the whole window is fetched and in-window absence is
/// tombstoned. Either way the cursor advances to this pass's start
/// time, not its completion time, so records modified mid-pass are
/// fetched again next time.
pub fn sync_time_records(
    remote: &dyn TrackerRemote,
    db: &Database,
    window: &SyncWindow,
    full: bool,
) -> Result<PassSummary> {
    let pass_started = Utc::now();

    let cursors = SqliteCursorRepository::new(db.connection());
    let watermark = if full {
        None
    } else {
        cursors.get(TIME_RECORD_CURSOR)?
    };
    let mode = if watermark.is_some() {
        WindowMode::Incremental
    } else {
        WindowMode::Full
    };

    let records = remote.fetch_time_records(window, watermark)?;
    tracing::info!(count = records.len(), window = %window, ?mode, "fetched remote time records");

    let repo = SqliteTimeRecordRepository::new(db.connection());
    let outcome = reconcile_window(window, &records, &repo, mode, Utc::now())?;

    cursors.set(TIME_RECORD_CURSOR, pass_started)?;
    Ok(outcome.into())
}

/// Push parsed file entries into the remote task tree.
pub fn import_tasks(remote: &dyn TrackerRemote, entries: &[ImportEntry]) -> Result<PassSummary> {
    tracing::info!(count = entries.len(), "importing task entries");
    let outcome = import::import_entries(remote, entries, &ContentEquality)?;
    Ok(outcome.into())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use chrono::{DateTime, NaiveDate, Utc};
    use pretty_assertions::assert_eq;

    use crate::db::TimeRecordRepository;
    use crate::models::TimeRecord;
    use crate::remote::NewRemoteTask;

    use super::*;

    /// Configurable in-memory remote for engine tests.
    #[derive(Default)]
    struct FakeRemote {
        tasks: Vec<RemoteNode<TaskContent>>,
        groups: Vec<RemoteNode<GroupContent>>,
        members: HashMap<String, Vec<Uuid>>,
        time_records: Vec<TimeRecord>,
        seen_watermarks: RefCell<Vec<Option<DateTime<Utc>>>>,
    }

    impl TrackerRemote for FakeRemote {
        fn fetch_task_tree(&self) -> Result<Vec<RemoteNode<TaskContent>>> {
            Ok(self.tasks.clone())
        }

        fn fetch_group_tree(&self) -> Result<Vec<RemoteNode<GroupContent>>> {
            Ok(self.groups.clone())
        }

        fn fetch_group_members(&self, group_external_id: &str) -> Result<Vec<Uuid>> {
            Ok(self
                .members
                .get(group_external_id)
                .cloned()
                .unwrap_or_default())
        }

        fn fetch_time_records(
            &self,
            _window: &SyncWindow,
            modified_since: Option<DateTime<Utc>>,
        ) -> Result<Vec<TimeRecord>> {
            self.seen_watermarks.borrow_mut().push(modified_since);
            Ok(self.time_records.clone())
        }

        fn create_task(&self, task: &NewRemoteTask) -> Result<String> {
            Ok(format!("created-{}", task.content.name))
        }

        fn update_task(&self, _external_id: &str, _task: &NewRemoteTask) -> Result<()> {
            Ok(())
        }
    }

    fn task_node(
        external_id: &str,
        parent: Option<&str>,
        name: &str,
    ) -> RemoteNode<TaskContent> {
        RemoteNode {
            external_id: Some(external_id.to_string()),
            parent_external_id: parent.map(ToString::to_string),
            content: TaskContent {
                name: name.to_string(),
                ..TaskContent::default()
            },
        }
    }

    fn group_node(external_id: &str, name: &str) -> RemoteNode<GroupContent> {
        RemoteNode {
            external_id: Some(external_id.to_string()),
            parent_external_id: None,
            content: GroupContent {
                name: name.to_string(),
                description: None,
            },
        }
    }

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn record(n: u128, start: &str, end: &str) -> TimeRecord {
        TimeRecord {
            uuid: uuid(n),
            task_external_id: Some("T-1".to_string()),
            start_time: DateTime::parse_from_rfc3339(start).unwrap(),
            end_time: DateTime::parse_from_rfc3339(end).unwrap(),
            duration_minutes: 480,
            billable: true,
            changed: false,
            closed: false,
            description: Some("work".to_string()),
            deleted_at: None,
        }
    }

    fn march_window() -> SyncWindow {
        SyncWindow::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn task_sync_is_idempotent_against_the_store() {
        let remote = FakeRemote {
            tasks: vec![
                task_node("T-1", None, "Root"),
                task_node("T-2", Some("T-1"), "Leaf"),
            ],
            ..FakeRemote::default()
        };
        let db = Database::open_in_memory().unwrap();

        let first = sync_tasks(&remote, &db).unwrap();
        assert_eq!(first.added, 2);
        assert!(first.is_clean());

        let second = sync_tasks(&remote, &db).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.untouched, 2);
    }

    #[test]
    fn task_sync_updates_only_the_changed_leaf() {
        let mut remote = FakeRemote {
            tasks: vec![
                task_node("T-1", None, "Root"),
                task_node("T-2", Some("T-1"), "Left"),
                task_node("T-3", Some("T-1"), "Right"),
            ],
            ..FakeRemote::default()
        };
        let db = Database::open_in_memory().unwrap();
        sync_tasks(&remote, &db).unwrap();

        remote.tasks[2].content.description = Some("changed".to_string());
        let summary = sync_tasks(&remote, &db).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.untouched, 2);
    }

    #[test]
    fn group_sync_applies_membership_diff() {
        let db = Database::open_in_memory().unwrap();

        let mut remote = FakeRemote {
            groups: vec![group_node("G-1", "Team")],
            ..FakeRemote::default()
        };
        remote
            .members
            .insert("G-1".to_string(), vec![uuid(2), uuid(3), uuid(4)]);
        sync_groups(&remote, &db).unwrap();

        // Remote membership changes: u1 joins, u4 leaves
        remote
            .members
            .insert("G-1".to_string(), vec![uuid(1), uuid(2), uuid(3)]);
        let summary = sync_groups(&remote, &db).unwrap();

        assert_eq!(summary.added, 1);
        assert_eq!(summary.deleted, 1);

        let repo = SqliteGroupRepository::new(db.connection());
        let group = repo.list_all().unwrap().remove(0);
        let members = repo.members(group.id).unwrap();
        assert_eq!(members, [uuid(1), uuid(2), uuid(3)].into_iter().collect());
    }

    #[test]
    fn two_groups_sharing_a_user_keep_one_row_each() {
        let db = Database::open_in_memory().unwrap();

        let mut remote = FakeRemote {
            groups: vec![group_node("G-1", "First"), group_node("G-2", "Second")],
            ..FakeRemote::default()
        };
        remote.members.insert("G-1".to_string(), vec![uuid(7)]);
        remote.members.insert("G-2".to_string(), vec![uuid(7)]);

        sync_groups(&remote, &db).unwrap();

        let repo = SqliteGroupRepository::new(db.connection());
        assert_eq!(repo.membership_count().unwrap(), 2);
        for group in repo.list_all().unwrap() {
            assert!(repo.members(group.id).unwrap().contains(&uuid(7)));
        }
    }

    #[test]
    fn vanished_group_is_deleted_with_its_memberships() {
        let db = Database::open_in_memory().unwrap();

        let mut remote = FakeRemote {
            groups: vec![group_node("G-1", "Keep"), group_node("G-2", "Drop")],
            ..FakeRemote::default()
        };
        remote.members.insert("G-2".to_string(), vec![uuid(1)]);
        sync_groups(&remote, &db).unwrap();

        remote.groups.truncate(1);
        remote.members.clear();
        let summary = sync_groups(&remote, &db).unwrap();

        // The group row and its membership row both count as deletions
        // only for rows that existed; the cascade handles memberships.
        assert_eq!(summary.deleted, 1);

        let repo = SqliteGroupRepository::new(db.connection());
        assert_eq!(repo.count().unwrap(), 1);
        assert_eq!(repo.membership_count().unwrap(), 0);
    }

    #[test]
    fn group_sync_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let mut remote = FakeRemote {
            groups: vec![group_node("G-1", "Team")],
            ..FakeRemote::default()
        };
        remote.members.insert("G-1".to_string(), vec![uuid(1)]);

        sync_groups(&remote, &db).unwrap();
        let second = sync_groups(&remote, &db).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.deleted, 0);
        assert_eq!(second.untouched, 1);
    }

    #[test]
    fn time_record_tombstone_toggles_across_passes() {
        let db = Database::open_in_memory().unwrap();
        let window = march_window();
        let rec = record(1, "2024-03-05T09:00:00+02:00", "2024-03-05T17:00:00+02:00");

        // Pass 1: record present
        let remote = FakeRemote {
            time_records: vec![rec.clone()],
            ..FakeRemote::default()
        };
        let first = sync_time_records(&remote, &db, &window, true).unwrap();
        assert_eq!(first.added, 1);

        let repo = SqliteTimeRecordRepository::new(db.connection());
        assert!(!repo.get(rec.uuid).unwrap().unwrap().is_tombstoned());

        // Pass 2: same window, record absent -> tombstoned
        let empty = FakeRemote::default();
        let second = sync_time_records(&empty, &db, &window, true).unwrap();
        assert_eq!(second.deleted, 1);
        assert!(repo.get(rec.uuid).unwrap().unwrap().is_tombstoned());

        // Pass 3: reappears with new content -> revived and overwritten
        let mut changed = rec.clone();
        changed.description = Some("restored".to_string());
        let remote = FakeRemote {
            time_records: vec![changed],
            ..FakeRemote::default()
        };
        let third = sync_time_records(&remote, &db, &window, true).unwrap();
        assert_eq!(third.updated, 1);

        let revived = repo.get(rec.uuid).unwrap().unwrap();
        assert!(!revived.is_tombstoned());
        assert_eq!(revived.description, Some("restored".to_string()));
    }

    #[test]
    fn partial_window_does_not_tombstone_outside_records() {
        let db = Database::open_in_memory().unwrap();
        let rec = record(1, "2024-03-20T09:00:00+01:00", "2024-03-20T17:00:00+01:00");

        let remote = FakeRemote {
            time_records: vec![rec.clone()],
            ..FakeRemote::default()
        };
        sync_time_records(&remote, &db, &march_window(), true).unwrap();

        // A later full pass over a window that doesn't touch the record
        let early_window = SyncWindow::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
        )
        .unwrap();
        let summary = sync_time_records(&FakeRemote::default(), &db, &early_window, true).unwrap();
        assert_eq!(summary.deleted, 0);

        let repo = SqliteTimeRecordRepository::new(db.connection());
        assert!(!repo.get(rec.uuid).unwrap().unwrap().is_tombstoned());
    }

    #[test]
    fn incremental_pass_uses_cursor_and_skips_tombstoning() {
        let db = Database::open_in_memory().unwrap();
        let window = march_window();
        let rec = record(1, "2024-03-05T09:00:00+01:00", "2024-03-05T17:00:00+01:00");

        // First incremental pass has no cursor yet: full semantics
        let remote = FakeRemote {
            time_records: vec![rec.clone()],
            ..FakeRemote::default()
        };
        sync_time_records(&remote, &db, &window, false).unwrap();
        assert_eq!(remote.seen_watermarks.borrow().as_slice(), &[None]);

        // Second incremental pass carries the watermark; the empty
        // (changed-only) result must not tombstone the known record
        let empty = FakeRemote::default();
        let summary = sync_time_records(&empty, &db, &window, false).unwrap();
        assert_eq!(summary.deleted, 0);
        assert!(empty.seen_watermarks.borrow()[0].is_some());

        let repo = SqliteTimeRecordRepository::new(db.connection());
        assert!(!repo.get(rec.uuid).unwrap().unwrap().is_tombstoned());
    }

    #[test]
    fn cursor_advances_to_pass_start() {
        let db = Database::open_in_memory().unwrap();
        let before = Utc::now();
        sync_time_records(&FakeRemote::default(), &db, &march_window(), false).unwrap();
        let after = Utc::now();

        let cursors = SqliteCursorRepository::new(db.connection());
        let cursor = cursors.get(TIME_RECORD_CURSOR).unwrap().unwrap();
        assert!(cursor >= before && cursor <= after);
    }

    #[test]
    fn import_entry_pass_reports_applied_counts() {
        let remote = FakeRemote::default();
        let summary =
            import_tasks(&remote, &[ImportEntry::from_path("A|B|C")]).unwrap();
        assert_eq!(summary.added, 3);
        assert_eq!(summary.applied(), 3);
        assert!(summary.is_clean());
    }
}
