//! Group and membership repository implementation

use std::collections::BTreeSet;

use rusqlite::{params, Connection, Row};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Group, GroupContent, GroupId};

/// Fields needed to create a group row; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub external_id: Option<String>,
    pub parent_id: Option<GroupId>,
    pub content: GroupContent,
}

/// Trait for group mirror storage operations
pub trait GroupRepository {
    /// Insert a new group row and return it with its assigned id
    fn create(&self, new: &NewGroup) -> Result<Group>;

    /// Get a group by local id
    fn get(&self, id: GroupId) -> Result<Option<Group>>;

    /// Load every group row
    fn list_all(&self) -> Result<Vec<Group>>;

    /// Overwrite a group's content fields and parent linkage
    fn update_content(
        &self,
        id: GroupId,
        parent_id: Option<GroupId>,
        content: &GroupContent,
    ) -> Result<()>;

    /// Delete a group row; the store cascades its memberships away
    fn delete(&self, id: GroupId) -> Result<()>;

    /// Current member set of a group
    fn members(&self, group_id: GroupId) -> Result<BTreeSet<Uuid>>;

    /// Insert a membership if absent (idempotent); `true` when a row
    /// was actually inserted
    fn add_member(&self, group_id: GroupId, user_uuid: Uuid) -> Result<bool>;

    /// Remove a membership; `true` when a row was actually removed
    fn remove_member(&self, group_id: GroupId, user_uuid: Uuid) -> Result<bool>;

    /// Number of mirrored groups
    fn count(&self) -> Result<usize>;

    /// Number of membership rows across all groups
    fn membership_count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `GroupRepository`
pub struct SqliteGroupRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteGroupRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_group(row: &Row<'_>) -> rusqlite::Result<Group> {
        Ok(Group {
            id: GroupId(row.get(0)?),
            external_id: row.get(1)?,
            parent_id: row.get::<_, Option<i64>>(2)?.map(GroupId),
            content: GroupContent {
                name: row.get(3)?,
                description: row.get(4)?,
            },
        })
    }
}

impl GroupRepository for SqliteGroupRepository<'_> {
    fn create(&self, new: &NewGroup) -> Result<Group> {
        self.conn.execute(
            "INSERT INTO groups (external_id, parent_id, name, description) VALUES (?, ?, ?, ?)",
            params![
                new.external_id,
                new.parent_id.map(|id| id.0),
                new.content.name,
                new.content.description,
            ],
        )?;

        let id = GroupId(self.conn.last_insert_rowid());
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("group {id} after insert")))
    }

    fn get(&self, id: GroupId) -> Result<Option<Group>> {
        let result = self.conn.query_row(
            "SELECT id, external_id, parent_id, name, description FROM groups WHERE id = ?",
            params![id.0],
            Self::parse_group,
        );

        match result {
            Ok(group) => Ok(Some(group)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_all(&self) -> Result<Vec<Group>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, external_id, parent_id, name, description FROM groups ORDER BY id",
        )?;
        let groups = stmt
            .query_map([], Self::parse_group)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    fn update_content(
        &self,
        id: GroupId,
        parent_id: Option<GroupId>,
        content: &GroupContent,
    ) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE groups SET parent_id = ?, name = ?, description = ? WHERE id = ?",
            params![
                parent_id.map(|id| id.0),
                content.name,
                content.description,
                id.0
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("group {id}")));
        }
        Ok(())
    }

    fn delete(&self, id: GroupId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM groups WHERE id = ?", params![id.0])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("group {id}")));
        }
        Ok(())
    }

    fn members(&self, group_id: GroupId) -> Result<BTreeSet<Uuid>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_uuid FROM memberships WHERE group_id = ?")?;
        let uuids = stmt
            .query_map(params![group_id.0], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut members = BTreeSet::new();
        for raw in uuids {
            match raw.parse::<Uuid>() {
                Ok(uuid) => {
                    members.insert(uuid);
                }
                Err(_) => {
                    tracing::warn!(group = %group_id, value = %raw, "unparseable member uuid in mirror");
                }
            }
        }
        Ok(members)
    }

    fn add_member(&self, group_id: GroupId, user_uuid: Uuid) -> Result<bool> {
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO memberships (group_id, user_uuid) VALUES (?, ?)",
            params![group_id.0, user_uuid.to_string()],
        )?;
        Ok(rows > 0)
    }

    fn remove_member(&self, group_id: GroupId, user_uuid: Uuid) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM memberships WHERE group_id = ? AND user_uuid = ?",
            params![group_id.0, user_uuid.to_string()],
        )?;
        Ok(rows > 0)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM groups", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn membership_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM memberships", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::db::Database;

    use super::*;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn new_group(name: &str, external_id: Option<&str>) -> NewGroup {
        NewGroup {
            external_id: external_id.map(ToString::to_string),
            parent_id: None,
            content: GroupContent {
                name: name.to_string(),
                description: None,
            },
        }
    }

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn test_create_get_update() {
        let db = setup();
        let repo = SqliteGroupRepository::new(db.connection());

        let group = repo.create(&new_group("Platform", Some("G-1"))).unwrap();
        assert_eq!(group.content.name, "Platform");

        let content = GroupContent {
            name: "Platform Eng".to_string(),
            description: Some("renamed".to_string()),
        };
        repo.update_content(group.id, None, &content).unwrap();
        assert_eq!(repo.get(group.id).unwrap().unwrap().content, content);
    }

    #[test]
    fn test_add_member_is_idempotent() {
        let db = setup();
        let repo = SqliteGroupRepository::new(db.connection());
        let group = repo.create(&new_group("Team", None)).unwrap();

        assert!(repo.add_member(group.id, uuid(1)).unwrap());
        assert!(!repo.add_member(group.id, uuid(1)).unwrap());
        assert!(repo.add_member(group.id, uuid(2)).unwrap());

        let members = repo.members(group.id).unwrap();
        assert_eq!(members.len(), 2);
        assert!(members.contains(&uuid(1)));
    }

    #[test]
    fn test_remove_member() {
        let db = setup();
        let repo = SqliteGroupRepository::new(db.connection());
        let group = repo.create(&new_group("Team", None)).unwrap();

        repo.add_member(group.id, uuid(1)).unwrap();
        assert!(repo.remove_member(group.id, uuid(1)).unwrap());
        assert!(!repo.remove_member(group.id, uuid(1)).unwrap());
        assert!(repo.members(group.id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_cascades_memberships() {
        let db = setup();
        let repo = SqliteGroupRepository::new(db.connection());
        let group = repo.create(&new_group("Doomed", None)).unwrap();
        repo.add_member(group.id, uuid(1)).unwrap();

        repo.delete(group.id).unwrap();
        assert!(repo.get(group.id).unwrap().is_none());
        assert_eq!(repo.membership_count().unwrap(), 0);
    }

    #[test]
    fn test_one_user_in_two_groups_keeps_two_rows() {
        let db = setup();
        let repo = SqliteGroupRepository::new(db.connection());
        let first = repo.create(&new_group("First", Some("G-1"))).unwrap();
        let second = repo.create(&new_group("Second", Some("G-2"))).unwrap();

        repo.add_member(first.id, uuid(7)).unwrap();
        repo.add_member(second.id, uuid(7)).unwrap();

        assert_eq!(repo.membership_count().unwrap(), 2);
        assert!(repo.members(first.id).unwrap().contains(&uuid(7)));
        assert!(repo.members(second.id).unwrap().contains(&uuid(7)));
    }
}
