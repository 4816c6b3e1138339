//! Task mirror repository implementation

use rusqlite::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{Task, TaskContent, TaskId};

/// Fields needed to create a task row; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub external_id: Option<String>,
    pub parent_id: Option<TaskId>,
    pub content: TaskContent,
}

/// Trait for task mirror storage operations
pub trait TaskRepository {
    /// Insert a new task row and return it with its assigned id
    fn create(&self, new: &NewTask) -> Result<Task>;

    /// Get a task by local id
    fn get(&self, id: TaskId) -> Result<Option<Task>>;

    /// Load every task row (the reconciler builds its index from this)
    fn list_all(&self) -> Result<Vec<Task>>;

    /// Overwrite a task's content fields and parent linkage
    fn update_content(
        &self,
        id: TaskId,
        parent_id: Option<TaskId>,
        content: &TaskContent,
    ) -> Result<()>;

    /// Number of mirrored tasks
    fn count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `TaskRepository`
pub struct SqliteTaskRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTaskRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_task(row: &Row<'_>) -> rusqlite::Result<Task> {
        let custom_fields: String = row.get(7)?;
        Ok(Task {
            id: TaskId(row.get(0)?),
            external_id: row.get(1)?,
            parent_id: row.get::<_, Option<i64>>(2)?.map(TaskId),
            content: TaskContent {
                name: row.get(3)?,
                description: row.get(4)?,
                bookable: row.get::<_, i32>(5)? != 0,
                billable: row.get::<_, i32>(6)? != 0,
                custom_fields: serde_json::from_str(&custom_fields).unwrap_or_default(),
                valid_from: row.get(8)?,
                valid_to: row.get(9)?,
            },
        })
    }
}

const TASK_COLUMNS: &str = "id, external_id, parent_id, name, description, bookable, billable, \
     custom_fields, valid_from, valid_to";

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create(&self, new: &NewTask) -> Result<Task> {
        let custom_fields = serde_json::to_string(&new.content.custom_fields)?;
        self.conn.execute(
            "INSERT INTO tasks (external_id, parent_id, name, description, bookable, billable,
                                custom_fields, valid_from, valid_to)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                new.external_id,
                new.parent_id.map(|id| id.0),
                new.content.name,
                new.content.description,
                i32::from(new.content.bookable),
                i32::from(new.content.billable),
                custom_fields,
                new.content.valid_from,
                new.content.valid_to,
            ],
        )?;

        let id = TaskId(self.conn.last_insert_rowid());
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("task {id} after insert")))
    }

    fn get(&self, id: TaskId) -> Result<Option<Task>> {
        let result = self.conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"),
            params![id.0],
            Self::parse_task,
        );

        match result {
            Ok(task) => Ok(Some(task)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_all(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id"))?;
        let tasks = stmt
            .query_map([], Self::parse_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn update_content(
        &self,
        id: TaskId,
        parent_id: Option<TaskId>,
        content: &TaskContent,
    ) -> Result<()> {
        let custom_fields = serde_json::to_string(&content.custom_fields)?;
        let rows = self.conn.execute(
            "UPDATE tasks
             SET parent_id = ?, name = ?, description = ?, bookable = ?, billable = ?,
                 custom_fields = ?, valid_from = ?, valid_to = ?
             WHERE id = ?",
            params![
                parent_id.map(|id| id.0),
                content.name,
                content.description,
                i32::from(content.bookable),
                i32::from(content.billable),
                custom_fields,
                content.valid_from,
                content.valid_to,
                id.0,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("task {id}")));
        }
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
