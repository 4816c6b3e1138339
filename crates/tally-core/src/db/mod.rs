//! Mirror store for tally

mod connection;
mod cursor_repository;
mod group_repository;
mod migrations;
mod task_repository;
mod time_record_repository;

pub use connection::Database;
pub use cursor_repository::{CursorRepository, SqliteCursorRepository, TIME_RECORD_CURSOR};
pub use group_repository::{GroupRepository, NewGroup, SqliteGroupRepository};
pub use task_repository::{NewTask, SqliteTaskRepository, TaskRepository};
pub use time_record_repository::{SqliteTimeRecordRepository, TimeRecordRepository};
