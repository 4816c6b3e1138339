//! Database connection management

use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

use super::migrations;

/// Wrapper around the mirror's `SQLite` connection.
///
/// The mirror is a plain local file opened by exactly one writer process
/// per pass; there is no cross-process locking scheme on top of SQLite's
/// own.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the mirror at the given path, creating it if it doesn't exist.
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let database = Self { conn };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Open an in-memory mirror (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let database = Self { conn };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for this workload
    fn configure(&self) -> Result<()> {
        // WAL is unavailable for in-memory databases; ignore that failure
        self.conn
            .pragma_update(None, "journal_mode", "WAL")
            .ok();
        self.conn.pragma_update(None, "synchronous", "NORMAL").ok();
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
