//! SQLite-backed persistence for the audit engine.
//!
//! The database lives at `~/.studioops/studioops.db`. The project store
//! tables are written by the importer and read here; the engine owns the
//! evidence, link, suggestion, rule, and feedback tables. SQLite's row-level
//! atomicity plus `with_transaction` around each per-item write is the whole
//! concurrency story: one audit/resolve pass per project, no shared mutable
//! state beyond the file.

use std::path::PathBuf;

use rusqlite::Connection;

pub mod types;
pub use types::*;

pub mod evidence;
pub mod feedback;
pub mod links;
pub mod projects;
pub mod rules;
pub mod suggestions;

pub struct AuditDb {
    conn: Connection,
}

impl AuditDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, crate::error::EngineError>
    where
        F: FnOnce(&Self) -> Result<T, crate::error::EngineError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(DbError::Sqlite)?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT").map_err(DbError::Sqlite)?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `~/.studioops/studioops.db` and
    /// apply pending migrations.
    pub fn open() -> Result<Self, DbError> {
        Self::open_at(Self::db_path()?)
    }

    /// Open a database at an explicit path. Useful for testing and for the
    /// sweep binary's path argument.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL for concurrent readers (dashboard/reporting reads while the
        // engine writes).
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.studioops/studioops.db`.
    fn db_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".studioops").join("studioops.db"))
    }

    /// Current UTC timestamp in the RFC 3339 form every table uses.
    pub(crate) fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================


// =============================================================================
// Tests
// =============================================================================
