//! Persistence for inventory and the action log.
//!
//! Everything lives in one `SQLite` file. Each unit of work opens its own
//! connection and holds it for the duration of a single transaction:
//!
//! ```text
//! item_statuses    # fixed status catalogue
//! weapons          # inventory, status_id → item_statuses
//! special_devices  # inventory, status_id → item_statuses
//! operators        # who acts
//! actions          # what they can do
//! log_statuses     # status recorded on a log row
//! logs             # append-only action log
//! ```
//!
//! The engine talks to storage only through [`Store`] and [`UnitOfWork`],
//! so it can run against [`memory::MemoryStore`] in tests.

mod inventory;
mod logbook;
#[cfg(test)]
pub mod memory;
mod schema;
mod session;

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use rusqlite::{Connection, ErrorCode};

use crate::model::{ItemRef, ItemStatus, LogDetail, NewLogEntry};

pub use session::SqliteSession;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A foreign key, uniqueness, or NOT NULL rule rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            return Self::Constraint(e.to_string());
        }
        Self::Sqlite(e)
    }
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// A transactional store the action engine can write through.
pub trait Store {
    type Session<'a>: UnitOfWork
    where
        Self: 'a;

    /// Opens a unit of work. Dropping it without committing rolls it back.
    fn begin(&self) -> Result<Self::Session<'_>>;

    /// Reads an item's status outside any unit of work.
    ///
    /// `None` when the item does not exist.
    fn current_status(&self, item: ItemRef) -> Result<Option<ItemStatus>>;
}

/// One atomic unit of work against a [`Store`].
pub trait UnitOfWork {
    /// Inserts a log row and returns its id.
    fn insert_log(&mut self, entry: &NewLogEntry) -> Result<i64>;

    /// Sets the item's status to `next` only if it is currently one of
    /// `allowed`, as a single compare-and-swap write.
    ///
    /// Returns whether a row matched. A missing item does not match.
    fn conditional_update(
        &mut self,
        item: ItemRef,
        allowed: &[ItemStatus],
        next: ItemStatus,
    ) -> Result<bool>;

    /// Reads a log row with its labels, as this unit of work sees it.
    fn load_log(&mut self, id: i64) -> Result<Option<LogDetail>>;

    fn commit(self) -> Result<()>;

    fn rollback(self) -> Result<()>;
}

/// `SQLite`-backed storage rooted at a single database file.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Storage {
    /// Creates a storage handle for the database at `path`.
    ///
    /// The parent directory is created if it doesn't exist. The schema is
    /// not touched; call [`Storage::init`] for that.
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path, busy_timeout })
    }

    /// Creates the schema if missing and seeds the fixed catalogues.
    pub fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        schema::init(&conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a fresh connection with foreign keys enforced.
    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(conn)
    }
}

impl Store for Storage {
    type Session<'a> = SqliteSession;

    fn begin(&self) -> Result<SqliteSession> {
        SqliteSession::begin(self.connect()?)
    }

    fn current_status(&self, item: ItemRef) -> Result<Option<ItemStatus>> {
        inventory::current_status(&self.connect()?, item)
    }
}
