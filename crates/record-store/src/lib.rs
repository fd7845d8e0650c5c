//! record-store - SQLite persistence for keeper records
//!
//! One type serves two deployments. The server opens it in
//! [`StoreMode::Canonical`] and owns the ids it hands out; the client opens it
//! in [`StoreMode::Cache`] as a single-user mirror that reuses those ids.
//!
//! Every record query joins on the owner's name, so a caller can never reach
//! a row that belongs to someone else, even with a guessed id. A single mutex
//! serializes all access to the connection, reads included.

mod records;
mod users;

use rusqlite::{ffi, Connection, ErrorCode, Row};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use keeper_core::RecordType;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid value: {0}")]
    Invalid(String),

    #[error("Mirroring server ids is only allowed on a cache store")]
    CacheOnly,

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// How a store instance is deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Server side: many users, assigns record ids
    Canonical,
    /// Client side: one user, mirrors ids assigned by the server
    Cache,
}

/// Minimum length of a user name, matching the schema CHECK
pub const MIN_USER_NAME_LEN: usize = 3;

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        user TEXT NOT NULL UNIQUE CHECK (length(user) >= 3),
        full_name TEXT,
        password_hash TEXT
    );

    CREATE TABLE IF NOT EXISTS records (
        id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL CHECK (length(name) >= 1),
        type TEXT NOT NULL,
        opaque TEXT,
        meta TEXT,
        UNIQUE(user_id, name, type),
        FOREIGN KEY (user_id)
            REFERENCES users (id)
            ON DELETE CASCADE
            ON UPDATE NO ACTION
    );

    CREATE INDEX IF NOT EXISTS idx_records_user_type ON records(user_id, type);
"#;

/// SQLite-backed record store
pub struct RecordStore {
    conn: Mutex<Connection>,
    mode: StoreMode,
    path: Option<PathBuf>,
}

impl RecordStore {
    /// Open or create the store at `path`
    pub fn open(path: &Path, mode: StoreMode) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn, mode, Some(path.to_path_buf()))?;
        tracing::debug!(path = %path.display(), ?mode, "record store opened");
        Ok(store)
    }

    /// Open a throwaway store that lives only in memory
    pub fn open_in_memory(mode: StoreMode) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, mode, None)
    }

    fn with_connection(conn: Connection, mode: StoreMode, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            mode,
            path,
        })
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    /// Backing file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the underlying connection, reporting any pending error
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| StoreError::LockPoisoned)?;
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

/// Hex-encoded SHA-256 of a password, the form kept in the users table
///
/// Unsalted; equal passwords produce equal hashes.
pub fn password_hash(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Translate constraint failures into store errors
///
/// `subject` names the thing being written, for the error message.
fn map_write_error(err: rusqlite::Error, subject: &str) -> StoreError {
    let extended = match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    };

    match extended {
        Some(ffi::SQLITE_CONSTRAINT_UNIQUE) | Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
            StoreError::AlreadyExists(subject.to_string())
        }
        // the owner sub-select yields NULL when the user does not exist
        Some(ffi::SQLITE_CONSTRAINT_NOTNULL) | Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
            StoreError::NotFound(format!("owner of {}", subject))
        }
        Some(ffi::SQLITE_CONSTRAINT_CHECK) => StoreError::Invalid(subject.to_string()),
        _ => StoreError::Sqlite(err),
    }
}

fn record_type_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<RecordType> {
    let tag: String = row.get(idx)?;
    tag.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
