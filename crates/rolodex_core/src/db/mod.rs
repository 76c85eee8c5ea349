//! SQLite bootstrap for the contact store.
//!
//! # Responsibility
//! - Open and configure SQLite connections holding contacts, interactions
//!   and tasks.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No entity row is read or written before migrations succeed.
//!
//! # See also
//! - `crate::repo::store` for the only SQL that touches entity tables.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure to open or migrate the contact store.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was migrated by a newer rolodex build.
    NewerSchema { found: u32, supported: u32 },
    /// A migration script failed; the enclosing transaction was rolled back.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "contact store error: {err}"),
            Self::NewerSchema { found, supported } => write!(
                f,
                "contact store schema v{found} is newer than this build understands (v{supported})"
            ),
            Self::Migration {
                version,
                name,
                source,
            } => write!(f, "contact store migration v{version} ({name}) failed: {source}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::NewerSchema { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
