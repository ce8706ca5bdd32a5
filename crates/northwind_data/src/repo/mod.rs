//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the generic data access contract over any mapped entity.
//! - Isolate SQLite query details from calling code.
//!
//! # Invariants
//! - Argument errors (`InvalidArgument`) are raised before any session opens.
//! - Store failures are returned unchanged inside `RepoError::Db`.

pub mod repository;

pub use repository::{Repository, SqliteRepository};

use crate::db::{is_constraint_violation, DbError};
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Caller supplied an include selector that is not a mapped navigation member.
    InvalidArgument(String),
    /// Entity type has no mapping in the context model.
    UnmappedEntity(&'static str),
    /// Update or delete matched no row for the key.
    NotFound { table: &'static str, key: String },
    Db(DbError),
}

impl RepoError {
    /// Returns whether this error is a store-level constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Db(err) if is_constraint_violation(err))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::UnmappedEntity(entity) => write!(f, "entity `{entity}` is not mapped"),
            Self::NotFound { table, key } => write!(f, "no `{table}` row with key {key}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidArgument(_) | Self::UnmappedEntity(_) | Self::NotFound { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => format!("'{text}'"),
        Value::Blob(bytes) => format!("<blob {} bytes>", bytes.len()),
    }
}
