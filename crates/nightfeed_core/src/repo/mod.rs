//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define thin CRUD + range-query contracts over blocks and entries.
//! - Isolate SQLite query details from engine orchestration.
//!
//! # Invariants
//! - Repository writes enforce model `validate()` before persistence.
//! - Range queries are half-open `[start, end)` and ordered by feeding
//!   time with the row id as tiebreaker.
//! - Constraint violations surface as `RepoError::Conflict`, never as a
//!   silent overwrite.

use crate::db::DbError;
use crate::model::block::{BlockId, BlockValidationError};
use crate::model::entry::{EntryId, EntryValidationError};
use chrono::{DateTime, TimeZone, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod block_repo;
pub mod entry_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for block/entry persistence and queries.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    BlockNotFound(BlockId),
    EntryNotFound(EntryId),
    BlockValidation(BlockValidationError),
    EntryValidation(EntryValidationError),
    /// A uniqueness or foreign-key constraint rejected the write.
    Conflict(String),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::BlockNotFound(id) => write!(f, "feeding block not found: {id}"),
            Self::EntryNotFound(id) => write!(f, "feeding entry not found: {id}"),
            Self::BlockValidation(err) => write!(f, "{err}"),
            Self::EntryValidation(err) => write!(f, "{err}"),
            Self::Conflict(message) => write!(f, "constraint conflict: {message}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted schedule data: {message}")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "schedule repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "schedule repository requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::BlockValidation(err) => Some(err),
            Self::EntryValidation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<BlockValidationError> for RepoError {
    fn from(value: BlockValidationError) -> Self {
        Self::BlockValidation(value)
    }
}

impl From<EntryValidationError> for RepoError {
    fn from(value: EntryValidationError) -> Self {
        Self::EntryValidation(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, ref message) = value {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                let detail = message
                    .clone()
                    .unwrap_or_else(|| "constraint violation".to_string());
                return Self::Conflict(detail);
            }
        }
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn instant_to_ms(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub(crate) fn ms_to_instant(ms: i64, column: &'static str) -> RepoResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| RepoError::InvalidData(format!("invalid epoch ms `{ms}` in {column}")))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}
