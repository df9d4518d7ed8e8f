//! Persistence layer for cadence
//!
//! Provides:
//! - Key/value storage of JSON documents (SQLite or in-memory)
//! - The client array and the scheduler's notified set under fixed keys
//! - Audit log (append-only)
//! - `ClientStore`, the single owner and writer of client records

mod audit;
mod clients;
mod memory;
mod sqlite;
mod traits;

pub use audit::*;
pub use clients::*;
pub use memory::*;
pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Write conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// True when the error came from writing to the backend rather than from
    /// the request itself. The in-memory state has already changed.
    pub fn is_persistence(&self) -> bool {
        matches!(self, StoreError::Database(_) | StoreError::Io(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
