//! Checkpoint trait and error types
//!
//! This module defines the interface for checkpoint backends and the
//! associated error types.

use crate::storage::CheckpointState;
use thiserror::Error;

/// Errors that can occur while writing or reading a checkpoint
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt checkpoint: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable backend for knowledge store snapshots
///
/// A save fully replaces the previous snapshot; a failed save leaves the
/// previous snapshot intact.
pub trait Checkpoint {
    /// Persists the complete crawl state
    fn save(&mut self, state: &CheckpointState) -> StorageResult<()>;

    /// Reads the last persisted state
    ///
    /// # Returns
    ///
    /// * `Ok(Some(state))` - A snapshot was found
    /// * `Ok(None)` - No snapshot has been written yet
    /// * `Err(StorageError)` - The snapshot could not be read
    fn load(&self) -> StorageResult<Option<CheckpointState>>;
}
