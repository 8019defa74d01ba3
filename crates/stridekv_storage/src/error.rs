//! Error types for storage operations.

use crate::types::CollectionId;
use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The collection id is not registered in the catalog.
    #[error("unknown collection: {0}")]
    UnknownCollection(CollectionId),

    /// The default collection cannot be dropped, only cleared.
    #[error("the default collection cannot be dropped")]
    ProtectedCollection,

    /// The persisted journal is inconsistent.
    #[error("journal corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Byte offset of the offending record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Another process holds the store's lock file.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The store refused the operation after an unrecoverable failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A record or name exceeds what the store can represent.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates a limit exceeded error.
    pub fn limit_exceeded(message: impl Into<String>) -> Self {
        Self::LimitExceeded(message.into())
    }
}
