//! Error types for StrideKV core.

use crate::types::{CollectionId, Key, Version};
use std::fmt;
use stridekv_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in StrideKV core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A caller-supplied argument is malformed.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Named collection does not exist.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },

    /// Optimistic validation failed at commit.
    #[error("transaction conflict on key {key} in {collection}: read {observed}, now {current}")]
    Conflict {
        /// Collection of the stale key.
        collection: CollectionId,
        /// The stale key.
        key: Key,
        /// Version observed when the key was read.
        observed: Version,
        /// Version found at commit.
        current: Version,
    },

    /// An allocation could not be satisfied.
    #[error("resource exhausted: {message}")]
    ResourceExhausted {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// Database is closed.
    #[error("database is closed")]
    DatabaseClosed,
}

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed arguments; the call had no effect.
    InvalidArgument,
    /// Unknown collection or name.
    NotFound,
    /// Optimistic commit validation failed.
    Conflict,
    /// Allocation failure.
    ResourceExhausted,
    /// Backend I/O failure or a store that stopped serving requests.
    Unavailable,
    /// Persisted state is inconsistent.
    Corruption,
    /// The call is not valid in the current state.
    InvalidOperation,
    /// The database was closed or dropped.
    Closed,
}

impl ErrorKind {
    /// Short snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::ResourceExhausted => "resource_exhausted",
            Self::Unavailable => "unavailable",
            Self::Corruption => "corruption",
            Self::InvalidOperation => "invalid_operation",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a collection not found error.
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound { name: name.into() }
    }

    /// Creates a resource exhausted error.
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Storage(e) => match e {
                StorageError::Io(_) | StorageError::Locked | StorageError::Unavailable(_) => {
                    ErrorKind::Unavailable
                }
                StorageError::UnknownCollection(_) => ErrorKind::NotFound,
                StorageError::ProtectedCollection => ErrorKind::InvalidOperation,
                StorageError::Corrupted { .. } => ErrorKind::Corruption,
                StorageError::LimitExceeded(_) => ErrorKind::InvalidArgument,
            },
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::CollectionNotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            Self::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            Self::DatabaseClosed => ErrorKind::Closed,
        }
    }

    /// Returns true if redoing the work in a reset transaction may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}
