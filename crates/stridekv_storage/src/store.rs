//! The store abstraction the engine runs against.

use crate::engine::StoreReader;
use crate::error::StorageResult;
use crate::types::{
    CollectionId, CommitOutcome, CompactStats, ReadStamp, StoreUsage, Version, Versioned,
    WriteBatch,
};
use std::fmt;

/// Which backend a store uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Volatile, process-local store.
    Memory,
    /// Store persisted through an append-only journal.
    Journal,
}

impl StoreKind {
    /// Short lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Journal => "journal",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A versioned, ordered key-value store with named collections.
///
/// Implementations must make every commit atomic and give commits a total
/// order: each non-empty commit receives a version one higher than the
/// previous one and readers never see a partially applied batch.
///
/// # Thread Safety
///
/// Stores are shared across threads behind an `Arc`; every method takes
/// `&self`.
pub trait Store: Send + Sync + fmt::Debug {
    /// Backend of this store.
    fn kind(&self) -> StoreKind;

    /// Takes a consistent read view for a batch of reads.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store can no longer serve requests.
    fn reader(&self) -> StorageResult<StoreReader<'_>>;

    /// Current store version.
    fn current_version(&self) -> Version;

    /// Validates `expectations` and applies `batch` atomically.
    ///
    /// A stale expectation yields [`CommitOutcome::Conflict`] and applies
    /// nothing. An empty batch with valid expectations does not advance the
    /// version. `flush` forces the change to durable media before returning
    /// on stores that have any.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCollection` if the batch targets a missing
    /// collection, or an error if persisting the batch fails.
    fn commit(
        &self,
        batch: &WriteBatch,
        expectations: &[ReadStamp],
        flush: bool,
    ) -> StorageResult<CommitOutcome>;

    /// Returns the id of the named collection, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `LimitExceeded` for invalid names.
    fn open_collection(&self, name: &str) -> StorageResult<CollectionId>;

    /// Removes a named collection and all of its entries.
    ///
    /// # Errors
    ///
    /// Returns `ProtectedCollection` for the default collection and
    /// `UnknownCollection` for ids not in the catalog.
    fn drop_collection(&self, id: CollectionId) -> StorageResult<()>;

    /// Deletes every entry of one collection, keeping the collection.
    ///
    /// Returns the store version after the clear.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCollection` for ids not in the catalog.
    fn clear_collection(&self, id: CollectionId) -> StorageResult<Version>;

    /// Deletes every entry of every collection, keeping the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the change fails.
    fn clear_all(&self) -> StorageResult<Version>;

    /// Drops every named collection and clears the default one.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the change fails.
    fn reset(&self) -> StorageResult<Version>;

    /// Pins the current version so compaction keeps its history.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store can no longer serve requests.
    fn pin(&self) -> StorageResult<Version>;

    /// Releases a pin taken with [`Self::pin`].
    fn unpin(&self, version: Version);

    /// Drops history no pinned reader can observe.
    ///
    /// # Errors
    ///
    /// Returns an error if rewriting durable state fails.
    fn compact(&self) -> StorageResult<CompactStats>;

    /// Forces committed changes to durable media.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn flush(&self) -> StorageResult<()>;

    /// Size information for the whole store.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store can no longer serve requests.
    fn usage(&self) -> StorageResult<StoreUsage>;

    /// Reads one key at `at`, or at the head when `at` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCollection` if the collection does not exist.
    fn get(&self, collection: CollectionId, key: i64, at: Option<Version>) -> StorageResult<Versioned> {
        self.reader()?.get(collection, key, at)
    }

    /// Looks up a named collection without creating it.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store can no longer serve requests.
    fn collection_id(&self, name: &str) -> StorageResult<Option<CollectionId>> {
        Ok(self.reader()?.lookup(name))
    }

    /// Named collections sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the store can no longer serve requests.
    fn collections(&self) -> StorageResult<Vec<(String, CollectionId)>> {
        Ok(self.reader()?.collections())
    }
}
