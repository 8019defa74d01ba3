//! Locking and commit protocol shared by the store implementations.

use crate::error::{StorageError, StorageResult};
use crate::journal::Record;
use crate::snapshot::SnapshotPins;
use crate::tables::{PruneStats, Tables};
use crate::types::{
    CollectionId, CommitOutcome, Estimate, Key, ReadStamp, Version, Versioned, WriteBatch,
};
use parking_lot::{RwLock, RwLockReadGuard};
use std::borrow::Cow;

/// Hook through which durable stores persist a change before it becomes
/// visible. Returning an error cancels the change.
pub(crate) type LogHook<'h> = &'h mut dyn FnMut(&Record<'_>) -> StorageResult<()>;

/// A consistent read view holding the store's shared lock.
///
/// Batch reads take one `StoreReader` for the whole batch so the lock is
/// acquired once per call rather than once per key. Commits wait until the
/// reader is dropped.
pub struct StoreReader<'a> {
    tables: RwLockReadGuard<'a, Tables>,
}

impl StoreReader<'_> {
    /// Store version at the time the reader was created.
    #[must_use]
    pub fn version(&self) -> Version {
        self.tables.version()
    }

    /// Returns true if the collection exists.
    #[must_use]
    pub fn contains(&self, collection: CollectionId) -> bool {
        self.tables.contains(collection)
    }

    /// Reads a key at `at`, or at the head version when `at` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCollection` if the collection does not exist.
    pub fn get(&self, collection: CollectionId, key: Key, at: Option<Version>) -> StorageResult<Versioned> {
        self.tables.get(collection, key, at)
    }

    /// Current head version of a key. Keys without history report the
    /// newest tombstone pruned from their collection, or `Version::ZERO`.
    #[must_use]
    pub fn key_version(&self, collection: CollectionId, key: Key) -> Version {
        self.tables.key_version(collection, key)
    }

    /// Visits up to `limit` present keys `>= min_key` with their value
    /// lengths, in ascending key order. Returns the number visited.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCollection` if the collection does not exist.
    pub fn scan(
        &self,
        collection: CollectionId,
        min_key: Key,
        limit: usize,
        at: Option<Version>,
        visit: &mut dyn FnMut(Key, usize),
    ) -> StorageResult<usize> {
        self.tables.scan(collection, min_key, limit, at, visit)
    }

    /// Size bounds of the key range `[min_key, max_key)`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCollection` if the collection does not exist.
    pub fn estimate(
        &self,
        collection: CollectionId,
        min_key: Key,
        max_key: Key,
        at: Option<Version>,
    ) -> StorageResult<Estimate> {
        self.tables.estimate(collection, min_key, max_key, at)
    }

    /// Looks up a named collection.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<CollectionId> {
        self.tables.lookup(name)
    }

    /// Named collections sorted by name.
    #[must_use]
    pub fn collections(&self) -> Vec<(String, CollectionId)> {
        self.tables.names()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Engine {
    tables: RwLock<Tables>,
    pins: SnapshotPins,
}

impl Engine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_tables(tables: Tables) -> Self {
        Self {
            tables: RwLock::new(tables),
            pins: SnapshotPins::new(),
        }
    }

    pub(crate) fn reader(&self) -> StoreReader<'_> {
        StoreReader {
            tables: self.tables.read(),
        }
    }

    pub(crate) fn version(&self) -> Version {
        self.tables.read().version()
    }

    pub(crate) fn pins(&self) -> &SnapshotPins {
        &self.pins
    }

    pub(crate) fn commit(
        &self,
        batch: &WriteBatch,
        stamps: &[ReadStamp],
        log: LogHook<'_>,
    ) -> StorageResult<CommitOutcome> {
        let mut tables = self.tables.write();
        if let Some((stamp, current)) = tables.validate(stamps) {
            return Ok(CommitOutcome::Conflict { stamp, current });
        }
        if batch.is_empty() {
            return Ok(CommitOutcome::Applied(tables.version()));
        }
        tables.check_batch(batch)?;

        let version = tables.version().next();
        log(&Record::Commit {
            version,
            batch: Cow::Borrowed(batch),
        })?;
        tables.apply(version, batch);
        tracing::trace!(%version, mutations = batch.len(), "commit applied");
        Ok(CommitOutcome::Applied(version))
    }

    pub(crate) fn open_collection(&self, name: &str, log: LogHook<'_>) -> StorageResult<CollectionId> {
        Tables::validate_name(name)?;
        if let Some(id) = self.tables.read().lookup(name) {
            return Ok(id);
        }
        let mut tables = self.tables.write();
        // Another caller may have created it between the two locks.
        if let Some(id) = tables.lookup(name) {
            return Ok(id);
        }
        let id = tables.reserve_id();
        log(&Record::CreateCollection {
            id,
            name: Cow::Borrowed(name),
        })?;
        tables.insert_collection(id, name);
        tracing::debug!(%id, name, "collection created");
        Ok(id)
    }

    pub(crate) fn drop_collection(&self, id: CollectionId, log: LogHook<'_>) -> StorageResult<()> {
        let mut tables = self.tables.write();
        if id.is_default() {
            return Err(StorageError::ProtectedCollection);
        }
        if !tables.contains(id) {
            return Err(StorageError::UnknownCollection(id));
        }
        log(&Record::DropCollection { id })?;
        tables.remove_collection(id)
    }

    /// Tombstones every entry of the given collections under one version.
    ///
    /// Clearing through tombstones keeps pinned snapshots readable.
    pub(crate) fn clear(&self, ids: Option<&[CollectionId]>, log: LogHook<'_>) -> StorageResult<Version> {
        let mut tables = self.tables.write();
        let targets: Vec<CollectionId> = match ids {
            Some(ids) => ids.to_vec(),
            None => {
                let mut all: Vec<_> = tables.names().into_iter().map(|(_, id)| id).collect();
                all.push(CollectionId::DEFAULT);
                all
            }
        };
        let mut batch = WriteBatch::new();
        for id in targets {
            for m in &tables.clear_batch(id)? {
                batch.push(m.collection, m.key, None);
            }
        }
        if batch.is_empty() {
            return Ok(tables.version());
        }
        let version = tables.version().next();
        log(&Record::Commit {
            version,
            batch: Cow::Borrowed(&batch),
        })?;
        tables.apply(version, &batch);
        Ok(version)
    }

    /// Drops every named collection and clears the default one.
    pub(crate) fn reset(&self, log: LogHook<'_>) -> StorageResult<Version> {
        let mut tables = self.tables.write();
        for (_, id) in tables.names() {
            log(&Record::DropCollection { id })?;
            tables.remove_collection(id)?;
        }
        let batch = tables.clear_batch(CollectionId::DEFAULT)?;
        if batch.is_empty() {
            return Ok(tables.version());
        }
        let version = tables.version().next();
        log(&Record::Commit {
            version,
            batch: Cow::Borrowed(&batch),
        })?;
        tables.apply(version, &batch);
        Ok(version)
    }

    pub(crate) fn pin(&self) -> Version {
        // Holding the shared lock keeps compaction out while the pin lands.
        let tables = self.tables.read();
        let version = tables.version();
        self.pins.pin(version);
        version
    }

    /// Prunes history below the pin horizon, then lets `rewrite` persist
    /// the compacted state while commits are still excluded.
    pub(crate) fn compact(
        &self,
        rewrite: &mut dyn FnMut(&Tables) -> StorageResult<Option<u64>>,
    ) -> StorageResult<(PruneStats, Option<u64>)> {
        let mut tables = self.tables.write();
        let horizon = self.pins.horizon(tables.version());
        let stats = tables.prune(horizon);
        let disk = rewrite(&tables)?;
        tracing::debug!(
            %horizon,
            versions_removed = stats.versions_removed,
            keys_removed = stats.keys_removed,
            "compaction finished"
        );
        Ok((stats, disk))
    }

    pub(crate) fn with_tables<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&self.tables.read())
    }
}
