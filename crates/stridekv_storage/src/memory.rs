//! Volatile store.

use crate::engine::{Engine, StoreReader};
use crate::error::StorageResult;
use crate::store::{Store, StoreKind};
use crate::types::{
    CollectionId, CommitOutcome, CompactStats, ReadStamp, StoreUsage, Version, WriteBatch,
};

/// A store that keeps everything in process memory.
///
/// Contents are lost when the store is dropped. `flush` is a no-op.
///
/// # Example
///
/// ```
/// use stridekv_storage::{CollectionId, MemoryStore, Store, WriteBatch};
///
/// let store = MemoryStore::new();
/// let mut batch = WriteBatch::new();
/// batch.put(CollectionId::DEFAULT, 1, b"hello".to_vec());
/// store.commit(&batch, &[], false).unwrap();
/// let got = store.get(CollectionId::DEFAULT, 1, None).unwrap();
/// assert_eq!(got.value.as_deref(), Some(&b"hello"[..]));
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    engine: Engine,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: Engine::new(),
        }
    }
}

impl Store for MemoryStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }

    fn reader(&self) -> StorageResult<StoreReader<'_>> {
        Ok(self.engine.reader())
    }

    fn current_version(&self) -> Version {
        self.engine.version()
    }

    fn commit(
        &self,
        batch: &WriteBatch,
        expectations: &[ReadStamp],
        _flush: bool,
    ) -> StorageResult<CommitOutcome> {
        self.engine.commit(batch, expectations, &mut |_| Ok(()))
    }

    fn open_collection(&self, name: &str) -> StorageResult<CollectionId> {
        self.engine.open_collection(name, &mut |_| Ok(()))
    }

    fn drop_collection(&self, id: CollectionId) -> StorageResult<()> {
        self.engine.drop_collection(id, &mut |_| Ok(()))
    }

    fn clear_collection(&self, id: CollectionId) -> StorageResult<Version> {
        self.engine.clear(Some(std::slice::from_ref(&id)), &mut |_| Ok(()))
    }

    fn clear_all(&self) -> StorageResult<Version> {
        self.engine.clear(None, &mut |_| Ok(()))
    }

    fn reset(&self) -> StorageResult<Version> {
        self.engine.reset(&mut |_| Ok(()))
    }

    fn pin(&self) -> StorageResult<Version> {
        Ok(self.engine.pin())
    }

    fn unpin(&self, version: Version) {
        self.engine.pins().unpin(version);
    }

    fn compact(&self) -> StorageResult<CompactStats> {
        let (stats, _) = self.engine.compact(&mut |_| Ok(None))?;
        Ok(CompactStats {
            versions_removed: stats.versions_removed,
            keys_removed: stats.keys_removed,
            disk_bytes: None,
        })
    }

    fn flush(&self) -> StorageResult<()> {
        Ok(())
    }

    fn usage(&self) -> StorageResult<StoreUsage> {
        Ok(self.engine.with_tables(|tables| StoreUsage {
            version: tables.version(),
            collections: tables.usage(),
            pinned_snapshots: self.engine.pins().count(),
            disk_bytes: None,
        }))
    }
}
