//! Persistent store backed by an append-only journal.

use crate::engine::{Engine, LogHook, StoreReader};
use crate::error::{StorageError, StorageResult};
use crate::journal::{Journal, Record};
use crate::store::{Store, StoreKind};
use crate::tables::Tables;
use crate::types::{
    CollectionId, CommitOutcome, CompactStats, ReadStamp, StoreUsage, Version, WriteBatch,
};
use parking_lot::Mutex;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Options for opening a [`JournaledStore`].
#[derive(Debug, Clone)]
pub struct JournalOptions {
    /// Sync the journal after every commit, not only when asked to flush.
    pub sync_on_commit: bool,
    /// Create the directory if it does not exist.
    pub create_if_missing: bool,
}

impl Default for JournalOptions {
    fn default() -> Self {
        Self {
            sync_on_commit: false,
            create_if_missing: true,
        }
    }
}

/// A store whose changes are appended to a journal before they become
/// visible, and replayed on open.
///
/// The whole dataset is also kept in memory. History is in-memory only:
/// a reopened store starts with one version per key. If an append ever
/// fails the store stops accepting work and every later call returns
/// `Unavailable`, since the journal may end in a partial record.
#[derive(Debug)]
pub struct JournaledStore {
    engine: Engine,
    journal: Mutex<Journal>,
    path: PathBuf,
    sync_on_commit: bool,
    poisoned: AtomicBool,
}

impl JournaledStore {
    /// Opens the store in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if the directory is in use, `Corrupted` if the
    /// journal fails validation, or `Io` on filesystem errors.
    pub fn open(dir: &Path, options: &JournalOptions) -> StorageResult<Self> {
        let (journal, records) = Journal::open(dir, options.create_if_missing)?;
        let replayed = records.len();
        let tables = replay(records)?;
        tracing::info!(
            path = %dir.display(),
            records = replayed,
            version = %tables.version(),
            "journaled store opened"
        );
        Ok(Self {
            engine: Engine::from_tables(tables),
            journal: Mutex::new(journal),
            path: dir.to_path_buf(),
            sync_on_commit: options.sync_on_commit,
            poisoned: AtomicBool::new(false),
        })
    }

    /// Directory of the store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once an unrecoverable write failure occurred.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    fn check(&self) -> StorageResult<()> {
        if self.is_poisoned() {
            return Err(StorageError::unavailable(
                "a journal write failed; reopen the store",
            ));
        }
        Ok(())
    }

    fn poison<T>(&self, result: StorageResult<T>) -> StorageResult<T> {
        if let Err(e) = &result {
            if !matches!(
                e,
                StorageError::UnknownCollection(_)
                    | StorageError::ProtectedCollection
                    | StorageError::LimitExceeded(_)
            ) {
                tracing::error!(error = %e, path = %self.path.display(), "journal write failed");
                self.poisoned.store(true, Ordering::Release);
            }
        }
        result
    }

    /// Runs an engine operation whose records are appended to the journal.
    fn logged<T>(
        &self,
        sync: bool,
        op: impl FnOnce(LogHook<'_>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        self.check()?;
        let result = op(&mut |record: &Record<'_>| {
            self.journal.lock().append(record, sync)?;
            Ok(())
        });
        self.poison(result)
    }
}

fn replay(records: Vec<Record<'static>>) -> StorageResult<Tables> {
    let mut tables = Tables::new();
    for (index, record) in records.into_iter().enumerate() {
        match record {
            Record::CreateCollection { id, name } => tables.insert_collection(id, &name),
            Record::DropCollection { id } => tables.remove_collection(id).map_err(|e| {
                StorageError::corrupted(index as u64, format!("replaying drop: {e}"))
            })?,
            Record::Commit { version, batch } => {
                if version <= tables.version() {
                    return Err(StorageError::corrupted(
                        index as u64,
                        format!("commit {version} does not follow {}", tables.version()),
                    ));
                }
                tables.check_batch(&batch).map_err(|e| {
                    StorageError::corrupted(index as u64, format!("replaying commit: {e}"))
                })?;
                tables.apply(version, &batch);
            }
            Record::Watermark {
                next_collection,
                version,
            } => tables.set_watermark(next_collection, version),
        }
    }
    Ok(tables)
}

impl Store for JournaledStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Journal
    }

    fn reader(&self) -> StorageResult<StoreReader<'_>> {
        self.check()?;
        Ok(self.engine.reader())
    }

    fn current_version(&self) -> Version {
        self.engine.version()
    }

    fn commit(
        &self,
        batch: &WriteBatch,
        expectations: &[ReadStamp],
        flush: bool,
    ) -> StorageResult<CommitOutcome> {
        let sync = flush || self.sync_on_commit;
        self.logged(sync, |log| self.engine.commit(batch, expectations, log))
    }

    fn open_collection(&self, name: &str) -> StorageResult<CollectionId> {
        self.logged(self.sync_on_commit, |log| self.engine.open_collection(name, log))
    }

    fn drop_collection(&self, id: CollectionId) -> StorageResult<()> {
        self.logged(self.sync_on_commit, |log| self.engine.drop_collection(id, log))
    }

    fn clear_collection(&self, id: CollectionId) -> StorageResult<Version> {
        self.logged(self.sync_on_commit, |log| {
            self.engine.clear(Some(std::slice::from_ref(&id)), log)
        })
    }

    fn clear_all(&self) -> StorageResult<Version> {
        self.logged(self.sync_on_commit, |log| self.engine.clear(None, log))
    }

    fn reset(&self) -> StorageResult<Version> {
        self.logged(self.sync_on_commit, |log| self.engine.reset(log))
    }

    fn pin(&self) -> StorageResult<Version> {
        self.check()?;
        Ok(self.engine.pin())
    }

    fn unpin(&self, version: Version) {
        self.engine.pins().unpin(version);
    }

    fn compact(&self) -> StorageResult<CompactStats> {
        self.check()?;
        let result = self.engine.compact(&mut |tables| {
            let mut records = Vec::new();
            for (name, id) in tables.names() {
                records.push(Record::CreateCollection {
                    id,
                    name: Cow::Owned(name),
                });
            }
            let live = tables.live_batch();
            if !live.is_empty() {
                records.push(Record::Commit {
                    version: tables.version(),
                    batch: Cow::Owned(live),
                });
            }
            records.push(Record::Watermark {
                next_collection: tables.next_collection(),
                version: tables.version(),
            });
            let size = self.journal.lock().rewrite(&records)?;
            Ok(Some(size))
        });
        let (stats, disk_bytes) = self.poison(result)?;
        Ok(CompactStats {
            versions_removed: stats.versions_removed,
            keys_removed: stats.keys_removed,
            disk_bytes,
        })
    }

    fn flush(&self) -> StorageResult<()> {
        self.check()?;
        let result = self.journal.lock().sync();
        self.poison(result)
    }

    fn usage(&self) -> StorageResult<StoreUsage> {
        self.check()?;
        let disk = self.journal.lock().size();
        Ok(self.engine.with_tables(|tables| StoreUsage {
            version: tables.version(),
            collections: tables.usage(),
            pinned_snapshots: self.engine.pins().count(),
            disk_bytes: Some(disk),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    const DEF: CollectionId = CollectionId::DEFAULT;

    fn open(dir: &Path) -> JournaledStore {
        JournaledStore::open(dir, &JournalOptions::default()).unwrap()
    }

    fn put(store: &JournaledStore, collection: CollectionId, key: i64, value: &[u8]) {
        let mut batch = WriteBatch::new();
        batch.put(collection, key, value.to_vec());
        assert!(store.commit(&batch, &[], false).unwrap().is_applied());
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let users;
        {
            let store = open(dir.path());
            users = store.open_collection("users").unwrap();
            put(&store, DEF, 1, b"one");
            put(&store, users, 7, b"ann");
            let mut batch = WriteBatch::new();
            batch.delete(DEF, 1);
            store.commit(&batch, &[], true).unwrap();
        }
        let store = open(dir.path());
        assert_eq!(store.current_version(), Version::new(3));
        assert_eq!(store.collection_id("users").unwrap(), Some(users));
        assert!(store.get(DEF, 1, None).unwrap().value.is_none());
        assert_eq!(
            store.get(users, 7, None).unwrap().value,
            Some(Bytes::from_static(b"ann"))
        );
    }

    #[test]
    fn dropped_collection_stays_dropped() {
        let dir = tempdir().unwrap();
        {
            let store = open(dir.path());
            let gone = store.open_collection("gone").unwrap();
            put(&store, gone, 1, b"x");
            store.drop_collection(gone).unwrap();
        }
        let store = open(dir.path());
        assert_eq!(store.collection_id("gone").unwrap(), None);
        // Ids are never reused, even across restarts.
        let next = store.open_collection("next").unwrap();
        assert_eq!(next, CollectionId::new(2));
    }

    #[test]
    fn compaction_shrinks_journal_and_keeps_counters() {
        let dir = tempdir().unwrap();
        let before;
        {
            let store = open(dir.path());
            let scratch = store.open_collection("scratch").unwrap();
            store.drop_collection(scratch).unwrap();
            for i in 0..20 {
                put(&store, DEF, 1, format!("value-{i}").as_bytes());
            }
            before = store.usage().unwrap().disk_bytes.unwrap();
            let stats = store.compact().unwrap();
            assert_eq!(stats.versions_removed, 19);
            assert!(stats.disk_bytes.unwrap() < before);
        }
        let store = open(dir.path());
        assert_eq!(store.current_version(), Version::new(20));
        assert_eq!(
            store.get(DEF, 1, None).unwrap().value,
            Some(Bytes::from_static(b"value-19"))
        );
        assert_eq!(store.open_collection("fresh").unwrap(), CollectionId::new(2));
    }

    #[test]
    fn reset_is_durable() {
        let dir = tempdir().unwrap();
        {
            let store = open(dir.path());
            let a = store.open_collection("a").unwrap();
            put(&store, a, 1, b"x");
            put(&store, DEF, 1, b"y");
            store.reset().unwrap();
        }
        let store = open(dir.path());
        assert!(store.collections().unwrap().is_empty());
        assert!(store.get(DEF, 1, None).unwrap().value.is_none());
    }

    #[test]
    fn open_without_create_fails_on_missing_dir() {
        let dir = tempdir().unwrap();
        let options = JournalOptions {
            create_if_missing: false,
            ..JournalOptions::default()
        };
        let err = JournaledStore::open(&dir.path().join("nope"), &options).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[test]
    fn invalid_requests_do_not_poison() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());
        let mut batch = WriteBatch::new();
        batch.put(CollectionId::new(99), 1, b"x".to_vec());
        assert!(matches!(
            store.commit(&batch, &[], false),
            Err(StorageError::UnknownCollection(_))
        ));
        assert!(store.drop_collection(DEF).is_err());
        assert!(!store.is_poisoned());
        put(&store, DEF, 1, b"ok");
    }
}
