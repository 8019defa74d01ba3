//! Transaction state.

use crate::database::Shared;
use crate::error::{CoreError, CoreResult};
use crate::types::{CollectionId, Key, Options, Version};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};
use stridekv_storage::{Estimate, ReadStamp, StoreReader, WriteBatch};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Commit validation failed; nothing was applied.
    Aborted,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
        })
    }
}

/// A staged change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    /// Insert or replace the value.
    Put {
        /// New value; may be empty.
        value: Bytes,
    },
    /// Remove the key.
    Delete,
}

impl PendingWrite {
    /// The staged value, `None` for a delete.
    #[must_use]
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            Self::Put { value } => Some(value),
            Self::Delete => None,
        }
    }

    fn len(&self) -> Option<usize> {
        self.value().map(Bytes::len)
    }
}

/// The stale read that made a commit fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    /// Collection of the stale key.
    pub collection: CollectionId,
    /// The stale key.
    pub key: Key,
    /// Version the transaction observed.
    pub observed: Version,
    /// Version found at commit.
    pub current: Version,
}

impl From<Conflict> for CoreError {
    fn from(c: Conflict) -> Self {
        CoreError::Conflict {
            collection: c.collection,
            key: c.key,
            observed: c.observed,
            current: c.current,
        }
    }
}

/// A unit of optimistic, isolated work against one database.
///
/// Writes are staged locally and become visible to others only when
/// [`commit`](Self::commit) succeeds. Reads see the transaction's own
/// writes first, then the store at the pinned snapshot (when begun with
/// [`Options::SNAPSHOT`]) or at the head.
///
/// Staged writes, tracked reads and the conflict of a failed commit stay
/// inspectable until the transaction is reset.
pub struct Transaction {
    db: Weak<Shared>,
    generation: u64,
    snapshot: Option<Version>,
    state: TransactionState,
    writes: BTreeMap<(CollectionId, Key), PendingWrite>,
    reads: BTreeMap<(CollectionId, Key), Version>,
    conflict: Option<Conflict>,
    commit_version: Option<Version>,
}

impl Transaction {
    pub(crate) fn new(db: Weak<Shared>, generation: u64, snapshot: Option<Version>) -> Self {
        Self {
            db,
            generation,
            snapshot,
            state: TransactionState::Active,
            writes: BTreeMap::new(),
            reads: BTreeMap::new(),
            conflict: None,
            commit_version: None,
        }
    }

    /// Generation number assigned at begin or the last reset.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pinned snapshot version, if the transaction was begun with one.
    #[must_use]
    pub fn snapshot(&self) -> Option<Version> {
        self.snapshot
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Version assigned by the last successful commit.
    #[must_use]
    pub fn commit_version(&self) -> Option<Version> {
        self.commit_version
    }

    /// The stale read of the last failed commit.
    #[must_use]
    pub fn conflict(&self) -> Option<Conflict> {
        self.conflict
    }

    /// Staged writes in `(collection, key)` order. `None` values are
    /// deletes.
    pub fn writes(&self) -> impl Iterator<Item = (CollectionId, Key, Option<&[u8]>)> + '_ {
        self.writes
            .iter()
            .map(|(&(c, k), w)| (c, k, w.value().map(|v| v.as_ref())))
    }

    /// Number of staged writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Tracked reads with the version observed for each.
    pub fn reads(&self) -> impl Iterator<Item = (CollectionId, Key, Version)> + '_ {
        self.reads.iter().map(|(&(c, k), v)| (c, k, *v))
    }

    /// Gets a pending write.
    #[must_use]
    pub fn pending_write(&self, collection: CollectionId, key: Key) -> Option<&PendingWrite> {
        self.writes.get(&(collection, key))
    }

    /// Commits staged writes after validating tracked reads.
    ///
    /// On success the transaction is `Committed` and the new store version
    /// is returned. A stale tracked read leaves the store untouched, marks
    /// the transaction `Aborted` and returns `Conflict`; staged writes are
    /// kept so the work can be inspected or retried after a reset.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if the transaction is not active,
    /// `DatabaseClosed` if its database is gone, `Conflict` on validation
    /// failure, or a storage error (the transaction then stays active).
    pub fn commit(&mut self, options: Options) -> CoreResult<Version> {
        let db = self.database()?;
        let result = options
            .check()
            .and_then(|options| db.txns.commit(&db, self, options.contains(Options::FLUSH)));
        db.tally(result)
    }

    /// Returns the transaction to `Active` with empty read and write sets.
    ///
    /// `generation == 0` draws a fresh generation from the database. The
    /// previous snapshot is released, and a new one is pinned if `options`
    /// contains [`Options::SNAPSHOT`].
    ///
    /// # Errors
    ///
    /// Returns `DatabaseClosed` if the database is gone and
    /// `InvalidArgument` for unknown option bits.
    pub fn reset(&mut self, generation: u64, options: Options) -> CoreResult<()> {
        let db = self.database()?;
        let result = options.check().and_then(|options| db.txns.reset(&db, self, generation, options));
        db.tally(result)
    }

    pub(crate) fn database(&self) -> CoreResult<Arc<Shared>> {
        let db = self.db.upgrade().ok_or(CoreError::DatabaseClosed)?;
        db.check_open()?;
        Ok(db)
    }

    pub(crate) fn belongs_to(&self, db: &Arc<Shared>) -> CoreResult<()> {
        if std::ptr::eq(self.db.as_ptr(), Arc::as_ptr(db)) {
            return Ok(());
        }
        if self.db.strong_count() == 0 {
            return Err(CoreError::DatabaseClosed);
        }
        Err(CoreError::invalid_argument(
            "transaction belongs to another database",
        ))
    }

    pub(crate) fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::Aborted => {
                Err(CoreError::invalid_operation("transaction already aborted"))
            }
        }
    }

    /// Stages a put or, with `None`, a delete.
    pub(crate) fn stage(&mut self, collection: CollectionId, key: Key, value: Option<Bytes>) {
        let write = match value {
            Some(value) => PendingWrite::Put { value },
            None => PendingWrite::Delete,
        };
        self.writes.insert((collection, key), write);
    }

    /// Records an observation; the first one for a key wins and keys
    /// already written by this transaction are not tracked.
    pub(crate) fn record_read(&mut self, collection: CollectionId, key: Key, observed: Version) {
        let id = (collection, key);
        if !self.writes.contains_key(&id) {
            self.reads.entry(id).or_insert(observed);
        }
    }

    /// Reads one key through the write set.
    pub(crate) fn read(
        &mut self,
        reader: &StoreReader<'_>,
        collection: CollectionId,
        key: Key,
        track: bool,
    ) -> CoreResult<Option<Bytes>> {
        if let Some(write) = self.writes.get(&(collection, key)) {
            return Ok(write.value().cloned());
        }
        let found = reader.get(collection, key, self.snapshot)?;
        if track {
            self.record_read(collection, key, found.version);
        }
        Ok(found.value)
    }

    /// Scans up to `limit` keys `>= min_key`, merging staged writes into
    /// the store's view.
    pub(crate) fn scan(
        &mut self,
        reader: &StoreReader<'_>,
        collection: CollectionId,
        min_key: Key,
        limit: usize,
        track: bool,
    ) -> CoreResult<Vec<(Key, usize)>> {
        if limit == 0 {
            if !reader.contains(collection) {
                return Err(stridekv_storage::StorageError::UnknownCollection(collection).into());
            }
            return Ok(Vec::new());
        }
        let staged: Vec<(Key, Option<usize>)> = self
            .writes
            .range((collection, min_key)..=(collection, Key::MAX))
            .map(|(&(_, k), w)| (k, w.len()))
            .collect();
        let deletes = staged.iter().filter(|(_, len)| len.is_none()).count();

        // Each staged delete can hide one stored key.
        let fetch = limit.saturating_add(deletes);
        let mut merged = BTreeMap::new();
        let visited = reader.scan(collection, min_key, fetch, self.snapshot, &mut |k, len| {
            merged.insert(k, Some(len));
        })?;
        let horizon = match merged.keys().next_back() {
            Some(&last) if visited >= fetch => last,
            _ => Key::MAX,
        };
        for (key, len) in staged {
            if key <= horizon {
                merged.insert(key, len);
            }
        }

        let found: Vec<(Key, usize)> = merged
            .into_iter()
            .filter_map(|(k, len)| len.map(|len| (k, len)))
            .take(limit)
            .collect();
        if track {
            for &(key, _) in &found {
                if !self.writes.contains_key(&(collection, key)) {
                    let observed = reader.get(collection, key, self.snapshot)?.version;
                    self.record_read(collection, key, observed);
                }
            }
        }
        Ok(found)
    }

    /// Store estimate of `[min_key, max_key)` adjusted by staged writes.
    pub(crate) fn estimate(
        &self,
        reader: &StoreReader<'_>,
        collection: CollectionId,
        min_key: Key,
        max_key: Key,
    ) -> CoreResult<Estimate> {
        let mut estimate = reader.estimate(collection, min_key, max_key, self.snapshot)?;
        if min_key >= max_key {
            return Ok(estimate);
        }
        let key_size = std::mem::size_of::<Key>() as u64;
        for (&(_, key), write) in self.writes.range((collection, min_key)..(collection, max_key)) {
            let old = reader.get(collection, key, self.snapshot)?.len().map(|n| n as u64);
            let new = write.len().map(|n| n as u64);

            let e = &mut estimate;
            if let Some(old) = old {
                e.cardinality.lo = e.cardinality.lo.saturating_sub(1);
                e.value_bytes.lo = e.value_bytes.lo.saturating_sub(old);
                e.space_usage.lo = e.space_usage.lo.saturating_sub(key_size + old);
            }
            if let Some(new) = new {
                e.cardinality.lo += 1;
                e.cardinality.hi += 1;
                e.value_bytes.lo += new;
                e.value_bytes.hi += new;
                e.space_usage.lo += key_size + new;
                e.space_usage.hi += key_size + new;
            }
        }
        Ok(normalize(estimate))
    }

    /// Storage batch and read expectations for commit.
    pub(crate) fn commit_set(&self) -> (WriteBatch, Vec<ReadStamp>) {
        let mut batch = WriteBatch::with_capacity(self.writes.len());
        for (&(collection, key), write) in &self.writes {
            batch.push(collection, key, write.value().cloned());
        }
        let stamps = self
            .reads
            .iter()
            .map(|(&(collection, key), &version)| ReadStamp {
                collection,
                key,
                version,
            })
            .collect();
        (batch, stamps)
    }

    pub(crate) fn mark_committed(&mut self, version: Version) {
        self.state = TransactionState::Committed;
        self.commit_version = Some(version);
    }

    pub(crate) fn mark_aborted(&mut self, conflict: Conflict) {
        self.state = TransactionState::Aborted;
        self.conflict = Some(conflict);
    }

    /// Clears content and swaps in a new generation and snapshot,
    /// returning the previous snapshot.
    pub(crate) fn restart(&mut self, generation: u64, snapshot: Option<Version>) -> Option<Version> {
        self.generation = generation;
        self.state = TransactionState::Active;
        self.writes.clear();
        self.reads.clear();
        self.conflict = None;
        self.commit_version = None;
        std::mem::replace(&mut self.snapshot, snapshot)
    }
}

fn normalize(e: Estimate) -> Estimate {
    use stridekv_storage::Bounds;
    Estimate {
        cardinality: Bounds::new(e.cardinality.lo, e.cardinality.hi.max(e.cardinality.lo)),
        value_bytes: Bounds::new(e.value_bytes.lo, e.value_bytes.hi.max(e.value_bytes.lo)),
        space_usage: Bounds::new(e.space_usage.lo, e.space_usage.hi.max(e.space_usage.lo)),
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if let (Some(version), Some(db)) = (self.snapshot.take(), self.db.upgrade()) {
            db.store.unpin(version);
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("generation", &self.generation)
            .field("snapshot", &self.snapshot)
            .field("state", &self.state)
            .field("writes", &self.writes.len())
            .field("reads", &self.reads.len())
            .finish_non_exhaustive()
    }
}
