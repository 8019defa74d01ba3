//! Versioned, ordered collections shared by every store implementation.
//!
//! `Tables` holds no locks; stores wrap it in a `RwLock` and take the write
//! lock for the whole validate-then-apply sequence of a commit, so commits
//! are atomic and totally ordered by version.

use crate::chain::{VersionChain, ENTRY_OVERHEAD};
use crate::error::{StorageError, StorageResult};
use crate::types::{
    Bounds, CollectionId, CollectionUsage, Estimate, Key, ReadStamp, Version, Versioned,
    WriteBatch,
};
use std::collections::{BTreeMap, HashMap};
use std::mem::size_of;

/// Longest accepted collection name in bytes.
pub const MAX_COLLECTION_NAME: usize = 255;

#[derive(Debug, Default)]
pub(crate) struct Table {
    name: Option<String>,
    rows: BTreeMap<Key, VersionChain>,
    /// Newest tombstone dropped by pruning; absent keys report it as their
    /// version so reads tracked before a prune still validate.
    pruned: Version,
}

/// All collections of a store plus the global version counter.
#[derive(Debug)]
pub(crate) struct Tables {
    tables: HashMap<CollectionId, Table>,
    names: BTreeMap<String, CollectionId>,
    next_collection: u64,
    version: Version,
}

/// Outcome of a prune pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PruneStats {
    pub versions_removed: u64,
    pub keys_removed: u64,
}

impl Default for Tables {
    fn default() -> Self {
        Self::new()
    }
}

impl Tables {
    pub(crate) fn new() -> Self {
        let mut tables = HashMap::new();
        tables.insert(CollectionId::DEFAULT, Table::default());
        Self {
            tables,
            names: BTreeMap::new(),
            next_collection: 1,
            version: Version::ZERO,
        }
    }

    pub(crate) fn version(&self) -> Version {
        self.version
    }

    pub(crate) fn next_collection(&self) -> u64 {
        self.next_collection
    }

    fn table(&self, id: CollectionId) -> StorageResult<&Table> {
        self.tables
            .get(&id)
            .ok_or(StorageError::UnknownCollection(id))
    }

    fn resolve(&self, at: Option<Version>) -> Version {
        at.unwrap_or(self.version)
    }

    pub(crate) fn contains(&self, id: CollectionId) -> bool {
        self.tables.contains_key(&id)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub(crate) fn get(
        &self,
        collection: CollectionId,
        key: Key,
        at: Option<Version>,
    ) -> StorageResult<Versioned> {
        let at = self.resolve(at);
        let table = self.table(collection)?;
        Ok(table.rows.get(&key).map_or_else(
            || Versioned {
                version: table.pruned,
                value: None,
            },
            |chain| chain.observe(at),
        ))
    }

    /// Visits up to `limit` present keys `>= min_key` in ascending order.
    pub(crate) fn scan(
        &self,
        collection: CollectionId,
        min_key: Key,
        limit: usize,
        at: Option<Version>,
        visit: &mut dyn FnMut(Key, usize),
    ) -> StorageResult<usize> {
        let at = self.resolve(at);
        let table = self.table(collection)?;
        let mut found = 0;
        if limit == 0 {
            return Ok(0);
        }
        for (key, chain) in table.rows.range(min_key..) {
            if let Some((_, Some(value))) = chain.visible(at) {
                visit(*key, value.len());
                found += 1;
                if found == limit {
                    break;
                }
            }
        }
        Ok(found)
    }

    /// Size bounds of `[min_key, max_key)`.
    ///
    /// The lower bounds count what is visible at `at`; the upper bounds also
    /// count keys with any retained value, so they stay sound for readers at
    /// other versions that the history can still serve.
    pub(crate) fn estimate(
        &self,
        collection: CollectionId,
        min_key: Key,
        max_key: Key,
        at: Option<Version>,
    ) -> StorageResult<Estimate> {
        let at = self.resolve(at);
        let table = self.table(collection)?;
        if min_key >= max_key {
            return Ok(Estimate::default());
        }

        let key_size = size_of::<Key>() as u64;
        let (mut count_lo, mut count_hi) = (0u64, 0u64);
        let (mut bytes_lo, mut bytes_hi) = (0u64, 0u64);
        let (mut mem_lo, mut mem_hi) = (0u64, 0u64);

        for (_, chain) in table.rows.range(min_key..max_key) {
            if let Some((_, Some(value))) = chain.visible(at) {
                count_lo += 1;
                bytes_lo += value.len() as u64;
                mem_lo += key_size + value.len() as u64;
            }
            if chain.has_value() {
                count_hi += 1;
                bytes_hi += chain.retained_bytes();
            }
            mem_hi += key_size + chain.retained_bytes() + ENTRY_OVERHEAD * chain.len() as u64;
        }

        Ok(Estimate {
            cardinality: Bounds::new(count_lo, count_hi.max(count_lo)),
            value_bytes: Bounds::new(bytes_lo, bytes_hi.max(bytes_lo)),
            space_usage: Bounds::new(mem_lo, mem_hi.max(mem_lo)),
        })
    }

    /// Head version of a key. Keys without a chain report the newest pruned
    /// tombstone of their collection; missing collections report zero.
    pub(crate) fn key_version(&self, collection: CollectionId, key: Key) -> Version {
        self.tables.get(&collection).map_or(Version::ZERO, |t| {
            t.rows
                .get(&key)
                .map_or(t.pruned, VersionChain::head_version)
        })
    }

    /// Returns the first stale stamp together with the key's current version.
    pub(crate) fn validate(&self, stamps: &[ReadStamp]) -> Option<(ReadStamp, Version)> {
        stamps.iter().find_map(|stamp| {
            let current = self.key_version(stamp.collection, stamp.key);
            (current != stamp.version).then_some((*stamp, current))
        })
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Fails if the batch targets a collection that does not exist.
    pub(crate) fn check_batch(&self, batch: &WriteBatch) -> StorageResult<()> {
        for m in batch {
            if !self.tables.contains_key(&m.collection) {
                return Err(StorageError::UnknownCollection(m.collection));
            }
        }
        Ok(())
    }

    /// Applies a checked batch under `version` and advances the counter.
    pub(crate) fn apply(&mut self, version: Version, batch: &WriteBatch) {
        for m in batch {
            let Some(table) = self.tables.get_mut(&m.collection) else {
                continue;
            };
            match table.rows.get_mut(&m.key) {
                Some(chain) => chain.push(version, m.value.clone()),
                // Deleting a key that was never written leaves no trace.
                None if m.value.is_none() => {}
                None => {
                    table
                        .rows
                        .insert(m.key, VersionChain::new(version, m.value.clone()));
                }
            }
        }
        self.version = self.version.max(version);
    }

    /// Tombstones for every key of `collection` that currently holds a value.
    pub(crate) fn clear_batch(&self, collection: CollectionId) -> StorageResult<WriteBatch> {
        let table = self.table(collection)?;
        let mut batch = WriteBatch::new();
        for (key, chain) in &table.rows {
            if chain.head().1.is_some() {
                batch.delete(collection, *key);
            }
        }
        Ok(batch)
    }

    /// Every present head value, used to rewrite a journal.
    pub(crate) fn live_batch(&self) -> WriteBatch {
        let mut ids: Vec<_> = self.tables.keys().copied().collect();
        ids.sort_unstable();
        let mut batch = WriteBatch::new();
        for id in ids {
            let table = &self.tables[&id];
            for (key, chain) in &table.rows {
                if let (_, Some(value)) = chain.head() {
                    batch.push(id, *key, Some(value.clone()));
                }
            }
        }
        batch
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub(crate) fn lookup(&self, name: &str) -> Option<CollectionId> {
        self.names.get(name).copied()
    }

    /// Names and ids of the named collections, sorted by name.
    pub(crate) fn names(&self) -> Vec<(String, CollectionId)> {
        self.names
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect()
    }

    pub(crate) fn validate_name(name: &str) -> StorageResult<()> {
        if name.is_empty() || name.len() > MAX_COLLECTION_NAME || name.contains('\0') {
            return Err(StorageError::limit_exceeded(format!(
                "collection names must be 1..={MAX_COLLECTION_NAME} bytes without NUL"
            )));
        }
        Ok(())
    }

    /// Id the next created collection would receive.
    pub(crate) fn reserve_id(&self) -> CollectionId {
        CollectionId::new(self.next_collection)
    }

    /// Registers a collection under a known id (creation or replay).
    pub(crate) fn insert_collection(&mut self, id: CollectionId, name: &str) {
        self.next_collection = self.next_collection.max(id.as_u64() + 1);
        self.names.insert(name.to_owned(), id);
        self.tables.insert(
            id,
            Table {
                name: Some(name.to_owned()),
                ..Table::default()
            },
        );
    }

    pub(crate) fn remove_collection(&mut self, id: CollectionId) -> StorageResult<()> {
        if id.is_default() {
            return Err(StorageError::ProtectedCollection);
        }
        let table = self
            .tables
            .remove(&id)
            .ok_or(StorageError::UnknownCollection(id))?;
        if let Some(name) = table.name {
            self.names.remove(&name);
        }
        Ok(())
    }

    pub(crate) fn set_watermark(&mut self, next_collection: u64, version: Version) {
        self.next_collection = self.next_collection.max(next_collection);
        self.version = self.version.max(version);
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    pub(crate) fn prune(&mut self, horizon: Version) -> PruneStats {
        let mut stats = PruneStats::default();
        for table in self.tables.values_mut() {
            let mut pruned = table.pruned;
            table.rows.retain(|_, chain| {
                stats.versions_removed += chain.prune(horizon) as u64;
                if chain.is_dead(horizon) {
                    pruned = pruned.max(chain.head_version());
                    stats.versions_removed += 1;
                    stats.keys_removed += 1;
                    false
                } else {
                    true
                }
            });
            table.pruned = pruned;
        }
        stats
    }

    pub(crate) fn usage(&self) -> Vec<CollectionUsage> {
        let mut out: Vec<CollectionUsage> = self
            .tables
            .iter()
            .map(|(id, table)| {
                let mut usage = CollectionUsage {
                    id: *id,
                    name: table.name.clone(),
                    entries: 0,
                    value_bytes: 0,
                    versions: 0,
                };
                for chain in table.rows.values() {
                    usage.versions += chain.len() as u64;
                    if let (_, Some(value)) = chain.head() {
                        usage.entries += 1;
                        usage.value_bytes += value.len() as u64;
                    }
                }
                usage
            })
            .collect();
        out.sort_by_key(|u| u.id);
        out
    }
}
