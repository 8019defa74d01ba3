//! Core type definitions shared by every store.

use bytes::Bytes;
use std::fmt;

/// A key inside a collection.
pub type Key = i64;

/// Identifier of a collection.
///
/// Ids are assigned by the catalog when a named collection is created and
/// are never reused for the lifetime of a store. Id `0` is the default,
/// unnamed collection, which always exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CollectionId(pub u64);

impl CollectionId {
    /// The always-present default collection.
    pub const DEFAULT: Self = Self(0);

    /// Creates a new collection ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true for the default collection.
    #[must_use]
    pub const fn is_default(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col:{}", self.0)
    }
}

/// Global version stamp.
///
/// Every successful non-empty commit advances the store version by one and
/// stamps every entry it writes with the new value. Version `0` means
/// "never written".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version(pub u64);

impl Version {
    /// The version of keys that were never written.
    pub const ZERO: Self = Self(0);

    /// Creates a new version.
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    /// Returns the raw version value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next version.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The value of a key as observed at some version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    /// Version of the entry that was observed. Keys without history report
    /// the newest tombstone pruned from their collection, or `Version::ZERO`.
    pub version: Version,
    /// The value, `None` when the key is absent or deleted.
    pub value: Option<Bytes>,
}

impl Versioned {
    /// An observation of a key that was never written.
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            version: Version::ZERO,
            value: None,
        }
    }

    /// Returns true if a value is present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    /// Returns the value length, `None` when absent.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        self.value.as_ref().map(Bytes::len)
    }
}

/// A version a transaction observed for a key, checked again at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadStamp {
    /// Collection of the key.
    pub collection: CollectionId,
    /// The key.
    pub key: Key,
    /// Version observed when the key was read.
    pub version: Version,
}

/// One staged change: a put (`Some`) or a tombstone (`None`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// Target collection.
    pub collection: CollectionId,
    /// Target key.
    pub key: Key,
    /// New value, or `None` to delete.
    pub value: Option<Bytes>,
}

/// An ordered list of mutations applied atomically under one version.
///
/// When the same (collection, key) appears more than once the last
/// mutation wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty batch with room for `capacity` mutations.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            mutations: Vec::with_capacity(capacity),
        }
    }

    /// Stages a put.
    pub fn put(&mut self, collection: CollectionId, key: Key, value: impl Into<Bytes>) {
        self.push(collection, key, Some(value.into()));
    }

    /// Stages a delete.
    pub fn delete(&mut self, collection: CollectionId, key: Key) {
        self.push(collection, key, None);
    }

    /// Stages a put or delete.
    pub fn push(&mut self, collection: CollectionId, key: Key, value: Option<Bytes>) {
        self.mutations.push(Mutation {
            collection,
            key,
            value,
        });
    }

    /// Number of staged mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Iterates over the staged mutations in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.mutations.iter()
    }

    /// Removes every staged mutation, keeping the allocation.
    pub fn clear(&mut self) {
        self.mutations.clear();
    }

    /// Total bytes of staged values.
    #[must_use]
    pub fn value_bytes(&self) -> usize {
        self.mutations
            .iter()
            .filter_map(|m| m.value.as_ref().map(Bytes::len))
            .sum()
    }
}

impl<'a> IntoIterator for &'a WriteBatch {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Mutation> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = Mutation>>(iter: I) -> Self {
        Self {
            mutations: iter.into_iter().collect(),
        }
    }
}

/// Result of a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The batch was applied; carries the store version after the commit.
    Applied(Version),
    /// A read stamp was stale; nothing was applied.
    Conflict {
        /// The first stale stamp.
        stamp: ReadStamp,
        /// The key's version at validation time.
        current: Version,
    },
}

impl CommitOutcome {
    /// Returns true if the batch was applied.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// A lower and upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    /// Lower bound.
    pub lo: u64,
    /// Upper bound.
    pub hi: u64,
}

impl Bounds {
    /// Creates bounds, swapping the arguments if needed.
    #[must_use]
    pub fn new(lo: u64, hi: u64) -> Self {
        if lo <= hi {
            Self { lo, hi }
        } else {
            Self { lo: hi, hi: lo }
        }
    }

    /// Bounds that are known exactly.
    #[must_use]
    pub const fn exact(value: u64) -> Self {
        Self {
            lo: value,
            hi: value,
        }
    }

    /// Returns true if `value` lies within the bounds.
    #[must_use]
    pub const fn contains(&self, value: u64) -> bool {
        self.lo <= value && value <= self.hi
    }
}

/// Approximate size of a key range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Estimate {
    /// Number of present entries.
    pub cardinality: Bounds,
    /// Bytes held in values.
    pub value_bytes: Bounds,
    /// Memory used by the range, including history and bookkeeping.
    pub space_usage: Bounds,
}

impl Estimate {
    /// Number of integers in the flat representation.
    pub const FIELDS: usize = 6;

    /// Flattens into `[count_lo, count_hi, bytes_lo, bytes_hi, mem_lo, mem_hi]`.
    #[must_use]
    pub const fn to_array(&self) -> [u64; Self::FIELDS] {
        [
            self.cardinality.lo,
            self.cardinality.hi,
            self.value_bytes.lo,
            self.value_bytes.hi,
            self.space_usage.lo,
            self.space_usage.hi,
        ]
    }
}

/// Size information for one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionUsage {
    /// Collection id.
    pub id: CollectionId,
    /// Collection name, `None` for the default collection.
    pub name: Option<String>,
    /// Present entries at the head version.
    pub entries: u64,
    /// Bytes of present values at the head version.
    pub value_bytes: u64,
    /// Retained versions, including history and tombstones.
    pub versions: u64,
}

/// Size information for a whole store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUsage {
    /// Current store version.
    pub version: Version,
    /// Per-collection usage, default collection first.
    pub collections: Vec<CollectionUsage>,
    /// Number of live snapshot pins.
    pub pinned_snapshots: usize,
    /// Bytes held on disk, `None` for volatile stores.
    pub disk_bytes: Option<u64>,
}

/// What a compaction pass removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactStats {
    /// Historic versions dropped.
    pub versions_removed: u64,
    /// Keys removed because only a tombstone remained.
    pub keys_removed: u64,
    /// Journal size after compaction, `None` for volatile stores.
    pub disk_bytes: Option<u64>,
}
