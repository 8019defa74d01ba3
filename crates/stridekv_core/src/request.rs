//! Batch request descriptions.
//!
//! Every request describes `count` tasks. Each argument is a [`Strided`]
//! view, so a request can gather its fields from separate arrays, from
//! arrays of structs, or broadcast a single value (such as one collection)
//! to every task.

use crate::strided::{Strided, ValueView};
use crate::types::{CollectionId, Key, DEFAULT_COLLECTION};

/// Puts and deletes applied by [`Database::write`](crate::Database::write).
///
/// Tasks that target the same `(collection, key)` resolve in task order:
/// the last one wins.
#[derive(Debug)]
pub struct WriteRequest<'a> {
    /// Number of tasks.
    pub count: usize,
    /// Collection of each task. Defaults to the default collection.
    pub collections: Strided<'a, CollectionId>,
    /// Key of each task. Must not be broadcast when `count > 1`.
    pub keys: Strided<'a, Key>,
    /// Value of each task. Defaults to deleting every key.
    pub values: ValueView<'a>,
}

impl<'a> WriteRequest<'a> {
    /// Deletes `count` keys of the default collection.
    #[must_use]
    pub fn new(count: usize, keys: Strided<'a, Key>) -> Self {
        Self {
            count,
            collections: Strided::repeat(DEFAULT_COLLECTION),
            keys,
            values: ValueView::deletes(),
        }
    }

    /// Puts `values[i]` at `keys[i]`. A shorter `values` fails validation
    /// when the request is executed.
    #[must_use]
    pub fn puts(keys: &'a [Key], values: &'a [&'a [u8]]) -> Self {
        Self::new(keys.len(), Strided::slice(keys))
            .with_values(ValueView::new(Strided::from_fn(values.len(), move |i| Some(values[i]))))
    }

    /// Deletes every key of `keys`.
    #[must_use]
    pub fn deletes(keys: &'a [Key]) -> Self {
        Self::new(keys.len(), Strided::slice(keys))
    }

    /// Sets the collections.
    #[must_use]
    pub fn in_collections(mut self, collections: Strided<'a, CollectionId>) -> Self {
        self.collections = collections;
        self
    }

    /// Sets the values.
    #[must_use]
    pub fn with_values(mut self, values: ValueView<'a>) -> Self {
        self.values = values;
        self
    }
}

/// Point lookups served by [`Database::read`](crate::Database::read).
#[derive(Debug)]
pub struct ReadRequest<'a> {
    /// Number of tasks.
    pub count: usize,
    /// Collection of each task.
    pub collections: Strided<'a, CollectionId>,
    /// Key of each task. Must not be broadcast when `count > 1`.
    pub keys: Strided<'a, Key>,
}

impl<'a> ReadRequest<'a> {
    /// Reads `count` keys of the default collection.
    #[must_use]
    pub fn new(count: usize, keys: Strided<'a, Key>) -> Self {
        Self {
            count,
            collections: Strided::repeat(DEFAULT_COLLECTION),
            keys,
        }
    }

    /// Reads every key of `keys`.
    #[must_use]
    pub fn from_keys(keys: &'a [Key]) -> Self {
        Self::new(keys.len(), Strided::slice(keys))
    }

    /// Sets the collections.
    #[must_use]
    pub fn in_collections(mut self, collections: Strided<'a, CollectionId>) -> Self {
        self.collections = collections;
        self
    }
}

/// Ordered range scans served by [`Database::scan`](crate::Database::scan).
#[derive(Debug)]
pub struct ScanRequest<'a> {
    /// Number of tasks.
    pub count: usize,
    /// Collection of each task.
    pub collections: Strided<'a, CollectionId>,
    /// Smallest key each task may return.
    pub min_keys: Strided<'a, Key>,
    /// Maximum number of keys each task returns.
    pub limits: Strided<'a, u32>,
}

impl<'a> ScanRequest<'a> {
    /// Scans `count` ranges of the default collection.
    #[must_use]
    pub fn new(count: usize, min_keys: Strided<'a, Key>, limits: Strided<'a, u32>) -> Self {
        Self {
            count,
            collections: Strided::repeat(DEFAULT_COLLECTION),
            min_keys,
            limits,
        }
    }

    /// One scan of up to `limit` keys starting at `min_key`.
    #[must_use]
    pub fn single(min_key: Key, limit: u32) -> Self {
        Self::new(1, Strided::repeat(min_key), Strided::repeat(limit))
    }

    /// Sets the collections.
    #[must_use]
    pub fn in_collections(mut self, collections: Strided<'a, CollectionId>) -> Self {
        self.collections = collections;
        self
    }
}

/// Key-range size estimates served by [`Database::size`](crate::Database::size).
#[derive(Debug)]
pub struct SizeRequest<'a> {
    /// Number of tasks.
    pub count: usize,
    /// Collection of each task.
    pub collections: Strided<'a, CollectionId>,
    /// Inclusive lower bound of each range.
    pub min_keys: Strided<'a, Key>,
    /// Exclusive upper bound of each range.
    pub max_keys: Strided<'a, Key>,
}

impl<'a> SizeRequest<'a> {
    /// Estimates `count` ranges of the default collection.
    #[must_use]
    pub fn new(count: usize, min_keys: Strided<'a, Key>, max_keys: Strided<'a, Key>) -> Self {
        Self {
            count,
            collections: Strided::repeat(DEFAULT_COLLECTION),
            min_keys,
            max_keys,
        }
    }

    /// One estimate of `[min_key, max_key)`.
    #[must_use]
    pub fn single(min_key: Key, max_key: Key) -> Self {
        Self::new(1, Strided::repeat(min_key), Strided::repeat(max_key))
    }

    /// Sets the collections.
    #[must_use]
    pub fn in_collections(mut self, collections: Strided<'a, CollectionId>) -> Self {
        self.collections = collections;
        self
    }
}
