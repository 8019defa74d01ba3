//! Reference model of the batch semantics.
//!
//! A plain ordered map per collection. Property tests apply the same
//! operations to the model and to a [`Database`] and compare results.

use std::collections::BTreeMap;
use stridekv_core::{CollectionId, Database, Key};

use crate::generators::BatchOp;
use crate::ops;

/// Ordered in-memory oracle.
#[derive(Debug, Clone, Default)]
pub struct Model {
    entries: BTreeMap<(CollectionId, Key), Vec<u8>>,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a batch; later tasks on the same key win.
    pub fn apply(&mut self, collection: CollectionId, batch: &[BatchOp]) {
        for op in batch {
            match op {
                BatchOp::Put(key, value) => {
                    self.entries.insert((collection, *key), value.clone());
                }
                BatchOp::Delete(key) => {
                    self.entries.remove(&(collection, *key));
                }
            }
        }
    }

    /// Value of `key`.
    pub fn get(&self, collection: CollectionId, key: Key) -> Option<&[u8]> {
        self.entries.get(&(collection, key)).map(Vec::as_slice)
    }

    /// Up to `limit` keys `>= min_key` in ascending order.
    pub fn scan(&self, collection: CollectionId, min_key: Key, limit: usize) -> Vec<Key> {
        self.entries
            .range((collection, min_key)..=(collection, Key::MAX))
            .take(limit)
            .map(|((_, key), _)| *key)
            .collect()
    }

    /// Number of keys in `[min_key, max_key)`.
    pub fn count(&self, collection: CollectionId, min_key: Key, max_key: Key) -> u64 {
        if min_key >= max_key {
            return 0;
        }
        self.entries
            .range((collection, min_key)..(collection, max_key))
            .count() as u64
    }

    /// Number of entries across all collections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the model holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Writes `batch` to `db` as one head batch.
pub fn apply_to_db(db: &Database, collection: CollectionId, batch: &[BatchOp]) {
    let entries: Vec<(Key, Option<&[u8]>)> = batch
        .iter()
        .map(|op| match op {
            BatchOp::Put(key, value) => (*key, Some(value.as_slice())),
            BatchOp::Delete(key) => (*key, None),
        })
        .collect();
    ops::try_write(db, None, collection, &entries).expect("batch write failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use stridekv_core::DEFAULT_COLLECTION;

    #[test]
    fn later_tasks_win() {
        let mut model = Model::new();
        model.apply(
            DEFAULT_COLLECTION,
            &[
                BatchOp::Put(1, b"a".to_vec()),
                BatchOp::Delete(1),
                BatchOp::Put(2, b"b".to_vec()),
                BatchOp::Put(2, b"c".to_vec()),
            ],
        );
        assert_eq!(model.get(DEFAULT_COLLECTION, 1), None);
        assert_eq!(model.get(DEFAULT_COLLECTION, 2), Some(&b"c"[..]));
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn scan_and_count_stay_in_collection() {
        let mut model = Model::new();
        let other = CollectionId(9);
        model.apply(DEFAULT_COLLECTION, &[BatchOp::Put(5, Vec::new()), BatchOp::Put(7, Vec::new())]);
        model.apply(other, &[BatchOp::Put(6, Vec::new())]);
        assert_eq!(model.scan(DEFAULT_COLLECTION, 0, 10), vec![5, 7]);
        assert_eq!(model.scan(DEFAULT_COLLECTION, 6, 1), vec![7]);
        assert_eq!(model.count(DEFAULT_COLLECTION, 5, 7), 1);
        assert_eq!(model.count(DEFAULT_COLLECTION, 7, 5), 0);
        assert_eq!(model.count(other, Key::MIN, Key::MAX), 1);
    }
}
