//! Property-based test generators using proptest.
//!
//! Keys are drawn from a narrow range so batches collide with each other
//! and with earlier writes.

use proptest::prelude::*;
use stridekv_core::Key;

/// One task of a write batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Store a value under a key.
    Put(Key, Vec<u8>),
    /// Remove a key.
    Delete(Key),
}

impl BatchOp {
    /// Key addressed by the task.
    pub fn key(&self) -> Key {
        match self {
            Self::Put(key, _) | Self::Delete(key) => *key,
        }
    }
}

/// Strategy for keys in a small, collision-prone range.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    -16i64..48
}

/// Strategy for keys anywhere in the signed 64-bit range.
pub fn wide_key_strategy() -> impl Strategy<Value = Key> {
    prop_oneof![
        4 => key_strategy(),
        1 => Just(Key::MIN),
        1 => Just(Key::MAX),
        2 => any::<Key>(),
    ]
}

/// Strategy for values, empty values included.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        1 => Just(Vec::new()),
        6 => prop::collection::vec(any::<u8>(), 1..64),
    ]
}

/// Strategy for valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for one batch task.
pub fn batch_op_strategy() -> impl Strategy<Value = BatchOp> {
    prop_oneof![
        3 => (key_strategy(), value_strategy()).prop_map(|(k, v)| BatchOp::Put(k, v)),
        1 => key_strategy().prop_map(BatchOp::Delete),
    ]
}

/// Strategy for a write batch of `min_ops..max_ops` tasks.
pub fn batch_strategy(min_ops: usize, max_ops: usize) -> impl Strategy<Value = Vec<BatchOp>> {
    prop::collection::vec(batch_op_strategy(), min_ops..max_ops)
}

/// Strategy for a sequence of write batches.
pub fn batch_sequence_strategy(max_batches: usize) -> impl Strategy<Value = Vec<Vec<BatchOp>>> {
    prop::collection::vec(batch_strategy(1, 16), 1..max_batches)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
