//! # StrideKV Storage
//!
//! Versioned storage for StrideKV.
//!
//! Every collection is an ordered map from `i64` keys to version chains.
//! A single global [`Version`] counter orders all commits; readers can
//! observe the store at any version that has not been compacted away.
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - Volatile, for tests and caches
//! - [`JournaledStore`] - Persistent, replays an append-only journal on open
//!
//! ## Example
//!
//! ```rust
//! use stridekv_storage::{CollectionId, MemoryStore, Store, WriteBatch};
//!
//! let store = MemoryStore::new();
//! let mut batch = WriteBatch::new();
//! batch.put(CollectionId::DEFAULT, 42, b"answer".to_vec());
//! store.commit(&batch, &[], false).unwrap();
//!
//! let reader = store.reader().unwrap();
//! let got = reader.get(CollectionId::DEFAULT, 42, None).unwrap();
//! assert_eq!(got.len(), Some(6));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chain;
mod engine;
mod error;
pub mod journal;
mod journaled;
mod memory;
mod snapshot;
mod store;
mod tables;
mod types;

pub use engine::StoreReader;
pub use error::{StorageError, StorageResult};
pub use journaled::{JournalOptions, JournaledStore};
pub use memory::MemoryStore;
pub use snapshot::SnapshotPins;
pub use store::{Store, StoreKind};
pub use tables::MAX_COLLECTION_NAME;
pub use types::{
    Bounds, CollectionId, CollectionUsage, CommitOutcome, CompactStats, Estimate, Key, Mutation,
    ReadStamp, StoreUsage, Version, Versioned, WriteBatch,
};
