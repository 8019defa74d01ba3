//! # StrideKV Core
//!
//! Batched transactional engine for StrideKV.
//!
//! This crate provides:
//! - Strided batch views over caller-supplied argument arrays
//! - Arenas that receive results without per-call allocation
//! - Optimistic transactions with read tracking and snapshots
//! - Batch read, write, scan and size dispatch over a [`Database`]
//! - Collection names, administrative commands and configuration
//!
//! ## Example
//!
//! ```rust
//! use stridekv_core::{Database, Options, ReadRequest, ScanRequest, WriteRequest};
//!
//! let db = Database::open_in_memory().unwrap();
//! let keys = [5, 1, 9];
//! let values: [&[u8]; 3] = [b"five", b"one", b"nine"];
//! db.write(None, &WriteRequest::puts(&keys, &values), Options::NONE).unwrap();
//!
//! let mut txn = db.begin(0, Options::SNAPSHOT).unwrap();
//! let mut arena = db.new_arena();
//! let out = db
//!     .scan(Some(&mut txn), &ScanRequest::single(2, 10), Options::NONE, &mut arena)
//!     .unwrap();
//! assert_eq!(out.keys(0), &[5, 9]);
//!
//! let out = db
//!     .read(Some(&mut txn), &ReadRequest::from_keys(&keys), Options::TRACK_READS, &mut arena)
//!     .unwrap();
//! assert_eq!(out.value(2), Some(&b"nine"[..]));
//! txn.commit(Options::NONE).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod arena;
mod config;
mod control;
mod database;
mod dispatch;
mod error;
mod output;
mod registry;
mod request;
mod stats;
pub mod strided;
pub mod transaction;
mod types;

pub use arena::Arena;
pub use config::{BackendKind, Config, DEFAULT_ARENA_CAPACITY};
pub use control::Command;
pub use database::Database;
pub use error::{CoreError, CoreResult, ErrorKind};
pub use output::{ReadOutput, ScanOutput, SizeOutput};
pub use request::{ReadRequest, ScanRequest, SizeRequest, WriteRequest};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use strided::{Lengths, Scalar, Strided, ValueView};
pub use transaction::{Conflict, PendingWrite, Transaction, TransactionState};
pub use types::{CollectionId, Estimate, Key, Options, Version, DEFAULT_COLLECTION, LENGTH_MISSING};

pub use stridekv_storage::{Bounds, StoreKind};
