//! # StrideKV FFI
//!
//! Stable C ABI for StrideKV.
//!
//! This crate provides:
//! - `skv_*` function exports over [`stridekv_core`]
//! - Opaque database, transaction and arena handles
//! - Strided raw-pointer batch arguments
//! - Owned error strings released with [`skv_error_free`]
//!
//! ## Ownership
//!
//! Handles are created by the library and released with `skv_free`,
//! `skv_txn_free` and `skv_arena_free`; each accepts null. Arenas are
//! allocated on first use: pass a pointer to a null `SkvArena*` and keep
//! the filled-in value for later calls. Batch outputs point into the arena
//! and are invalidated by its next use.

#![warn(missing_docs)]

mod arena;
mod batch;
mod database;
mod error;
mod raw;
mod transaction;
mod types;

pub use arena::skv_arena_free;
pub use batch::{skv_read, skv_scan, skv_size, skv_write};
pub use database::{skv_collection_list, skv_collection_open, skv_collection_remove, skv_control, skv_free, skv_open};
pub use error::{skv_error_free, SkvError};
pub use transaction::{skv_txn_begin, skv_txn_commit, skv_txn_free};
pub use types::{SkvArena, SkvCollection, SkvDatabase, SkvKey, SkvLength, SkvOptions, SkvTransaction};

use stridekv_core::{Options, DEFAULT_COLLECTION, LENGTH_MISSING};

/// The unnamed collection every database starts with.
pub const SKV_COLLECTION_DEFAULT: SkvCollection = DEFAULT_COLLECTION.0;

/// Length of an absent value.
pub const SKV_LENGTH_MISSING: SkvLength = LENGTH_MISSING;

/// No options.
pub const SKV_OPTION_NONE: SkvOptions = Options::NONE.bits();
/// Export lengths only.
pub const SKV_OPTION_READ_LENGTHS: SkvOptions = Options::READ_LENGTHS.bits();
/// Flush writes and commits to durable media.
pub const SKV_OPTION_FLUSH: SkvOptions = Options::FLUSH.bits();
/// Track transactional reads for commit validation.
pub const SKV_OPTION_TRACK_READS: SkvOptions = Options::TRACK_READS.bits();
/// Pin a snapshot when a transaction begins.
pub const SKV_OPTION_SNAPSHOT: SkvOptions = Options::SNAPSHOT.bits();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_engine() {
        assert_eq!(SKV_COLLECTION_DEFAULT, 0);
        assert_eq!(SKV_LENGTH_MISSING, u32::MAX);
        assert_eq!(SKV_OPTION_READ_LENGTHS, 2);
        assert_eq!(SKV_OPTION_FLUSH, 4);
        assert_eq!(SKV_OPTION_TRACK_READS, 8);
        assert_eq!(SKV_OPTION_SNAPSHOT, 16);
        let all = SKV_OPTION_READ_LENGTHS | SKV_OPTION_FLUSH | SKV_OPTION_TRACK_READS | SKV_OPTION_SNAPSHOT;
        assert!(Options::from_bits(all).is_ok());
    }
}
