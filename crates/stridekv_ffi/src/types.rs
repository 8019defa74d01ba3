//! Handle and scalar types shared with C.

use parking_lot::Mutex;
use std::ffi::CString;
use stridekv_core::{Arena, Database, Transaction};

/// Key type.
pub type SkvKey = i64;
/// Collection id type.
pub type SkvCollection = u64;
/// Value length type.
pub type SkvLength = u32;
/// Option bitmask type.
pub type SkvOptions = u32;

/// An open database.
///
/// Opaque to C; created by `skv_open`, released by `skv_free`.
pub struct SkvDatabase {
    pub(crate) db: Database,
    /// Text of the latest `skv_control` response.
    pub(crate) response: Mutex<Option<CString>>,
}

impl SkvDatabase {
    pub(crate) fn new(db: Database) -> Self {
        Self {
            db,
            response: Mutex::new(None),
        }
    }
}

/// Output memory of batch calls.
///
/// Opaque to C; created lazily by the first call that receives it,
/// released by `skv_arena_free`.
pub struct SkvArena {
    pub(crate) arena: Arena,
    /// NUL-delimited names exported by `skv_collection_list`.
    pub(crate) names: Vec<u8>,
}

impl SkvArena {
    pub(crate) fn new(arena: Arena) -> Self {
        Self {
            arena,
            names: Vec::new(),
        }
    }
}

/// A transaction.
///
/// Opaque to C; created by `skv_txn_begin`, released by `skv_txn_free`.
pub struct SkvTransaction {
    pub(crate) txn: Transaction,
}
