//! Transaction lifecycle.

use crate::error::{guard, FfiError, SkvError};
use crate::raw;
use crate::types::{SkvDatabase, SkvOptions, SkvTransaction};
use stridekv_core::Options;

/// Begins a transaction, or resets the one already in `*txn`.
///
/// `generation == 0` draws a fresh generation. With the snapshot option
/// every read of the transaction observes the version current at begin.
/// A transaction left in `*txn` by another database is replaced.
///
/// # Safety
///
/// - `db` must be a live database handle
/// - `txn` must be valid for reads and writes and hold null or a live
///   transaction
/// - `error` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn skv_txn_begin(
    db: *const SkvDatabase,
    generation: u64,
    options: SkvOptions,
    txn: *mut *mut SkvTransaction,
    error: *mut SkvError,
) {
    // SAFETY: see the contract above.
    unsafe {
        guard(error, || {
            let db = raw::database(db)?;
            if txn.is_null() {
                return Err(FfiError::NullPointer("txn"));
            }
            let options = Options::from_bits(options)?;
            match (*txn).as_mut() {
                Some(existing) if db.db.owns(&existing.txn) => {
                    existing.txn.reset(generation, options)?;
                }
                Some(existing) => existing.txn = db.db.begin(generation, options)?,
                None => {
                    let fresh = SkvTransaction {
                        txn: db.db.begin(generation, options)?,
                    };
                    *txn = Box::into_raw(Box::new(fresh));
                }
            }
            Ok(())
        });
    }
}

/// Commits a transaction.
///
/// On conflict the error names the stale key and the transaction keeps
/// its writes; begin it again to retry.
///
/// # Safety
///
/// - `txn` must be a live transaction handle
/// - `error` must be null or valid for writes
#[no_mangle]
pub unsafe extern "C" fn skv_txn_commit(
    txn: *mut SkvTransaction,
    options: SkvOptions,
    error: *mut SkvError,
) {
    // SAFETY: see the contract above.
    unsafe {
        guard(error, || {
            let txn = txn.as_mut().ok_or(FfiError::NullPointer("txn"))?;
            txn.txn.commit(Options::from_bits(options)?)?;
            Ok(())
        });
    }
}

/// Releases a transaction, discarding uncommitted writes. Null is a
/// no-op.
///
/// # Safety
///
/// `txn` must be null or a handle from [`skv_txn_begin`] that has not been
/// freed yet.
#[no_mangle]
pub unsafe extern "C" fn skv_txn_free(txn: *mut SkvTransaction) {
    if !txn.is_null() {
        // SAFETY: produced by `Box::into_raw` in `skv_txn_begin`.
        drop(unsafe { Box::from_raw(txn) });
    }
}
