//! Batch entry points.
//!
//! Every array argument is a base pointer and a byte stride. A null
//! collections array targets the default collection; a zero stride
//! broadcasts one element to every task. Keys must be distinct per task:
//! writes, reads and scans with more than one task reject a zero key
//! stride.
//!
//! Outputs are exported as pointers into the arena and stay valid until
//! the arena is used again or freed.

use crate::error::{guard, FfiResult, SkvError};
use crate::raw;
use crate::types::{SkvArena, SkvCollection, SkvDatabase, SkvKey, SkvLength, SkvOptions, SkvTransaction};
use std::ptr;
use stridekv_core::{
    CollectionId, Options, ReadRequest, ScanRequest, SizeRequest, Strided, ValueView, WriteRequest,
    DEFAULT_COLLECTION,
};

unsafe fn collections<'a>(
    base: *const SkvCollection,
    stride: usize,
    count: usize,
) -> FfiResult<Strided<'a, CollectionId>> {
    // SAFETY: forwarded caller contract.
    unsafe { raw::strided(base.cast(), stride, count, DEFAULT_COLLECTION) }
}

/// Writes or deletes `count` keys.
///
/// Task `i` stores `lengths[i]` bytes starting `offsets[i]` bytes into
/// `values[i]`. A null `values` array, a null value pointer or a length of
/// `SKV_LENGTH_MISSING` deletes the key. Without `lengths`, each value
/// runs up to its first NUL byte. With a transaction the writes are staged;
/// otherwise they are committed atomically as one version.
///
/// # Safety
///
/// - `db` must be a live database handle; `txn` null or a live transaction
/// - every non-null array must address `count` elements at its stride
/// - every value must be readable as described above
/// - `error` must be null or valid for writes
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn skv_write(
    db: *const SkvDatabase,
    txn: *mut SkvTransaction,
    count: usize,
    collections_base: *const SkvCollection,
    collections_stride: usize,
    keys: *const SkvKey,
    keys_stride: usize,
    values: *const *const u8,
    values_stride: usize,
    offsets: *const SkvLength,
    offsets_stride: usize,
    lengths: *const SkvLength,
    lengths_stride: usize,
    options: SkvOptions,
    error: *mut SkvError,
) {
    // SAFETY: see the contract above.
    unsafe {
        guard(error, || {
            let db = raw::database(db)?;
            let options = Options::from_bits(options)?;
            let contents = raw::values(
                count,
                values,
                values_stride,
                offsets,
                offsets_stride,
                lengths,
                lengths_stride,
            )?;
            let request = WriteRequest::new(count, raw::keys(keys, keys_stride, count)?)
                .in_collections(collections(collections_base, collections_stride, count)?)
                .with_values(ValueView::new(Strided::slice(&contents)));
            let txn = txn.as_mut().map(|t| &mut t.txn);
            db.db.write(txn, &request, options)?;
            Ok(())
        });
    }
}

/// Reads `count` keys.
///
/// Exports per-task `offsets` into the `values` tape and per-task
/// `lengths`, where `SKV_LENGTH_MISSING` marks an absent key. With the
/// read-lengths option only `lengths` is filled. Any output slot may be
/// null.
///
/// # Safety
///
/// - `db` must be a live database handle; `txn` null or a live transaction
/// - every non-null array must address `count` elements at its stride
/// - output slots must be null or valid for writes
/// - `arena` must point to null or a live arena
/// - `error` must be null or valid for writes
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn skv_read(
    db: *const SkvDatabase,
    txn: *mut SkvTransaction,
    count: usize,
    collections_base: *const SkvCollection,
    collections_stride: usize,
    keys: *const SkvKey,
    keys_stride: usize,
    options: SkvOptions,
    found_offsets: *mut *const SkvLength,
    found_lengths: *mut *const SkvLength,
    found_values: *mut *const u8,
    arena: *mut *mut SkvArena,
    error: *mut SkvError,
) {
    // SAFETY: see the contract above.
    unsafe {
        raw::export(found_offsets, ptr::null());
        raw::export(found_lengths, ptr::null());
        raw::export(found_values, ptr::null());
        guard(error, || {
            let db = raw::database(db)?;
            let arena = raw::arena(&db.db, arena)?;
            let options = Options::from_bits(options)?;
            let request = ReadRequest::new(count, raw::keys(keys, keys_stride, count)?)
                .in_collections(collections(collections_base, collections_stride, count)?);
            let txn = txn.as_mut().map(|t| &mut t.txn);
            let out = db.db.read(txn, &request, options, &mut arena.arena)?;
            raw::export(found_offsets, raw::head(out.offsets()));
            raw::export(found_lengths, raw::head(out.lengths()));
            raw::export(found_values, raw::head(out.tape()));
            Ok(())
        });
    }
}

/// Scans `count` key ranges in ascending order.
///
/// Task `i` yields up to `limits[i]` present keys `>= min_keys[i]`; a null
/// `min_keys` starts every task at the smallest key, while a zero
/// `min_keys` stride is rejected for more than one task. Results are exported as one
/// concatenated `keys` array with per-task `offsets` and `counts`, plus
/// parallel `lengths` when the read-lengths option is set.
///
/// # Safety
///
/// - `db` must be a live database handle; `txn` null or a live transaction
/// - every non-null array must address `count` elements at its stride
/// - output slots must be null or valid for writes
/// - `arena` must point to null or a live arena
/// - `error` must be null or valid for writes
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn skv_scan(
    db: *const SkvDatabase,
    txn: *mut SkvTransaction,
    count: usize,
    collections_base: *const SkvCollection,
    collections_stride: usize,
    min_keys: *const SkvKey,
    min_keys_stride: usize,
    limits: *const u32,
    limits_stride: usize,
    options: SkvOptions,
    found_offsets: *mut *const SkvLength,
    found_counts: *mut *const SkvLength,
    found_keys: *mut *const SkvKey,
    found_lengths: *mut *const SkvLength,
    arena: *mut *mut SkvArena,
    error: *mut SkvError,
) {
    // SAFETY: see the contract above.
    unsafe {
        raw::export(found_offsets, ptr::null());
        raw::export(found_counts, ptr::null());
        raw::export(found_keys, ptr::null());
        raw::export(found_lengths, ptr::null());
        guard(error, || {
            let db = raw::database(db)?;
            let arena = raw::arena(&db.db, arena)?;
            let options = Options::from_bits(options)?;
            let min_keys = if min_keys.is_null() {
                Strided::from_fn(count, |_| SkvKey::MIN)
            } else {
                raw::strided(min_keys.cast(), min_keys_stride, count, SkvKey::MIN)?
            };
            let limits = raw::required(limits.cast(), limits_stride, count, "limits")?;
            let request = ScanRequest::new(count, min_keys, limits)
                .in_collections(collections(collections_base, collections_stride, count)?);
            let txn = txn.as_mut().map(|t| &mut t.txn);
            let out = db.db.scan(txn, &request, options, &mut arena.arena)?;
            raw::export(found_offsets, raw::head(out.offsets()));
            raw::export(found_counts, raw::head(out.counts()));
            raw::export(found_keys, raw::head(out.all_keys()));
            raw::export(found_lengths, raw::head(out.all_lengths()));
            Ok(())
        });
    }
}

/// Estimates the size of `count` key ranges `[min_keys[i], max_keys[i])`.
///
/// Null bounds default to the whole key space. Exports six integers per
/// task: cardinality, value bytes and space usage, each as a `lo, hi`
/// pair.
///
/// # Safety
///
/// - `db` must be a live database handle; `txn` null or a live transaction
/// - every non-null array must address `count` elements at its stride
/// - `found_estimates` must be null or valid for writes
/// - `arena` must point to null or a live arena
/// - `error` must be null or valid for writes
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn skv_size(
    db: *const SkvDatabase,
    txn: *const SkvTransaction,
    count: usize,
    collections_base: *const SkvCollection,
    collections_stride: usize,
    min_keys: *const SkvKey,
    min_keys_stride: usize,
    max_keys: *const SkvKey,
    max_keys_stride: usize,
    options: SkvOptions,
    found_estimates: *mut *const u64,
    arena: *mut *mut SkvArena,
    error: *mut SkvError,
) {
    // SAFETY: see the contract above.
    unsafe {
        raw::export(found_estimates, ptr::null());
        guard(error, || {
            let db = raw::database(db)?;
            let arena = raw::arena(&db.db, arena)?;
            let options = Options::from_bits(options)?;
            let request = SizeRequest::new(
                count,
                raw::strided(min_keys.cast(), min_keys_stride, count, SkvKey::MIN)?,
                raw::strided(max_keys.cast(), max_keys_stride, count, SkvKey::MAX)?,
            )
            .in_collections(collections(collections_base, collections_stride, count)?);
            let txn = txn.as_ref().map(|t| &t.txn);
            let out = db.db.size(txn, &request, options, &mut arena.arena)?;
            raw::export(found_estimates, raw::head(out.as_slice()));
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::skv_arena_free;
    use crate::database::{skv_collection_open, skv_free};
    use crate::database::tests::open_memory;
    use crate::error::tests::take;
    use crate::transaction::{skv_txn_begin, skv_txn_commit, skv_txn_free};
    use std::mem::size_of;
    use std::slice;
    use stridekv_core::LENGTH_MISSING;

    const KEY: usize = size_of::<SkvKey>();
    const LEN: usize = size_of::<SkvLength>();
    const POINTER: usize = size_of::<*const u8>();

    struct Fixture {
        db: *mut SkvDatabase,
        arena: *mut SkvArena,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                db: open_memory(),
                arena: ptr::null_mut(),
            }
        }

        fn put(&self, txn: *mut SkvTransaction, keys: &[SkvKey], values: &[&[u8]]) -> Option<String> {
            let pointers: Vec<*const u8> = values.iter().map(|v| v.as_ptr()).collect();
            let lengths: Vec<u32> = values.iter().map(|v| v.len() as u32).collect();
            let mut error: SkvError = ptr::null();
            unsafe {
                skv_write(
                    self.db,
                    txn,
                    keys.len(),
                    ptr::null(),
                    0,
                    keys.as_ptr(),
                    KEY,
                    pointers.as_ptr(),
                    POINTER,
                    ptr::null(),
                    0,
                    lengths.as_ptr(),
                    LEN,
                    0,
                    &mut error,
                );
            }
            take(&mut error)
        }

        fn get(&mut self, txn: *mut SkvTransaction, keys: &[SkvKey], options: Options) -> Vec<Option<Vec<u8>>> {
            let mut offsets = ptr::null();
            let mut lengths = ptr::null();
            let mut tape = ptr::null();
            let mut error: SkvError = ptr::null();
            unsafe {
                skv_read(
                    self.db,
                    txn,
                    keys.len(),
                    ptr::null(),
                    0,
                    keys.as_ptr(),
                    KEY,
                    options.bits(),
                    &mut offsets,
                    &mut lengths,
                    &mut tape,
                    &mut self.arena,
                    &mut error,
                );
            }
            assert_eq!(take(&mut error), None);
            let lengths = unsafe { slice::from_raw_parts(lengths, keys.len()) };
            (0..keys.len())
                .map(|i| match lengths[i] {
                    LENGTH_MISSING => None,
                    len if tape.is_null() => Some(vec![0; len as usize]),
                    len => {
                        let offset = unsafe { *offsets.add(i) } as usize;
                        Some(unsafe { slice::from_raw_parts(tape.add(offset), len as usize) }.to_vec())
                    }
                })
                .collect()
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            unsafe {
                skv_arena_free(self.arena);
                skv_free(self.db);
            }
        }
    }

    #[test]
    fn write_then_read() {
        let mut fx = Fixture::new();
        assert_eq!(fx.put(ptr::null_mut(), &[1, 2, 3], &[b"one", b"", b"three"]), None);
        let found = fx.get(ptr::null_mut(), &[3, 2, 1, 4], Options::NONE);
        assert_eq!(
            found,
            vec![Some(b"three".to_vec()), Some(Vec::new()), Some(b"one".to_vec()), None]
        );
    }

    #[test]
    fn nul_terminated_values_and_deletes() {
        let mut fx = Fixture::new();
        let keys = [10i64, 11];
        let values = [c"alpha".as_ptr().cast::<u8>(), c"beta".as_ptr().cast::<u8>()];
        let mut error: SkvError = ptr::null();
        unsafe {
            skv_write(
                fx.db,
                ptr::null_mut(),
                2,
                ptr::null(),
                0,
                keys.as_ptr(),
                KEY,
                values.as_ptr(),
                POINTER,
                ptr::null(),
                0,
                ptr::null(),
                0,
                0,
                &mut error,
            );
        }
        assert_eq!(take(&mut error), None);
        assert_eq!(fx.get(ptr::null_mut(), &keys, Options::NONE)[1], Some(b"beta".to_vec()));

        unsafe {
            skv_write(
                fx.db,
                ptr::null_mut(),
                1,
                ptr::null(),
                0,
                keys.as_ptr(),
                KEY,
                ptr::null(),
                0,
                ptr::null(),
                0,
                ptr::null(),
                0,
                0,
                &mut error,
            );
        }
        assert_eq!(take(&mut error), None);
        assert_eq!(
            fx.get(ptr::null_mut(), &keys, Options::NONE),
            vec![None, Some(b"beta".to_vec())]
        );
    }

    #[test]
    fn broadcast_keys_are_rejected() {
        let mut fx = Fixture::new();
        let key = [7i64];
        let value = [b"v".as_ptr()];
        let len = [1u32];
        let mut error: SkvError = ptr::null();
        unsafe {
            skv_write(
                fx.db,
                ptr::null_mut(),
                3,
                ptr::null(),
                0,
                key.as_ptr(),
                0,
                value.as_ptr(),
                0,
                ptr::null(),
                0,
                len.as_ptr(),
                0,
                0,
                &mut error,
            );
        }
        assert!(take(&mut error).unwrap().contains("broadcast"));
        assert_eq!(fx.get(ptr::null_mut(), &[7], Options::NONE), vec![None]);
    }

    #[test]
    fn lengths_only_read() {
        let mut fx = Fixture::new();
        fx.put(ptr::null_mut(), &[1], &[b"four"]);
        let found = fx.get(ptr::null_mut(), &[1, 2], Options::READ_LENGTHS);
        assert_eq!(found, vec![Some(vec![0; 4]), None]);
    }

    #[test]
    fn strided_rows_in_named_collection() {
        #[repr(C)]
        struct Row {
            collection: u64,
            key: i64,
            value: *const u8,
            length: u32,
        }
        let mut fx = Fixture::new();
        let mut id = 0;
        let mut error: SkvError = ptr::null();
        unsafe { skv_collection_open(fx.db, c"rows".as_ptr(), ptr::null(), &mut id, &mut error) };
        assert_eq!(take(&mut error), None);

        let rows = [
            Row { collection: id, key: 1, value: b"x".as_ptr(), length: 1 },
            Row { collection: id, key: 2, value: b"yy".as_ptr(), length: 2 },
        ];
        let stride = size_of::<Row>();
        unsafe {
            skv_write(
                fx.db,
                ptr::null_mut(),
                rows.len(),
                ptr::addr_of!(rows[0].collection),
                stride,
                ptr::addr_of!(rows[0].key),
                stride,
                ptr::addr_of!(rows[0].value),
                stride,
                ptr::null(),
                0,
                ptr::addr_of!(rows[0].length),
                stride,
                0,
                &mut error,
            );
        }
        assert_eq!(take(&mut error), None);

        // Not in the default collection.
        assert_eq!(fx.get(ptr::null_mut(), &[1, 2], Options::NONE), vec![None, None]);

        let keys = [2i64];
        let mut lengths = ptr::null();
        unsafe {
            skv_read(
                fx.db,
                ptr::null_mut(),
                1,
                &id,
                0,
                keys.as_ptr(),
                KEY,
                0,
                ptr::null_mut(),
                &mut lengths,
                ptr::null_mut(),
                &mut fx.arena,
                &mut error,
            );
        }
        assert_eq!(take(&mut error), None);
        assert_eq!(unsafe { *lengths }, 2);
    }

    #[test]
    fn scan_exports_flat_arrays() {
        let mut fx = Fixture::new();
        fx.put(ptr::null_mut(), &[1, 5, 6, 9, 20], &[b"a", b"bb", b"c", b"d", b"e"]);

        let min_keys = [5i64, 0];
        let limits = [3u32, 1];
        let (mut offsets, mut counts, mut keys, mut lengths) =
            (ptr::null(), ptr::null(), ptr::null(), ptr::null());
        let mut error: SkvError = ptr::null();
        unsafe {
            skv_scan(
                fx.db,
                ptr::null_mut(),
                2,
                ptr::null(),
                0,
                min_keys.as_ptr(),
                KEY,
                limits.as_ptr(),
                LEN,
                Options::READ_LENGTHS.bits(),
                &mut offsets,
                &mut counts,
                &mut keys,
                &mut lengths,
                &mut fx.arena,
                &mut error,
            );
        }
        assert_eq!(take(&mut error), None);
        unsafe {
            assert_eq!(slice::from_raw_parts(counts, 2), &[3, 1]);
            assert_eq!(slice::from_raw_parts(offsets, 2), &[0, 3]);
            assert_eq!(slice::from_raw_parts(keys, 4), &[5, 6, 9, 1]);
            assert_eq!(slice::from_raw_parts(lengths, 4), &[2, 1, 1, 1]);
        }
    }

    #[test]
    fn scan_requires_limits() {
        let mut fx = Fixture::new();
        let mut error: SkvError = ptr::null();
        unsafe {
            skv_scan(
                fx.db,
                ptr::null_mut(),
                1,
                ptr::null(),
                0,
                ptr::null(),
                0,
                ptr::null(),
                0,
                0,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                &mut fx.arena,
                &mut error,
            );
        }
        assert_eq!(take(&mut error).unwrap(), "null pointer passed as limits");
    }

    fn scan_from(fx: &mut Fixture, count: usize, start: &SkvKey, stride: usize) -> Option<String> {
        let limits = [2u32];
        let mut error: SkvError = ptr::null();
        unsafe {
            skv_scan(
                fx.db,
                ptr::null_mut(),
                count,
                ptr::null(),
                0,
                start,
                stride,
                limits.as_ptr(),
                0,
                0,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                &mut fx.arena,
                &mut error,
            );
        }
        take(&mut error)
    }

    #[test]
    fn scan_rejects_broadcast_start_keys() {
        let mut fx = Fixture::new();
        fx.put(ptr::null_mut(), &[1, 2, 3], &[b"a", b"b", b"c"]);
        let start = 2i64;
        assert!(scan_from(&mut fx, 3, &start, 0).unwrap().contains("broadcast"));
        assert_eq!(scan_from(&mut fx, 1, &start, 0), None);
    }

    #[test]
    fn scan_without_start_keys_covers_every_task() {
        let mut fx = Fixture::new();
        fx.put(ptr::null_mut(), &[4, 8], &[b"a", b"b"]);
        let limits = [1u32];
        let (mut counts, mut keys) = (ptr::null(), ptr::null());
        let mut error: SkvError = ptr::null();
        unsafe {
            skv_scan(
                fx.db,
                ptr::null_mut(),
                3,
                ptr::null(),
                0,
                ptr::null(),
                0,
                limits.as_ptr(),
                0,
                0,
                ptr::null_mut(),
                &mut counts,
                &mut keys,
                ptr::null_mut(),
                &mut fx.arena,
                &mut error,
            );
        }
        assert_eq!(take(&mut error), None);
        unsafe {
            assert_eq!(slice::from_raw_parts(counts, 3), &[1, 1, 1]);
            assert_eq!(slice::from_raw_parts(keys, 3), &[4, 4, 4]);
        }
    }

    #[test]
    fn size_rejects_unknown_options() {
        let mut fx = Fixture::new();
        let mut estimates = ptr::null();
        let mut error: SkvError = ptr::null();
        unsafe {
            skv_size(
                fx.db,
                ptr::null(),
                1,
                ptr::null(),
                0,
                ptr::null(),
                0,
                ptr::null(),
                0,
                1 << 6,
                &mut estimates,
                &mut fx.arena,
                &mut error,
            );
        }
        assert!(take(&mut error).unwrap().contains("unknown option bits"));
        assert!(estimates.is_null());
    }

    #[test]
    fn size_bounds_whole_collection() {
        let mut fx = Fixture::new();
        fx.put(ptr::null_mut(), &[1, 2, 3], &[b"a", b"b", b"c"]);
        let mut estimates = ptr::null();
        let mut error: SkvError = ptr::null();
        unsafe {
            skv_size(
                fx.db,
                ptr::null(),
                1,
                ptr::null(),
                0,
                ptr::null(),
                0,
                ptr::null(),
                0,
                0,
                &mut estimates,
                &mut fx.arena,
                &mut error,
            );
        }
        assert_eq!(take(&mut error), None);
        let raw = unsafe { slice::from_raw_parts(estimates, 6) };
        assert!(raw[0] <= 3 && 3 <= raw[1]);
        assert!(raw[2] <= 3 && 3 <= raw[3]);
    }

    #[test]
    fn tracked_read_conflicts_with_foreign_commit() {
        let mut fx = Fixture::new();
        fx.put(ptr::null_mut(), &[1], &[b"old"]);

        let mut txn = ptr::null_mut();
        let mut error: SkvError = ptr::null();
        unsafe { skv_txn_begin(fx.db, 0, 0, &mut txn, &mut error) };
        assert_eq!(take(&mut error), None);

        fx.get(txn, &[1], Options::TRACK_READS);
        assert_eq!(fx.put(txn, &[2], &[b"mine"]), None);
        assert_eq!(fx.put(ptr::null_mut(), &[1], &[b"theirs"]), None);

        unsafe { skv_txn_commit(txn, 0, &mut error) };
        assert!(take(&mut error).is_some());
        assert_eq!(
            fx.get(ptr::null_mut(), &[1, 2], Options::NONE),
            vec![Some(b"theirs".to_vec()), None]
        );
        unsafe { skv_txn_free(txn) };
    }

    #[test]
    fn arena_reuse_does_not_leak_previous_values() {
        let mut fx = Fixture::new();
        fx.put(ptr::null_mut(), &[1, 2], &[b"long value", b"x"]);
        assert_eq!(fx.get(ptr::null_mut(), &[1], Options::NONE), vec![Some(b"long value".to_vec())]);
        let arena = fx.arena;
        assert_eq!(fx.get(ptr::null_mut(), &[2, 3], Options::NONE), vec![Some(b"x".to_vec()), None]);
        assert_eq!(fx.arena, arena);
    }
}
