//! Decoding of raw pointer arguments.
//!
//! Every array argument is a base pointer plus a byte stride. A null base
//! broadcasts a default; a zero stride broadcasts the first element.

use crate::error::{FfiError, FfiResult};
use crate::types::{SkvArena, SkvDatabase, SkvLength};
use std::ffi::{c_char, CStr};
use std::{ptr, slice};
use stridekv_core::{Database, Key, Scalar, Strided, LENGTH_MISSING};

/// Bytes covered by `count` elements of `T` at `stride`.
fn span<T: Scalar>(stride: usize, count: usize) -> FfiResult<usize> {
    let span = match count {
        0 => Some(0),
        _ if stride == 0 => Some(T::SIZE),
        n => (n - 1)
            .checked_mul(stride)
            .and_then(|x| x.checked_add(T::SIZE)),
    };
    span.ok_or_else(|| stridekv_core::CoreError::invalid_argument("strided span overflows").into())
}

/// Views `count` elements of `T` starting at `base`, or broadcasts
/// `default` if `base` is null.
///
/// # Safety
///
/// A non-null `base` must address `count` elements spaced `stride` bytes
/// apart, readable for the lifetime `'a`.
pub(crate) unsafe fn strided<'a, T: Scalar>(
    base: *const u8,
    stride: usize,
    count: usize,
    default: T,
) -> FfiResult<Strided<'a, T>> {
    if base.is_null() {
        return Ok(Strided::repeat(default));
    }
    let len = span::<T>(stride, count)?;
    // SAFETY: the caller guarantees `len` readable bytes at `base`.
    let bytes = unsafe { slice::from_raw_parts(base, len) };
    Ok(Strided::from_bytes(bytes, stride, count)?)
}

/// Like [`strided`], but a null base is an error when there are tasks.
///
/// # Safety
///
/// As for [`strided`].
pub(crate) unsafe fn required<'a, T: Scalar + Default>(
    base: *const u8,
    stride: usize,
    count: usize,
    what: &'static str,
) -> FfiResult<Strided<'a, T>> {
    if base.is_null() && count > 0 {
        return Err(FfiError::NullPointer(what));
    }
    // SAFETY: forwarded caller contract.
    unsafe { strided(base, stride, count, T::default()) }
}

/// Keys of a batch.
///
/// # Safety
///
/// As for [`strided`].
pub(crate) unsafe fn keys<'a>(base: *const Key, stride: usize, count: usize) -> FfiResult<Strided<'a, Key>> {
    // SAFETY: forwarded caller contract.
    unsafe { required(base.cast(), stride, count, "keys") }
}

/// Resolves the value of every write task.
///
/// A null `values` array deletes every key, as does a null element or a
/// [`LENGTH_MISSING`] length. Without `lengths`, each value runs up to its
/// first NUL byte.
///
/// # Safety
///
/// Non-null arrays must address `count` elements at their strides. Each
/// non-null value pointer, shifted by its offset, must be readable for its
/// length, or up to a NUL byte when `lengths` is null.
#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn values<'a>(
    count: usize,
    values: *const *const u8,
    values_stride: usize,
    offsets: *const SkvLength,
    offsets_stride: usize,
    lengths: *const SkvLength,
    lengths_stride: usize,
) -> FfiResult<Vec<Option<&'a [u8]>>> {
    if values.is_null() {
        return Ok(vec![None; count]);
    }
    const POINTER: usize = std::mem::size_of::<*const u8>();
    if values_stride != 0 && values_stride < POINTER {
        return Err(stridekv_core::CoreError::invalid_argument(format!(
            "stride {values_stride} is smaller than the {POINTER}-byte element"
        ))
        .into());
    }
    // SAFETY: forwarded caller contract.
    let offsets = unsafe { strided::<u32>(offsets.cast(), offsets_stride, count, 0)? };
    let lengths = if lengths.is_null() {
        None
    } else {
        // SAFETY: forwarded caller contract.
        Some(unsafe { strided::<u32>(lengths.cast(), lengths_stride, count, 0)? })
    };
    offsets.check(count, "offsets")?;
    if let Some(lengths) = &lengths {
        lengths.check(count, "lengths")?;
    }

    let mut contents = Vec::new();
    contents
        .try_reserve_exact(count)
        .map_err(|e| stridekv_core::CoreError::resource_exhausted(format!("value views: {e}")))?;
    for i in 0..count {
        // SAFETY: element `i` of the pointer array lies within the span
        // the caller vouched for; pointers may be unaligned.
        let content = unsafe {
            ptr::read_unaligned(values.cast::<u8>().add(i * values_stride).cast::<*const u8>())
        };
        if content.is_null() {
            contents.push(None);
            continue;
        }
        // SAFETY: the offset stays inside the caller's value buffer.
        let start = unsafe { content.add(offsets.get(i) as usize) };
        let len = match &lengths {
            Some(lengths) => match lengths.get(i) {
                LENGTH_MISSING => {
                    contents.push(None);
                    continue;
                }
                len => len as usize,
            },
            // SAFETY: NUL-terminated per the caller contract.
            None => unsafe { CStr::from_ptr(start.cast::<c_char>()) }.to_bytes().len(),
        };
        // SAFETY: `len` readable bytes at `start` per the caller contract.
        contents.push(Some(unsafe { slice::from_raw_parts(start, len) }));
    }
    Ok(contents)
}

/// Borrows a string argument; null reads as the empty string.
///
/// # Safety
///
/// A non-null `text` must be NUL-terminated and live for `'a`.
pub(crate) unsafe fn text<'a>(text: *const c_char, what: &'static str) -> FfiResult<&'a str> {
    if text.is_null() {
        return Ok("");
    }
    // SAFETY: NUL-terminated per the caller contract.
    unsafe { CStr::from_ptr(text) }
        .to_str()
        .map_err(|_| FfiError::InvalidUtf8(what))
}

/// Borrows a database handle.
///
/// # Safety
///
/// A non-null `db` must come from `skv_open` and not be freed.
pub(crate) unsafe fn database<'a>(db: *const SkvDatabase) -> FfiResult<&'a SkvDatabase> {
    // SAFETY: valid handle per the caller contract.
    unsafe { db.as_ref() }.ok_or(FfiError::NullPointer("database"))
}

/// Returns the arena behind `slot`, allocating one for `db` if the slot is
/// empty.
///
/// # Safety
///
/// `slot` must be valid for reads and writes and hold null or a live
/// arena.
pub(crate) unsafe fn arena<'a>(db: &Database, slot: *mut *mut SkvArena) -> FfiResult<&'a mut SkvArena> {
    if slot.is_null() {
        return Err(FfiError::NullPointer("arena"));
    }
    // SAFETY: readable and writable per the caller contract.
    unsafe {
        if (*slot).is_null() {
            *slot = Box::into_raw(Box::new(SkvArena::new(db.new_arena())));
        }
        Ok(&mut **slot)
    }
}

/// Stores `value` through `out` if the slot is non-null.
///
/// # Safety
///
/// A non-null `out` must be valid for writes.
pub(crate) unsafe fn export<T>(out: *mut T, value: T) {
    if !out.is_null() {
        // SAFETY: writable per the caller contract.
        unsafe { *out = value };
    }
}

/// Pointer to the first element, or null for an empty slice.
pub(crate) fn head<T>(items: &[T]) -> *const T {
    if items.is_empty() {
        ptr::null()
    } else {
        items.as_ptr()
    }
}
