//! Reusable output memory for batch calls.
//!
//! An [`Arena`] holds a byte tape of concatenated values plus parallel
//! arrays of lengths, offsets, keys and estimates. Each batch call resets
//! the arena and refills it, so successive calls on one arena reuse the
//! same allocations. Outputs borrow the arena; the borrow checker keeps a
//! previous call's output from being read after the arena is reused.

use crate::database::Shared;
use crate::error::{CoreError, CoreResult};
use crate::types::{Key, LENGTH_MISSING};
use std::sync::{Arc, Weak};

/// Smallest tape allocation.
const MIN_TAPE_CAPACITY: usize = 64;

/// Scratch memory that receives the results of batch calls.
///
/// An arena is bound to the first database that writes into it; using it
/// with another database fails with `InvalidArgument`.
#[derive(Debug, Default)]
pub struct Arena {
    tape: Vec<u8>,
    lengths: Vec<u32>,
    offsets: Vec<u32>,
    keys: Vec<Key>,
    counts: Vec<u32>,
    estimates: Vec<u64>,
    owner: Option<Weak<Shared>>,
}

impl Arena {
    /// Creates an empty arena. Nothing is allocated until first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an arena whose tape starts with `bytes` of capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            tape: Vec::with_capacity(bytes),
            ..Self::default()
        }
    }

    /// Ensures the tape can hold at least `min_bytes` without reallocating.
    ///
    /// Growth is geometric: the new capacity is the largest of `min_bytes`,
    /// twice the current capacity and a small floor.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` if the allocation fails.
    pub fn acquire(&mut self, min_bytes: usize) -> CoreResult<()> {
        if self.tape.capacity() >= min_bytes {
            return Ok(());
        }
        let target = min_bytes
            .max(self.tape.capacity().saturating_mul(2))
            .max(MIN_TAPE_CAPACITY);
        self.tape
            .try_reserve_exact(target - self.tape.len())
            .map_err(|e| CoreError::resource_exhausted(format!("arena tape of {target} bytes: {e}")))
    }

    /// Empties every array, keeping the allocations.
    pub fn reset(&mut self) {
        self.tape.clear();
        self.lengths.clear();
        self.offsets.clear();
        self.keys.clear();
        self.counts.clear();
        self.estimates.clear();
    }

    /// Returns all memory to the allocator. Safe on an unused arena.
    pub fn release(&mut self) {
        let owner = self.owner.take();
        *self = Self {
            owner,
            ..Self::default()
        };
    }

    /// Tape capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tape.capacity()
    }

    /// Bytes currently on the tape.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tape.len()
    }

    /// Returns true if the tape is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tape.is_empty()
    }

    /// Binds to `db` on first use and resets for a new call.
    pub(crate) fn begin(&mut self, db: &Arc<Shared>) -> CoreResult<()> {
        match &self.owner {
            None => self.owner = Some(Arc::downgrade(db)),
            Some(owner) => {
                if owner.strong_count() == 0 {
                    return Err(CoreError::DatabaseClosed);
                }
                if !std::ptr::eq(owner.as_ptr(), Arc::as_ptr(db)) {
                    return Err(CoreError::invalid_argument(
                        "arena is bound to another database",
                    ));
                }
            }
        }
        self.reset();
        Ok(())
    }

    fn reserve_tasks(&mut self, count: usize) -> CoreResult<()> {
        let map = |e: std::collections::TryReserveError| {
            CoreError::resource_exhausted(format!("arena arrays for {count} tasks: {e}"))
        };
        self.lengths.try_reserve(count).map_err(map)?;
        self.offsets.try_reserve(count).map_err(map)?;
        Ok(())
    }

    fn tape_offset(&self) -> CoreResult<u32> {
        u32::try_from(self.tape.len())
            .map_err(|_| CoreError::resource_exhausted("arena tape exceeds 4 GiB"))
    }

    /// Prepares parallel arrays for `count` read tasks.
    pub(crate) fn begin_values(&mut self, count: usize) -> CoreResult<()> {
        self.reserve_tasks(count)
    }

    /// Appends one value, or the missing sentinel.
    pub(crate) fn push_value(&mut self, value: Option<&[u8]>) -> CoreResult<()> {
        let offset = self.tape_offset()?;
        match value {
            Some(bytes) => {
                let len = len_u32(bytes.len())?;
                let end = tape_end(offset, len)?;
                self.acquire(end)?;
                self.tape.extend_from_slice(bytes);
                self.lengths.push(len);
            }
            None => self.lengths.push(LENGTH_MISSING),
        }
        self.offsets.push(offset);
        Ok(())
    }

    /// Appends a length without exporting the value.
    pub(crate) fn push_length(&mut self, len: Option<usize>) -> CoreResult<()> {
        let len = match len {
            Some(len) => len_u32(len)?,
            None => LENGTH_MISSING,
        };
        self.lengths.push(len);
        Ok(())
    }

    /// Appends one task's scan results.
    pub(crate) fn push_scan(&mut self, found: &[(Key, usize)], with_lengths: bool) -> CoreResult<()> {
        let start = u32::try_from(self.keys.len())
            .map_err(|_| CoreError::resource_exhausted("too many scanned keys"))?;
        let count = len_u32(found.len())?;
        self.keys
            .try_reserve(found.len())
            .map_err(|e| CoreError::resource_exhausted(format!("scan keys: {e}")))?;
        for (key, len) in found {
            self.keys.push(*key);
            if with_lengths {
                self.lengths.push(len_u32(*len)?);
            }
        }
        self.offsets.push(start);
        self.counts.push(count);
        Ok(())
    }

    /// Appends one task's six estimate integers.
    pub(crate) fn push_estimate(&mut self, values: [u64; 6]) {
        self.estimates.extend_from_slice(&values);
    }

    pub(crate) fn tape(&self) -> &[u8] {
        &self.tape
    }

    pub(crate) fn lengths(&self) -> &[u32] {
        &self.lengths
    }

    pub(crate) fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub(crate) fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub(crate) fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub(crate) fn estimates(&self) -> &[u64] {
        &self.estimates
    }
}

/// End of a value of `len` bytes placed at tape `offset`, if it stays
/// addressable by 32-bit offsets.
fn tape_end(offset: u32, len: u32) -> CoreResult<usize> {
    offset
        .checked_add(len)
        .map(|end| end as usize)
        .ok_or_else(|| CoreError::resource_exhausted("arena tape exceeds 4 GiB"))
}

fn len_u32(len: usize) -> CoreResult<u32> {
    match u32::try_from(len) {
        Ok(len) if len != LENGTH_MISSING => Ok(len),
        _ => Err(CoreError::resource_exhausted(format!(
            "value of {len} bytes does not fit a 32-bit length"
        ))),
    }
}
