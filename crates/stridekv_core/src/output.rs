//! Results of batch calls, borrowed from the arena that holds them.

use crate::arena::Arena;
use crate::types::{Estimate, Key, LENGTH_MISSING};
use stridekv_storage::Bounds;

/// Result of [`Database::read`](crate::Database::read).
///
/// Task `i` has `lengths()[i]`, which is [`LENGTH_MISSING`] for an absent
/// key. Unless the read asked for lengths only, its bytes are at
/// `tape()[offsets()[i]..][..lengths()[i]]`.
#[derive(Debug, Clone, Copy)]
pub struct ReadOutput<'a> {
    arena: &'a Arena,
    lengths_only: bool,
}

impl<'a> ReadOutput<'a> {
    pub(crate) fn new(arena: &'a Arena, lengths_only: bool) -> Self {
        Self {
            arena,
            lengths_only,
        }
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.lengths().len()
    }

    /// Returns true if the read had no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value length per task.
    #[must_use]
    pub fn lengths(&self) -> &'a [u32] {
        self.arena.lengths()
    }

    /// Tape offset per task. Empty for length-only reads.
    #[must_use]
    pub fn offsets(&self) -> &'a [u32] {
        self.arena.offsets()
    }

    /// Concatenated values. Empty for length-only reads.
    #[must_use]
    pub fn tape(&self) -> &'a [u8] {
        self.arena.tape()
    }

    /// Returns true if task `i` found a value.
    #[must_use]
    pub fn is_present(&self, i: usize) -> bool {
        self.lengths().get(i).is_some_and(|&len| len != LENGTH_MISSING)
    }

    /// Value of task `i`; `None` if absent, out of range, or the read
    /// exported lengths only.
    #[must_use]
    pub fn value(&self, i: usize) -> Option<&'a [u8]> {
        if self.lengths_only {
            return None;
        }
        let len = *self.lengths().get(i)?;
        if len == LENGTH_MISSING {
            return None;
        }
        let start = *self.offsets().get(i)? as usize;
        self.tape().get(start..start + len as usize)
    }

    /// Iterates task values in order.
    pub fn values(&self) -> impl Iterator<Item = Option<&'a [u8]>> + 'a {
        let out = *self;
        (0..out.len()).map(move |i| out.value(i))
    }
}

/// Result of [`Database::scan`](crate::Database::scan).
#[derive(Debug, Clone, Copy)]
pub struct ScanOutput<'a> {
    arena: &'a Arena,
    with_lengths: bool,
}

impl<'a> ScanOutput<'a> {
    pub(crate) fn new(arena: &'a Arena, with_lengths: bool) -> Self {
        Self {
            arena,
            with_lengths,
        }
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.counts().len()
    }

    /// Returns true if the scan had no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys found per task.
    #[must_use]
    pub fn counts(&self) -> &'a [u32] {
        self.arena.counts()
    }

    /// Start of each task's run in [`all_keys`](Self::all_keys).
    #[must_use]
    pub fn offsets(&self) -> &'a [u32] {
        self.arena.offsets()
    }

    /// Keys of every task, concatenated.
    #[must_use]
    pub fn all_keys(&self) -> &'a [Key] {
        self.arena.keys()
    }

    /// Lengths of every task, parallel to [`all_keys`](Self::all_keys).
    /// Empty unless the scan asked for lengths.
    #[must_use]
    pub fn all_lengths(&self) -> &'a [u32] {
        if self.with_lengths {
            self.arena.lengths()
        } else {
            &[]
        }
    }

    fn span(&self, i: usize) -> Option<std::ops::Range<usize>> {
        let start = *self.arena.offsets().get(i)? as usize;
        let count = *self.arena.counts().get(i)? as usize;
        Some(start..start + count)
    }

    /// Keys of task `i` in ascending order.
    #[must_use]
    pub fn keys(&self, i: usize) -> &'a [Key] {
        self.span(i)
            .and_then(|span| self.arena.keys().get(span))
            .unwrap_or_default()
    }

    /// Value lengths of task `i`, parallel to [`keys`](Self::keys). Empty
    /// unless the scan asked for lengths.
    #[must_use]
    pub fn lengths(&self, i: usize) -> &'a [u32] {
        if !self.with_lengths {
            return &[];
        }
        self.span(i)
            .and_then(|span| self.arena.lengths().get(span))
            .unwrap_or_default()
    }
}

/// Result of [`Database::size`](crate::Database::size): six integers per
/// task, `[cardinality lo, hi, value bytes lo, hi, space lo, hi]`.
#[derive(Debug, Clone, Copy)]
pub struct SizeOutput<'a> {
    arena: &'a Arena,
}

impl<'a> SizeOutput<'a> {
    pub(crate) fn new(arena: &'a Arena) -> Self {
        Self { arena }
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.estimates().len() / Estimate::FIELDS
    }

    /// Returns true if the request had no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The flat integer array.
    #[must_use]
    pub fn as_slice(&self) -> &'a [u64] {
        self.arena.estimates()
    }

    /// Estimate of task `i`.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<Estimate> {
        let raw = self
            .arena
            .estimates()
            .get(i * Estimate::FIELDS..(i + 1) * Estimate::FIELDS)?;
        Some(Estimate {
            cardinality: Bounds::new(raw[0], raw[1]),
            value_bytes: Bounds::new(raw[2], raw[3]),
            space_usage: Bounds::new(raw[4], raw[5]),
        })
    }
}
