//! Core type definitions for StrideKV.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

pub use stridekv_storage::{Bounds, CollectionId, Estimate, Key, Version};

/// The always-present, unnamed collection.
pub const DEFAULT_COLLECTION: CollectionId = CollectionId::DEFAULT;

/// Length reported for a value that does not exist.
///
/// Distinct from `0`, which is a present, empty value.
pub const LENGTH_MISSING: u32 = u32::MAX;

/// Option bitmask accepted by the batch operations.
///
/// Bit `0` is reserved and must be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Options(u32);

impl Options {
    /// No options.
    pub const NONE: Self = Self(0);
    /// Reads and scans report lengths only, without exporting values.
    pub const READ_LENGTHS: Self = Self(1 << 1);
    /// Writes and commits are forced to durable media before returning.
    pub const FLUSH: Self = Self(1 << 2);
    /// Transactional reads record the observed version for validation.
    pub const TRACK_READS: Self = Self(1 << 3);
    /// Transactions pin a snapshot at begin.
    pub const SNAPSHOT: Self = Self(1 << 4);

    const KNOWN: u32 = Self::READ_LENGTHS.0 | Self::FLUSH.0 | Self::TRACK_READS.0 | Self::SNAPSHOT.0;

    /// Validates raw bits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if any unknown bit is set.
    pub fn from_bits(bits: u32) -> CoreResult<Self> {
        if bits & !Self::KNOWN != 0 {
            return Err(CoreError::invalid_argument(format!(
                "unknown option bits {:#x}",
                bits & !Self::KNOWN
            )));
        }
        Ok(Self(bits))
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn check(self) -> CoreResult<Self> {
        Self::from_bits(self.0)
    }
}

impl BitOr for Options {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Options {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::READ_LENGTHS, "read_lengths"),
            (Self::FLUSH, "flush"),
            (Self::TRACK_READS, "track_reads"),
            (Self::SNAPSHOT, "snapshot"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}
