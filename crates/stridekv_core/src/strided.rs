//! Strided views over caller-supplied argument arrays.
//!
//! A batch call describes N tasks through several independent arrays. Each
//! array may be laid out with its own pitch, or collapsed into a single
//! element that is broadcast to every task. [`Strided`] hides those layouts
//! behind one indexed accessor.

use crate::error::{CoreError, CoreResult};
use crate::types::{CollectionId, Key, LENGTH_MISSING};
use std::fmt;

/// Fixed-size values that can be decoded from a byte view.
pub trait Scalar: Copy {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Decodes a value from the first `SIZE` bytes of `bytes`
    /// (native endian).
    fn read(bytes: &[u8]) -> Self;
}

macro_rules! impl_scalar {
    ($($t:ty),*) => {$(
        impl Scalar for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            fn read(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(&bytes[..Self::SIZE]);
                <$t>::from_ne_bytes(raw)
            }
        }
    )*};
}

impl_scalar!(i64, u64, u32, usize);

impl Scalar for CollectionId {
    const SIZE: usize = 8;

    fn read(bytes: &[u8]) -> Self {
        CollectionId::new(u64::read(bytes))
    }
}

enum Source<'a, T> {
    Repeat(T),
    Slice(&'a [T]),
    Bytes {
        bytes: &'a [u8],
        stride: usize,
        count: usize,
        decode: fn(&[u8]) -> T,
    },
    Fn {
        count: usize,
        f: Box<dyn Fn(usize) -> T + 'a>,
    },
}

/// An indexed, read-only view of N logical elements.
pub struct Strided<'a, T> {
    source: Source<'a, T>,
}

impl<'a, T: Copy> Strided<'a, T> {
    /// Broadcasts one value to every index.
    #[must_use]
    pub fn repeat(value: T) -> Self {
        Self {
            source: Source::Repeat(value),
        }
    }

    /// Views contiguous elements. A one-element slice is broadcast.
    #[must_use]
    pub fn slice(values: &'a [T]) -> Self {
        Self {
            source: Source::Slice(values),
        }
    }

    /// Gathers elements through a function of the index.
    ///
    /// `count` is the number of indices `f` accepts.
    pub fn from_fn(count: usize, f: impl Fn(usize) -> T + 'a) -> Self {
        Self {
            source: Source::Fn {
                count,
                f: Box::new(f),
            },
        }
    }

    /// Element at `i`.
    ///
    /// The view must have been checked with [`Self::check`] for a count
    /// greater than `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` lies outside an unchecked view.
    #[must_use]
    pub fn get(&self, i: usize) -> T {
        match &self.source {
            Source::Repeat(value) => *value,
            Source::Slice(values) if values.len() == 1 => values[0],
            Source::Slice(values) => values[i],
            Source::Bytes {
                bytes,
                stride,
                decode,
                ..
            } => decode(&bytes[i * stride..]),
            Source::Fn { f, .. } => f(i),
        }
    }

    /// Returns true if every index yields the same element.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        match &self.source {
            Source::Repeat(_) => true,
            Source::Slice(values) => values.len() == 1,
            Source::Bytes { stride, .. } => *stride == 0,
            Source::Fn { .. } => false,
        }
    }

    /// Verifies the view can serve `count` elements.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` naming `what` if the view is too short.
    pub fn check(&self, count: usize, what: &str) -> CoreResult<()> {
        let available = match &self.source {
            Source::Repeat(_) => return Ok(()),
            Source::Slice(values) if values.len() == 1 => return Ok(()),
            Source::Slice(values) => values.len(),
            Source::Bytes { stride: 0, .. } => return Ok(()),
            Source::Bytes { count: n, .. } | Source::Fn { count: n, .. } => *n,
        };
        if available < count {
            return Err(CoreError::invalid_argument(format!(
                "{what}: {available} elements for {count} tasks"
            )));
        }
        Ok(())
    }

    /// Collects the first `count` elements.
    pub fn to_vec(&self, count: usize) -> Vec<T> {
        (0..count).map(|i| self.get(i)).collect()
    }
}

impl<'a, T: Scalar> Strided<'a, T> {
    /// Views `count` elements encoded in `bytes`, element `i` starting at
    /// byte `i * stride`. A zero stride broadcasts the first element.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `bytes` does not hold `count` elements
    /// at the given stride, or if the stride is smaller than an element.
    pub fn from_bytes(bytes: &'a [u8], stride: usize, count: usize) -> CoreResult<Self> {
        if stride != 0 && stride < T::SIZE {
            return Err(CoreError::invalid_argument(format!(
                "stride {stride} is smaller than the {}-byte element",
                T::SIZE
            )));
        }
        let needed = match count {
            0 => 0,
            _ if stride == 0 => T::SIZE,
            n => (n - 1)
                .checked_mul(stride)
                .and_then(|x| x.checked_add(T::SIZE))
                .ok_or_else(|| CoreError::invalid_argument("strided span overflows"))?,
        };
        if bytes.len() < needed {
            return Err(CoreError::invalid_argument(format!(
                "strided view needs {needed} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            source: Source::Bytes {
                bytes,
                stride,
                count,
                decode: T::read,
            },
        })
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Strided<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Source::Repeat(value) => f.debug_tuple("Repeat").field(value).finish(),
            Source::Slice(values) => f.debug_tuple("Slice").field(values).finish(),
            Source::Bytes { stride, count, .. } => f
                .debug_struct("Bytes")
                .field("stride", stride)
                .field("count", count)
                .finish_non_exhaustive(),
            Source::Fn { count, .. } => {
                f.debug_struct("Fn").field("count", count).finish_non_exhaustive()
            }
        }
    }
}

/// Where a value's length comes from.
#[derive(Debug)]
pub enum Lengths<'a> {
    /// The whole content slice after the offset.
    Whole,
    /// Up to the first zero byte after the offset, or the whole remainder.
    NulTerminated,
    /// Explicit per-task lengths. [`LENGTH_MISSING`] deletes the key.
    Explicit(Strided<'a, u32>),
}

/// Per-task value arguments of a write.
///
/// `None` contents delete the key; a present, zero-length value stores an
/// empty value.
#[derive(Debug)]
pub struct ValueView<'a> {
    contents: Strided<'a, Option<&'a [u8]>>,
    offsets: Option<Strided<'a, u32>>,
    lengths: Lengths<'a>,
}

impl<'a> ValueView<'a> {
    /// Values taken whole from each content slice.
    #[must_use]
    pub fn new(contents: Strided<'a, Option<&'a [u8]>>) -> Self {
        Self {
            contents,
            offsets: None,
            lengths: Lengths::Whole,
        }
    }

    /// Deletes every key of the batch.
    #[must_use]
    pub fn deletes() -> Self {
        Self::new(Strided::repeat(None))
    }

    /// Sets per-task offsets into the content.
    #[must_use]
    pub fn with_offsets(mut self, offsets: Strided<'a, u32>) -> Self {
        self.offsets = Some(offsets);
        self
    }

    /// Sets how lengths are determined.
    #[must_use]
    pub fn with_lengths(mut self, lengths: Lengths<'a>) -> Self {
        self.lengths = lengths;
        self
    }

    /// Verifies every part can serve `count` tasks.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if any part is too short.
    pub fn check(&self, count: usize) -> CoreResult<()> {
        self.contents.check(count, "values")?;
        if let Some(offsets) = &self.offsets {
            offsets.check(count, "offsets")?;
        }
        if let Lengths::Explicit(lengths) = &self.lengths {
            lengths.check(count, "lengths")?;
        }
        Ok(())
    }

    /// Resolves the value of task `i`; `None` means delete.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the offset or length reaches past the
    /// content.
    pub fn get(&self, i: usize) -> CoreResult<Option<&'a [u8]>> {
        let Some(content) = self.contents.get(i) else {
            return Ok(None);
        };
        let offset = self.offsets.as_ref().map_or(0, |o| o.get(i) as usize);
        let Some(rest) = content.get(offset..) else {
            return Err(CoreError::invalid_argument(format!(
                "task {i}: offset {offset} past a {}-byte value",
                content.len()
            )));
        };
        let len = match &self.lengths {
            Lengths::Whole => rest.len(),
            Lengths::NulTerminated => rest.iter().position(|b| *b == 0).unwrap_or(rest.len()),
            Lengths::Explicit(lengths) => match lengths.get(i) {
                LENGTH_MISSING => return Ok(None),
                len => len as usize,
            },
        };
        rest.get(..len).map(Some).ok_or_else(|| {
            CoreError::invalid_argument(format!(
                "task {i}: length {len} past a {}-byte value",
                rest.len()
            ))
        })
    }
}

/// Key views must distinguish tasks.
pub(crate) fn check_keys(keys: &Strided<'_, Key>, count: usize) -> CoreResult<()> {
    if count > 1 && keys.is_broadcast() {
        return Err(CoreError::invalid_argument(
            "keys must not be broadcast across multiple tasks",
        ));
    }
    keys.check(count, "keys")
}
