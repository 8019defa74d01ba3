//! Per-key version history.

use crate::types::{Version, Versioned};
use bytes::Bytes;

/// Fixed bookkeeping cost charged per retained version in estimates.
pub(crate) const ENTRY_OVERHEAD: u64 = 32;

/// Versions of a single key, oldest first.
///
/// Invariant: versions are strictly increasing and the chain is never empty.
#[derive(Debug, Clone)]
pub(crate) struct VersionChain {
    entries: Vec<(Version, Option<Bytes>)>,
}

impl VersionChain {
    pub(crate) fn new(version: Version, value: Option<Bytes>) -> Self {
        Self {
            entries: vec![(version, value)],
        }
    }

    /// Newest entry with `version <= at`.
    pub(crate) fn visible(&self, at: Version) -> Option<&(Version, Option<Bytes>)> {
        self.entries.iter().rev().find(|(v, _)| *v <= at)
    }

    /// Observation at `at`, including the version of a visible tombstone.
    pub(crate) fn observe(&self, at: Version) -> Versioned {
        match self.visible(at) {
            Some((version, value)) => Versioned {
                version: *version,
                value: value.clone(),
            },
            None => Versioned::absent(),
        }
    }

    pub(crate) fn head(&self) -> &(Version, Option<Bytes>) {
        // Never empty by construction.
        &self.entries[self.entries.len() - 1]
    }

    pub(crate) fn head_version(&self) -> Version {
        self.head().0
    }

    /// Appends a new entry. A second write under the same version replaces
    /// the first, which gives last-writer-wins inside one batch.
    pub(crate) fn push(&mut self, version: Version, value: Option<Bytes>) {
        match self.entries.last_mut() {
            Some(last) if last.0 == version => last.1 = value,
            _ => self.entries.push((version, value)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if any retained version holds a value.
    pub(crate) fn has_value(&self) -> bool {
        self.entries.iter().any(|(_, v)| v.is_some())
    }

    /// Bytes of every retained value.
    pub(crate) fn retained_bytes(&self) -> u64 {
        self.entries
            .iter()
            .filter_map(|(_, v)| v.as_ref().map(|b| b.len() as u64))
            .sum()
    }

    /// Drops history no reader at `horizon` or later can observe.
    ///
    /// Returns the number of removed entries. A chain whose only remaining
    /// entry is a tombstone at or below the horizon is reported through
    /// [`Self::is_dead`] so the caller can remove the key.
    pub(crate) fn prune(&mut self, horizon: Version) -> usize {
        let keep_from = self
            .entries
            .iter()
            .rposition(|(v, _)| *v <= horizon)
            .unwrap_or(0);
        self.entries.drain(..keep_from);
        keep_from
    }

    pub(crate) fn is_dead(&self, horizon: Version) -> bool {
        self.entries.len() == 1 && self.entries[0].1.is_none() && self.entries[0].0 <= horizon
    }
}
