//! Snapshot pin registry.
//!
//! A pinned version keeps its history alive: compaction never prunes
//! entries a pinned reader could still observe.

use crate::types::Version;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Reference-counted set of pinned versions.
#[derive(Debug, Default)]
pub struct SnapshotPins {
    pins: Mutex<BTreeMap<Version, usize>>,
}

impl SnapshotPins {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one reader at `version`.
    pub fn pin(&self, version: Version) {
        *self.pins.lock().entry(version).or_insert(0) += 1;
    }

    /// Releases one reader at `version`. Unknown versions are ignored.
    pub fn unpin(&self, version: Version) {
        let mut pins = self.pins.lock();
        if let Some(count) = pins.get_mut(&version) {
            *count -= 1;
            if *count == 0 {
                pins.remove(&version);
            }
        }
    }

    /// Oldest version still pinned, or `head` when nothing is pinned.
    #[must_use]
    pub fn horizon(&self, head: Version) -> Version {
        self.pins
            .lock()
            .keys()
            .next()
            .copied()
            .map_or(head, |oldest| oldest.min(head))
    }

    /// Total number of live pins.
    #[must_use]
    pub fn count(&self) -> usize {
        self.pins.lock().values().sum()
    }
}
