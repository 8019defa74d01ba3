//! Database statistics.
//!
//! Counters are per task, not per call: a read batch of 100 keys adds 100
//! to `reads`.
//!
//! ```rust,ignore
//! let db = Database::open_in_memory()?;
//! // ... batch calls ...
//! let stats = db.stats();
//! println!("reads: {} bytes out: {}", stats.reads, stats.bytes_read);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live database counters.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    // Task counters
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    scans: AtomicU64,
    estimates: AtomicU64,

    // Bytes
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,

    // Transactions
    transactions_started: AtomicU64,
    transactions_committed: AtomicU64,
    transactions_conflicted: AtomicU64,
    transactions_reset: AtomicU64,

    errors: AtomicU64,
}

impl DatabaseStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_reads(&self, tasks: u64, bytes: u64) {
        self.reads.fetch_add(tasks, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_writes(&self, puts: u64, deletes: u64, bytes: u64) {
        self.writes.fetch_add(puts, Ordering::Relaxed);
        self.deletes.fetch_add(deletes, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_scans(&self, tasks: u64) {
        self.scans.fetch_add(tasks, Ordering::Relaxed);
    }

    pub(crate) fn record_estimates(&self, tasks: u64) {
        self.estimates.fetch_add(tasks, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_conflict(&self) {
        self.transactions_conflicted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_reset(&self) {
        self.transactions_reset.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Total read tasks.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Total put tasks.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Total delete tasks.
    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Total scan tasks.
    pub fn scans(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    /// Total size-estimate tasks.
    pub fn estimates(&self) -> u64 {
        self.estimates.load(Ordering::Relaxed)
    }

    /// Value bytes exported by reads.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Value bytes accepted by writes.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Transactions begun.
    pub fn transactions_started(&self) -> u64 {
        self.transactions_started.load(Ordering::Relaxed)
    }

    /// Transactions committed.
    pub fn transactions_committed(&self) -> u64 {
        self.transactions_committed.load(Ordering::Relaxed)
    }

    /// Commits rejected by validation.
    pub fn transactions_conflicted(&self) -> u64 {
        self.transactions_conflicted.load(Ordering::Relaxed)
    }

    /// Transactions reset for reuse.
    pub fn transactions_reset(&self) -> u64 {
        self.transactions_reset.load(Ordering::Relaxed)
    }

    /// Calls that returned an error.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Copies every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            reads: self.reads(),
            writes: self.writes(),
            deletes: self.deletes(),
            scans: self.scans(),
            estimates: self.estimates(),
            bytes_read: self.bytes_read(),
            bytes_written: self.bytes_written(),
            transactions_started: self.transactions_started(),
            transactions_committed: self.transactions_committed(),
            transactions_conflicted: self.transactions_conflicted(),
            transactions_reset: self.transactions_reset(),
            errors: self.errors(),
        }
    }
}

/// A point-in-time copy of [`DatabaseStats`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    /// Total read tasks.
    pub reads: u64,
    /// Total put tasks.
    pub writes: u64,
    /// Total delete tasks.
    pub deletes: u64,
    /// Total scan tasks.
    pub scans: u64,
    /// Total size-estimate tasks.
    pub estimates: u64,
    /// Value bytes exported by reads.
    pub bytes_read: u64,
    /// Value bytes accepted by writes.
    pub bytes_written: u64,
    /// Transactions begun.
    pub transactions_started: u64,
    /// Transactions committed.
    pub transactions_committed: u64,
    /// Commits rejected by validation.
    pub transactions_conflicted: u64,
    /// Transactions reset for reuse.
    pub transactions_reset: u64,
    /// Calls that returned an error.
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stats_are_zero() {
        let stats = DatabaseStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn batch_counters() {
        let stats = DatabaseStats::new();
        stats.record_reads(3, 120);
        stats.record_writes(2, 1, 40);
        stats.record_scans(4);

        let snap = stats.snapshot();
        assert_eq!(snap.reads, 3);
        assert_eq!(snap.bytes_read, 120);
        assert_eq!(snap.writes, 2);
        assert_eq!(snap.deletes, 1);
        assert_eq!(snap.bytes_written, 40);
        assert_eq!(snap.scans, 4);
    }

    #[test]
    fn transaction_counters() {
        let stats = DatabaseStats::new();
        stats.record_transaction_start();
        stats.record_transaction_start();
        stats.record_transaction_commit();
        stats.record_transaction_conflict();
        stats.record_transaction_reset();

        assert_eq!(stats.transactions_started(), 2);
        assert_eq!(stats.transactions_committed(), 1);
        assert_eq!(stats.transactions_conflicted(), 1);
        assert_eq!(stats.transactions_reset(), 1);
    }

    #[test]
    fn concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(DatabaseStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        s.record_reads(1, 2);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.reads(), 800);
        assert_eq!(stats.bytes_read(), 1600);
    }
}
