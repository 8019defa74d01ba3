//! Stress tests for StrideKV.
//!
//! These tests verify behavior under heavy load and concurrent access.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use stridekv_core::{
    CollectionId, CoreResult, Database, ErrorKind, Key, Options, Transaction, DEFAULT_COLLECTION,
};

use crate::ops::{put_all, try_read, try_scan, try_write};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Commits retried after a conflict.
    pub retries: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            retries: 0,
            duration,
            ops_per_second,
        }
    }

    /// Records conflict retries.
    #[must_use]
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Retries: {}", self.retries);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of batches to submit.
    pub operations: usize,
    /// Number of concurrent threads (for concurrent tests).
    pub threads: usize,
    /// Tasks per batch.
    pub batch_size: usize,
    /// Size of values in bytes.
    pub value_size: usize,
    /// Number of distinct keys.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            batch_size: 64,
            value_size: 128,
            key_count: 4_096,
        }
    }
}

impl StressConfig {
    /// A configuration small enough for unit tests.
    #[must_use]
    pub fn small() -> Self {
        Self {
            operations: 50,
            threads: 4,
            batch_size: 16,
            value_size: 32,
            key_count: 256,
        }
    }
}

fn batch_keys(config: &StressConfig, batch: usize) -> Vec<Key> {
    (0..config.batch_size)
        .map(|i| ((batch * config.batch_size + i) % config.key_count) as Key)
        .collect()
}

/// Writes `operations` batches of `batch_size` puts each.
pub fn stress_batched_writes(db: &Database, config: &StressConfig) -> StressTestResult {
    let value = vec![0xABu8; config.value_size];

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for batch in 0..config.operations {
        let entries: Vec<(Key, Option<&[u8]>)> = batch_keys(config, batch)
            .into_iter()
            .map(|k| (k, Some(value.as_slice())))
            .collect();
        match try_write(db, None, DEFAULT_COLLECTION, &entries) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Populates `key_count` keys, then reads `operations` batches.
///
/// A batch counts as failed if any key comes back missing.
pub fn stress_batched_reads(db: &Database, config: &StressConfig) -> StressTestResult {
    let value = vec![0xCDu8; config.value_size];
    let keys: Vec<Key> = (0..config.key_count as Key).collect();
    let pairs: Vec<(Key, &[u8])> = keys.iter().map(|&k| (k, value.as_slice())).collect();
    put_all(db, DEFAULT_COLLECTION, &pairs);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for batch in 0..config.operations {
        let keys = batch_keys(config, batch);
        match try_read(db, None, DEFAULT_COLLECTION, &keys, Options::NONE) {
            Ok(values) if values.iter().all(Option::is_some) => successful += 1,
            _ => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

fn decode_counter(value: Option<&[u8]>) -> u64 {
    value
        .and_then(|v| <[u8; 8]>::try_from(v).ok())
        .map_or(0, u64::from_le_bytes)
}

fn increment(db: &Database, txn: &mut Transaction, collection: CollectionId, key: Key) -> CoreResult<()> {
    let current = try_read(db, Some(&mut *txn), collection, &[key], Options::TRACK_READS)?;
    let next = (decode_counter(current[0].as_deref()) + 1).to_le_bytes();
    try_write(db, Some(&mut *txn), collection, &[(key, Some(&next[..]))])?;
    txn.commit(Options::NONE)?;
    Ok(())
}

/// Reads the counter stored by [`stress_concurrent_increments`].
pub fn read_counter(db: &Database, key: Key) -> u64 {
    let values = try_read(db, None, DEFAULT_COLLECTION, &[key], Options::NONE).expect("read failed");
    decode_counter(values[0].as_deref())
}

/// Every thread increments one shared counter `operations` times.
///
/// Each increment is a tracked read followed by a write in one
/// transaction. Conflicting commits are retried after a reset, so the
/// final counter equals the number of successful increments.
pub fn stress_concurrent_increments(db: &Database, key: Key, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let retries = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            let db = db.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let retries = Arc::clone(&retries);
            let operations = config.operations;

            thread::spawn(move || {
                let Ok(mut txn) = db.begin(0, Options::NONE) else {
                    failed.fetch_add(operations, Ordering::Relaxed);
                    return;
                };
                for _ in 0..operations {
                    loop {
                        match increment(&db, &mut txn, DEFAULT_COLLECTION, key) {
                            Ok(()) => {
                                successful.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                            Err(e) if e.kind() == ErrorKind::Conflict => {
                                retries.fetch_add(1, Ordering::Relaxed);
                                if txn.reset(0, Options::NONE).is_err() {
                                    failed.fetch_add(1, Ordering::Relaxed);
                                    break;
                                }
                            }
                            Err(_) => {
                                failed.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                        }
                    }
                    if txn.reset(0, Options::NONE).is_err() {
                        break;
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
    .with_retries(retries.load(Ordering::Relaxed))
}

/// One writer rewrites a group of keys in single batches while readers
/// scan the group from snapshot transactions.
///
/// A read counts as failed if the keys it sees disagree on the batch
/// number, which would mean a batch was observed half-applied.
pub fn stress_snapshot_reads(db: &Database, config: &StressConfig) -> StressTestResult {
    let group: Vec<Key> = (0..config.batch_size.max(2) as Key).collect();
    let stop = Arc::new(AtomicBool::new(false));
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    write_generation(db, &group, 0);
    let start = Instant::now();

    let writer = {
        let db = db.clone();
        let group = group.clone();
        let stop = Arc::clone(&stop);
        let failed = Arc::clone(&failed);
        let rounds = config.operations as u64;
        thread::spawn(move || {
            for round in 1..=rounds {
                if try_write_generation(&db, &group, round).is_err() {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
            }
            stop.store(true, Ordering::Release);
        })
    };

    let readers: Vec<_> = (0..config.threads)
        .map(|_| {
            let db = db.clone();
            let group = group.clone();
            let stop = Arc::clone(&stop);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            thread::spawn(move || loop {
                let done = stop.load(Ordering::Acquire);
                match snapshot_is_consistent(&db, &group) {
                    Ok(true) => successful.fetch_add(1, Ordering::Relaxed),
                    _ => failed.fetch_add(1, Ordering::Relaxed),
                };
                if done {
                    break;
                }
            })
        })
        .collect();

    writer.join().expect("Writer panicked");
    for handle in readers {
        handle.join().expect("Reader panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

fn try_write_generation(db: &Database, group: &[Key], round: u64) -> CoreResult<()> {
    let value = round.to_le_bytes();
    let entries: Vec<(Key, Option<&[u8]>)> = group.iter().map(|&k| (k, Some(&value[..]))).collect();
    try_write(db, None, DEFAULT_COLLECTION, &entries)
}

fn write_generation(db: &Database, group: &[Key], round: u64) {
    try_write_generation(db, group, round).expect("write failed");
}

fn snapshot_is_consistent(db: &Database, group: &[Key]) -> CoreResult<bool> {
    let mut txn = db.begin(0, Options::SNAPSHOT)?;
    let first = try_read(db, Some(&mut txn), DEFAULT_COLLECTION, group, Options::NONE)?;
    let listed = try_scan(db, Some(&mut txn), DEFAULT_COLLECTION, Key::MIN, group.len() as u32)?;
    let again = try_read(db, Some(&mut txn), DEFAULT_COLLECTION, group, Options::NONE)?;

    let round = decode_counter(first[0].as_deref());
    let uniform = first.iter().all(|v| decode_counter(v.as_deref()) == round);
    Ok(uniform && first == again && listed == group)
}
