//! Batch operations.
//!
//! Each call validates the whole request before touching the store, then
//! routes every task either through a transaction or directly to the head
//! of the store. Results go into the caller's [`Arena`]; the returned
//! output borrows it until the next call.

use crate::arena::Arena;
use crate::database::Database;
use crate::error::CoreResult;
use crate::output::{ReadOutput, ScanOutput, SizeOutput};
use crate::request::{ReadRequest, ScanRequest, SizeRequest, WriteRequest};
use crate::strided::check_keys;
use crate::transaction::Transaction;
use crate::types::{Key, Options};
use bytes::Bytes;
use stridekv_storage::{StorageError, WriteBatch};
use tracing::trace;

impl Database {
    /// Applies a batch of puts and deletes.
    ///
    /// Without a transaction the batch is committed atomically as one new
    /// version. With one, the changes are staged in it. Later tasks win
    /// over earlier tasks on the same key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed views, `NotFound` if a task
    /// targets a missing collection, or a storage error. Nothing is written
    /// when an error is returned.
    pub fn write(
        &self,
        txn: Option<&mut Transaction>,
        request: &WriteRequest<'_>,
        options: Options,
    ) -> CoreResult<()> {
        let result = self.write_batch(txn, request, options);
        self.inner.tally(result)
    }

    /// Looks up a batch of keys.
    ///
    /// With [`Options::READ_LENGTHS`] only lengths are exported. With a
    /// transaction and [`Options::TRACK_READS`] every observed version is
    /// recorded for validation at commit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed views or a foreign arena,
    /// `NotFound` for a missing collection, or `ResourceExhausted` if the
    /// arena cannot grow.
    pub fn read<'a>(
        &self,
        txn: Option<&mut Transaction>,
        request: &ReadRequest<'_>,
        options: Options,
        arena: &'a mut Arena,
    ) -> CoreResult<ReadOutput<'a>> {
        let result = self.read_batch(txn, request, options, arena);
        self.inner
            .tally(result)
            .map(move |lengths_only| ReadOutput::new(arena, lengths_only))
    }

    /// Runs a batch of ascending range scans.
    ///
    /// Task `i` returns up to `limits[i]` present keys `>= min_keys[i]`.
    /// Start keys must not broadcast across more than one task.
    /// Transactional scans include the transaction's staged puts and hide
    /// its staged deletes. Lengths are exported with
    /// [`Options::READ_LENGTHS`].
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    pub fn scan<'a>(
        &self,
        txn: Option<&mut Transaction>,
        request: &ScanRequest<'_>,
        options: Options,
        arena: &'a mut Arena,
    ) -> CoreResult<ScanOutput<'a>> {
        let result = self.scan_batch(txn, request, options, arena);
        self.inner
            .tally(result)
            .map(move |with_lengths| ScanOutput::new(arena, with_lengths))
    }

    /// Estimates the size of a batch of key ranges.
    ///
    /// Each range reports lower and upper bounds on its entry count, value
    /// bytes and memory footprint. Options carry no size-specific bits
    /// and are only checked for unknown flags.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    pub fn size<'a>(
        &self,
        txn: Option<&Transaction>,
        request: &SizeRequest<'_>,
        options: Options,
        arena: &'a mut Arena,
    ) -> CoreResult<SizeOutput<'a>> {
        let result = self.size_batch(txn, request, options, arena);
        self.inner.tally(result).map(move |()| SizeOutput::new(arena))
    }

    fn prepare(&self, txn: Option<&Transaction>, options: Options) -> CoreResult<Options> {
        self.check_open()?;
        let options = options.check()?;
        if let Some(txn) = txn {
            txn.belongs_to(&self.inner)?;
            txn.ensure_active()?;
        }
        Ok(options)
    }

    fn write_batch(
        &self,
        txn: Option<&mut Transaction>,
        request: &WriteRequest<'_>,
        options: Options,
    ) -> CoreResult<()> {
        let options = self.prepare(txn.as_deref(), options)?;
        let n = request.count;
        request.collections.check(n, "collections")?;
        check_keys(&request.keys, n)?;
        request.values.check(n)?;

        let mut batch = WriteBatch::with_capacity(n);
        let (mut puts, mut deletes, mut bytes) = (0u64, 0u64, 0u64);
        for i in 0..n {
            let value = request.values.get(i)?;
            match value {
                Some(v) => {
                    puts += 1;
                    bytes += v.len() as u64;
                }
                None => deletes += 1,
            }
            batch.push(
                request.collections.get(i),
                request.keys.get(i),
                value.map(Bytes::copy_from_slice),
            );
        }
        if batch.is_empty() {
            return Ok(());
        }

        match txn {
            Some(txn) => {
                {
                    let reader = self.inner.store.reader()?;
                    if let Some(m) = batch.iter().find(|m| !reader.contains(m.collection)) {
                        return Err(StorageError::UnknownCollection(m.collection).into());
                    }
                }
                for m in &batch {
                    txn.stage(m.collection, m.key, m.value.clone());
                }
            }
            None => {
                let outcome =
                    self.inner
                        .store
                        .commit(&batch, &[], options.contains(Options::FLUSH))?;
                trace!(tasks = n, applied = outcome.is_applied(), "head write");
            }
        }
        self.inner.stats.record_writes(puts, deletes, bytes);
        Ok(())
    }

    fn read_batch(
        &self,
        mut txn: Option<&mut Transaction>,
        request: &ReadRequest<'_>,
        options: Options,
        arena: &mut Arena,
    ) -> CoreResult<bool> {
        let options = self.prepare(txn.as_deref(), options)?;
        let n = request.count;
        request.collections.check(n, "collections")?;
        check_keys(&request.keys, n)?;
        arena.begin(&self.inner)?;
        arena.begin_values(n)?;

        let lengths_only = options.contains(Options::READ_LENGTHS);
        let track = options.contains(Options::TRACK_READS);
        let reader = self.inner.store.reader()?;
        let mut bytes = 0u64;
        for i in 0..n {
            let (collection, key) = (request.collections.get(i), request.keys.get(i));
            let value = match txn.as_deref_mut() {
                Some(txn) => txn.read(&reader, collection, key, track)?,
                None => reader.get(collection, key, None)?.value,
            };
            if lengths_only {
                arena.push_length(value.as_ref().map(Bytes::len))?;
            } else {
                bytes += value.as_ref().map_or(0, |v| v.len() as u64);
                arena.push_value(value.as_deref())?;
            }
        }
        self.inner.stats.record_reads(n as u64, bytes);
        Ok(lengths_only)
    }

    fn scan_batch(
        &self,
        mut txn: Option<&mut Transaction>,
        request: &ScanRequest<'_>,
        options: Options,
        arena: &mut Arena,
    ) -> CoreResult<bool> {
        let options = self.prepare(txn.as_deref(), options)?;
        let n = request.count;
        request.collections.check(n, "collections")?;
        check_keys(&request.min_keys, n)?;
        request.limits.check(n, "limits")?;
        arena.begin(&self.inner)?;

        let with_lengths = options.contains(Options::READ_LENGTHS);
        let track = options.contains(Options::TRACK_READS);
        let reader = self.inner.store.reader()?;
        let mut found: Vec<(Key, usize)> = Vec::new();
        for i in 0..n {
            let collection = request.collections.get(i);
            let min_key = request.min_keys.get(i);
            let limit = request.limits.get(i) as usize;
            match txn.as_deref_mut() {
                Some(txn) => found = txn.scan(&reader, collection, min_key, limit, track)?,
                None => {
                    found.clear();
                    reader.scan(collection, min_key, limit, None, &mut |k, len| {
                        found.push((k, len));
                    })?;
                }
            }
            arena.push_scan(&found, with_lengths)?;
        }
        self.inner.stats.record_scans(n as u64);
        Ok(with_lengths)
    }

    fn size_batch(
        &self,
        txn: Option<&Transaction>,
        request: &SizeRequest<'_>,
        options: Options,
        arena: &mut Arena,
    ) -> CoreResult<()> {
        self.prepare(txn, options)?;
        let n = request.count;
        request.collections.check(n, "collections")?;
        request.min_keys.check(n, "min keys")?;
        request.max_keys.check(n, "max keys")?;
        arena.begin(&self.inner)?;

        let reader = self.inner.store.reader()?;
        for i in 0..n {
            let collection = request.collections.get(i);
            let (min_key, max_key) = (request.min_keys.get(i), request.max_keys.get(i));
            let estimate = match txn {
                Some(txn) => txn.estimate(&reader, collection, min_key, max_key)?,
                None => reader.estimate(collection, min_key, max_key, None)?,
            };
            arena.push_estimate(estimate.to_array());
        }
        self.inner.stats.record_estimates(n as u64);
        Ok(())
    }
}
