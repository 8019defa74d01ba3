//! Transaction manager.

use crate::database::Shared;
use crate::error::CoreResult;
use crate::transaction::state::{Conflict, Transaction};
use crate::types::{Options, Version};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use stridekv_storage::CommitOutcome;
use tracing::{debug, trace};

/// Assigns generations and runs the optimistic commit protocol.
///
/// Commits hand the staged write set and tracked read set to the store,
/// which validates and applies them under its write lock. The manager
/// itself holds no locks.
#[derive(Debug)]
pub struct TransactionManager {
    next_generation: AtomicU64,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    /// Creates a manager whose first generation is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_generation: AtomicU64::new(1),
        }
    }

    /// Picks `requested`, or a fresh generation when it is zero.
    pub fn generation(&self, requested: u64) -> u64 {
        match requested {
            0 => self.next_generation.fetch_add(1, Ordering::Relaxed),
            n => n,
        }
    }

    pub(crate) fn begin(
        &self,
        db: &Arc<Shared>,
        generation: u64,
        options: Options,
    ) -> CoreResult<Transaction> {
        let snapshot = self.pin_if(db, options)?;
        let generation = self.generation(generation);
        db.stats.record_transaction_start();
        trace!(generation, ?snapshot, "transaction begun");
        Ok(Transaction::new(Arc::downgrade(db), generation, snapshot))
    }

    pub(crate) fn reset(
        &self,
        db: &Arc<Shared>,
        txn: &mut Transaction,
        generation: u64,
        options: Options,
    ) -> CoreResult<()> {
        let snapshot = self.pin_if(db, options)?;
        let generation = self.generation(generation);
        if let Some(previous) = txn.restart(generation, snapshot) {
            db.store.unpin(previous);
        }
        db.stats.record_transaction_reset();
        trace!(generation, ?snapshot, "transaction reset");
        Ok(())
    }

    pub(crate) fn commit(
        &self,
        db: &Arc<Shared>,
        txn: &mut Transaction,
        flush: bool,
    ) -> CoreResult<Version> {
        txn.ensure_active()?;
        let (batch, stamps) = txn.commit_set();
        match db.store.commit(&batch, &stamps, flush)? {
            CommitOutcome::Applied(version) => {
                txn.mark_committed(version);
                db.stats.record_transaction_commit();
                trace!(generation = txn.generation(), %version, writes = batch.len(), "transaction committed");
                Ok(version)
            }
            CommitOutcome::Conflict { stamp, current } => {
                let conflict = Conflict {
                    collection: stamp.collection,
                    key: stamp.key,
                    observed: stamp.version,
                    current,
                };
                txn.mark_aborted(conflict);
                db.stats.record_transaction_conflict();
                debug!(
                    generation = txn.generation(),
                    collection = %stamp.collection,
                    key = stamp.key,
                    "transaction conflict"
                );
                Err(conflict.into())
            }
        }
    }

    fn pin_if(&self, db: &Shared, options: Options) -> CoreResult<Option<Version>> {
        if options.contains(Options::SNAPSHOT) {
            Ok(Some(db.store.pin()?))
        } else {
            Ok(None)
        }
    }
}
