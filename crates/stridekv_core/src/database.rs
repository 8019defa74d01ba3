//! Database facade.

use crate::arena::Arena;
use crate::config::{BackendKind, Config};
use crate::error::{CoreError, CoreResult};
use crate::stats::{DatabaseStats, StatsSnapshot};
use crate::transaction::{Transaction, TransactionManager};
use crate::types::{Options, Version};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stridekv_storage::{JournalOptions, JournaledStore, MemoryStore, Store, StoreKind};
use tracing::{debug, warn};

/// State shared by every handle, transaction and arena of one database.
pub(crate) struct Shared {
    pub(crate) store: Box<dyn Store>,
    pub(crate) stats: DatabaseStats,
    pub(crate) txns: TransactionManager,
    pub(crate) config: Config,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn check_open(&self) -> CoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CoreError::DatabaseClosed)
        } else {
            Ok(())
        }
    }

    /// Counts failed calls.
    pub(crate) fn tally<T>(&self, result: CoreResult<T>) -> CoreResult<T> {
        if result.is_err() {
            self.stats.record_error();
        }
        result
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            if let Err(e) = self.store.flush() {
                warn!(error = %e, "flush on drop failed");
            }
        }
    }
}

/// The main database handle.
///
/// `Database` owns one store and serves batched reads, writes, scans and
/// size estimates over it, either directly at the head or through a
/// [`Transaction`]. Handles are cheap to clone and can be shared across
/// threads; the resources are released when the last handle, transaction
/// and arena referencing them is gone.
///
/// # Opening a Database
///
/// ```rust
/// use stridekv_core::{Database, Options, ReadRequest, WriteRequest};
///
/// let db = Database::open("").unwrap();
/// let keys = [1, 2];
/// let values: [&[u8]; 2] = [b"one", b"two"];
/// db.write(None, &WriteRequest::puts(&keys, &values), Options::NONE).unwrap();
///
/// let mut arena = db.new_arena();
/// let out = db.read(None, &ReadRequest::from_keys(&keys), Options::NONE, &mut arena).unwrap();
/// assert_eq!(out.value(1), Some(&b"two"[..]));
/// ```
///
/// A persistent database is opened from a JSON configuration:
///
/// ```rust,ignore
/// let db = Database::open(r#"{"backend": "journal", "path": "/var/lib/skv"}"#)?;
/// ```
#[derive(Clone)]
pub struct Database {
    pub(crate) inner: Arc<Shared>,
}

impl Database {
    /// Opens a database from a JSON configuration string.
    ///
    /// An empty string opens an in-memory database with default settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a malformed configuration, or a
    /// storage error if the backend cannot be opened.
    pub fn open(config: &str) -> CoreResult<Self> {
        Self::open_with_config(Config::parse(config)?)
    }

    /// Opens a database with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the configuration is inconsistent, or
    /// a storage error (`Locked`, `Corrupted`, I/O) from the backend.
    pub fn open_with_config(config: Config) -> CoreResult<Self> {
        config.validate()?;
        let store: Box<dyn Store> = match config.backend {
            BackendKind::Memory => Box::new(MemoryStore::new()),
            BackendKind::Journal => {
                let path = config
                    .path
                    .as_deref()
                    .ok_or_else(|| CoreError::invalid_argument("journal backend requires a path"))?;
                let options = JournalOptions {
                    sync_on_commit: config.sync_on_commit,
                    create_if_missing: config.create_if_missing,
                };
                Box::new(JournaledStore::open(path, &options)?)
            }
        };
        debug!(backend = %config.backend, version = %store.current_version(), "database opened");
        Ok(Self {
            inner: Arc::new(Shared {
                store,
                stats: DatabaseStats::new(),
                txns: TransactionManager::new(),
                config,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Opens an in-memory database.
    ///
    /// # Errors
    ///
    /// Never fails for the memory backend; the `Result` mirrors
    /// [`Database::open`].
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_config(Config::default())
    }

    /// Flushes the store and closes the database for every handle.
    ///
    /// Later calls through any handle, transaction or arena of this
    /// database fail with `DatabaseClosed`. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the final flush fails; the database is
    /// closed regardless.
    pub fn close(&self) -> CoreResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("database closed");
        self.inner.store.flush().map_err(CoreError::from)
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.check_open().is_ok()
    }

    /// Returns database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Backend serving this database.
    #[must_use]
    pub fn backend(&self) -> StoreKind {
        self.inner.store.kind()
    }

    /// Current store version.
    #[must_use]
    pub fn current_version(&self) -> Version {
        self.inner.store.current_version()
    }

    /// Counters since open.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Creates an arena sized by the configured initial capacity.
    #[must_use]
    pub fn new_arena(&self) -> Arena {
        Arena::with_capacity(self.inner.config.arena_initial_capacity)
    }

    /// Begins a transaction.
    ///
    /// `generation == 0` assigns a fresh generation. With
    /// [`Options::SNAPSHOT`] the current version is pinned and every read
    /// of the transaction observes it.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseClosed` after [`close`](Self::close) and
    /// `InvalidArgument` for unknown option bits.
    pub fn begin(&self, generation: u64, options: Options) -> CoreResult<Transaction> {
        let result = self
            .check_open()
            .and_then(|()| options.check())
            .and_then(|options| self.inner.txns.begin(&self.inner, generation, options));
        self.inner.tally(result)
    }

    /// Returns true if `txn` was begun on this database.
    #[must_use]
    pub fn owns(&self, txn: &Transaction) -> bool {
        txn.belongs_to(&self.inner).is_ok()
    }

    /// Runs `f` in a transaction and commits it if `f` succeeds.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or of the commit (including `Conflict`).
    pub fn transaction<F, T>(&self, options: Options, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction) -> CoreResult<T>,
    {
        let mut txn = self.begin(0, options)?;
        let value = f(&mut txn)?;
        txn.commit(options)?;
        Ok(value)
    }

    pub(crate) fn check_open(&self) -> CoreResult<()> {
        self.inner.check_open()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.inner.store.kind())
            .field("version", &self.inner.store.current_version())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transaction::TransactionState;

    fn create_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn open_in_memory() {
        let db = create_db();
        assert!(db.is_open());
        assert_eq!(db.backend(), StoreKind::Memory);
        assert_eq!(db.current_version(), Version::ZERO);
    }

    #[test]
    fn open_rejects_bad_config() {
        let err = Database::open("{\"backend\": 3}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn open_journal_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = serde_json::json!({
            "backend": "journal",
            "path": dir.path(),
        })
        .to_string();
        let db = Database::open(&config).unwrap();
        assert_eq!(db.backend(), StoreKind::Journal);
    }

    #[test]
    fn closed_database_rejects_calls() {
        let db = create_db();
        let clone = db.clone();
        db.close().unwrap();
        db.close().unwrap();
        assert!(!clone.is_open());
        let err = clone.begin(0, Options::NONE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
    }

    #[test]
    fn begin_assigns_generations() {
        let db = create_db();
        let a = db.begin(0, Options::NONE).unwrap();
        let b = db.begin(0, Options::NONE).unwrap();
        let c = db.begin(77, Options::NONE).unwrap();
        assert_ne!(a.generation(), b.generation());
        assert_eq!(c.generation(), 77);
        assert_eq!(db.stats().transactions_started, 3);
    }

    #[test]
    fn failed_calls_are_counted() {
        let db = create_db();
        db.close().unwrap();
        assert!(db.begin(0, Options::NONE).is_err());
        assert_eq!(db.stats().errors, 1);
    }

    #[test]
    fn transaction_helper_commits() {
        let db = create_db();
        let generation = db
            .transaction(Options::NONE, |txn| {
                assert!(txn.is_active());
                Ok(txn.generation())
            })
            .unwrap();
        assert!(generation > 0);
        assert_eq!(db.stats().transactions_committed, 1);
    }

    #[test]
    fn snapshot_is_released_on_drop() {
        let db = create_db();
        let txn = db.begin(0, Options::SNAPSHOT).unwrap();
        assert_eq!(txn.snapshot(), Some(Version::ZERO));
        assert_eq!(db.inner.store.usage().unwrap().pinned_snapshots, 1);
        drop(txn);
        assert_eq!(db.inner.store.usage().unwrap().pinned_snapshots, 0);
    }

    #[test]
    fn transaction_outliving_database_is_closed() {
        let db = create_db();
        let mut txn = db.begin(0, Options::SNAPSHOT).unwrap();
        drop(db);
        let err = txn.commit(Options::NONE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Closed);
        assert_eq!(txn.state(), TransactionState::Active);
    }

    #[test]
    fn reset_reuses_transaction() {
        let db = create_db();
        let mut txn = db.begin(0, Options::SNAPSHOT).unwrap();
        txn.commit(Options::NONE).unwrap();
        assert_eq!(txn.state(), TransactionState::Committed);
        let err = txn.commit(Options::NONE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);

        txn.reset(0, Options::NONE).unwrap();
        assert!(txn.is_active());
        assert_eq!(txn.snapshot(), None);
        assert_eq!(db.inner.store.usage().unwrap().pinned_snapshots, 0);
        assert_eq!(db.stats().transactions_reset, 1);
    }

    #[test]
    fn owns_only_its_transactions() {
        let a = create_db();
        let b = create_db();
        let txn = a.begin(0, Options::NONE).unwrap();
        assert!(a.owns(&txn));
        assert!(a.clone().owns(&txn));
        assert!(!b.owns(&txn));
    }
}
