//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases
//! and common test scenarios.

use std::path::{Path, PathBuf};
use stridekv_core::{Config, Database};
use tempfile::TempDir;

/// A test database with automatic cleanup.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
    /// The temporary directory (kept alive to prevent cleanup).
    dir: Option<TempDir>,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self {
            db: Database::open_in_memory().expect("Failed to open in-memory database"),
            dir: None,
        }
    }

    /// Creates a new journaled test database in a temporary directory.
    pub fn journal() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_with_config(Config::journal(dir.path().join("db")))
            .expect("Failed to open journaled database");
        Self { db, dir: Some(dir) }
    }

    /// Returns the journal directory, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.path().join("db"))
    }

    /// Closes the database and opens it again from the same configuration.
    ///
    /// The previous handle is dropped first so the journal lock is free.
    /// An in-memory database comes back empty.
    pub fn reopen(self) -> Self {
        let Self { db, dir } = self;
        let config = db.config().clone();
        db.close().expect("Failed to close database");
        drop(db);
        let db = Database::open_with_config(config).expect("Failed to reopen database");
        Self { db, dir }
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory database.
///
/// # Example
///
/// ```rust
/// use stridekv_testkit::{put_all, read_values, with_temp_db};
/// use stridekv_core::DEFAULT_COLLECTION;
///
/// with_temp_db(|db| {
///     put_all(db, DEFAULT_COLLECTION, &[(1, b"one")]);
///     assert_eq!(read_values(db, DEFAULT_COLLECTION, &[1]), vec![Some(b"one".to_vec())]);
/// });
/// ```
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary journaled database.
pub fn with_journal_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database, &Path) -> R,
{
    let test_db = TestDatabase::journal();
    let path = test_db.path().expect("Journaled database should have a path");
    f(&test_db.db, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::TestDatabase;
    use crate::ops::put_all;
    use stridekv_core::{CollectionId, Key, DEFAULT_COLLECTION};

    /// Value stored under `key` by the populated scenarios.
    pub fn value_for(key: Key) -> Vec<u8> {
        format!("value-{key}").into_bytes()
    }

    /// Creates a database whose default collection holds keys `0..count`.
    pub fn populated_database(count: usize) -> TestDatabase {
        let test_db = TestDatabase::memory();
        let keys: Vec<Key> = (0..count as Key).collect();
        let values: Vec<Vec<u8>> = keys.iter().map(|&k| value_for(k)).collect();
        let pairs: Vec<(Key, &[u8])> = keys
            .iter()
            .zip(&values)
            .map(|(&k, v)| (k, v.as_slice()))
            .collect();
        put_all(&test_db, DEFAULT_COLLECTION, &pairs);
        test_db
    }

    /// Creates a database with `count` named collections, each holding key `0`.
    pub fn multi_collection_database(count: usize) -> (TestDatabase, Vec<CollectionId>) {
        let test_db = TestDatabase::memory();
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let id = test_db
                .collection(&format!("collection_{i}"))
                .expect("Failed to create collection");
            put_all(&test_db, id, &[(0, format!("in {i}").as_bytes())]);
            ids.push(id);
        }
        (test_db, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{put_all, read_values, scan_keys};
    use stridekv_core::{Key, StoreKind, DEFAULT_COLLECTION};

    #[test]
    fn test_memory_database() {
        let db = TestDatabase::memory();
        assert_eq!(db.backend(), StoreKind::Memory);
        assert!(db.path().is_none());
    }

    #[test]
    fn test_journal_reopen_keeps_data() {
        let db = TestDatabase::journal();
        assert_eq!(db.backend(), StoreKind::Journal);
        put_all(&db, DEFAULT_COLLECTION, &[(7, b"seven")]);

        let db = db.reopen();
        assert_eq!(
            read_values(&db, DEFAULT_COLLECTION, &[7]),
            vec![Some(b"seven".to_vec())]
        );
    }

    #[test]
    fn test_with_temp_db() {
        let count = with_temp_db(|db| {
            put_all(db, DEFAULT_COLLECTION, &[(1, b"a"), (2, b"b")]);
            scan_keys(db, DEFAULT_COLLECTION, Key::MIN, 10).len()
        });
        assert_eq!(count, 2);
    }

    #[test]
    fn test_populated_scenario() {
        let db = scenarios::populated_database(10);
        assert_eq!(scan_keys(&db, DEFAULT_COLLECTION, Key::MIN, 100).len(), 10);
        assert_eq!(
            read_values(&db, DEFAULT_COLLECTION, &[3]),
            vec![Some(scenarios::value_for(3))]
        );
    }

    #[test]
    fn test_multi_collection_scenario() {
        let (db, ids) = scenarios::multi_collection_database(3);
        assert_eq!(db.collections().unwrap().len(), 3);
        assert_eq!(
            read_values(&db, ids[2], &[0]),
            vec![Some(b"in 2".to_vec())]
        );
        assert!(read_values(&db, DEFAULT_COLLECTION, &[0])[0].is_none());
    }
}
