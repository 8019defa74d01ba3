//! CLI command implementations.

pub mod admin;
pub mod kv;
pub mod range;

use clap::ValueEnum;
use std::path::Path;
use stridekv_core::{CollectionId, Config, CoreError, CoreResult, Database};
use tracing::debug;

/// Result type of every command.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable lines.
    Text,
    /// One JSON document.
    Json,
}

/// Opens the database described by the global options.
///
/// An explicit JSON configuration wins; otherwise a path selects a
/// journaled store, created if missing.
pub fn open(config: Option<&str>, path: Option<&Path>) -> CoreResult<Database> {
    let config = match (config, path) {
        (Some(text), _) => Config::parse(text)?,
        (None, Some(path)) => Config::journal(path),
        (None, None) => Config::default(),
    };
    debug!(backend = %config.backend, "opening database");
    Database::open_with_config(config)
}

/// The collection a command works on.
pub struct Target<'a> {
    /// Open database.
    pub db: &'a Database,
    name: &'a str,
}

impl<'a> Target<'a> {
    /// Targets `name`; the empty name is the default collection.
    pub fn new(db: &'a Database, name: &'a str) -> Self {
        Self { db, name }
    }

    /// Resolves the collection for writing, creating it if needed.
    pub fn for_write(&self) -> CoreResult<CollectionId> {
        self.db.collection(self.name)
    }

    /// Resolves an existing collection for reading.
    pub fn for_read(&self) -> CoreResult<CollectionId> {
        self.db
            .find_collection(self.name)?
            .ok_or_else(|| CoreError::collection_not_found(self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stridekv_core::{BackendKind, ErrorKind, StoreKind};

    #[test]
    fn open_defaults_to_memory() {
        let db = open(None, None).unwrap();
        assert_eq!(db.backend(), StoreKind::Memory);
    }

    #[test]
    fn path_selects_journal() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(None, Some(&dir.path().join("db"))).unwrap();
        assert_eq!(db.config().backend, BackendKind::Journal);
    }

    #[test]
    fn config_wins_over_path() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(Some(r#"{"backend": "memory"}"#), Some(dir.path())).unwrap();
        assert_eq!(db.backend(), StoreKind::Memory);
    }

    #[test]
    fn reads_need_existing_collection() {
        let db = open(None, None).unwrap();
        let target = Target::new(&db, "users");
        assert_eq!(target.for_read().unwrap_err().kind(), ErrorKind::NotFound);
        let id = target.for_write().unwrap();
        assert_eq!(target.for_read().unwrap(), id);
    }
}
