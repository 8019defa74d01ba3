//! Database configuration.
//!
//! A configuration is either built in code or parsed from the JSON string
//! accepted by [`Database::open`](crate::Database::open):
//!
//! ```json
//! {"backend": "journal", "path": "/var/lib/skv", "sync_on_commit": true}
//! ```

use crate::error::{CoreError, CoreResult};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Default initial tape capacity for arenas created by the database.
pub const DEFAULT_ARENA_CAPACITY: usize = 4096;

/// Storage backend selected at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Volatile, process-local.
    #[default]
    Memory,
    /// Persisted through an append-only journal in `path`.
    Journal,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Journal => "journal",
        })
    }
}

/// Configuration for opening a database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Which backend stores the data.
    pub backend: BackendKind,

    /// Directory of the journal. Required for the journal backend.
    pub path: Option<PathBuf>,

    /// Whether to sync the journal on every commit.
    pub sync_on_commit: bool,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Initial tape capacity of arenas from [`Database::new_arena`](crate::Database::new_arena).
    pub arena_initial_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            path: None,
            sync_on_commit: false,
            create_if_missing: true,
            arena_initial_capacity: DEFAULT_ARENA_CAPACITY,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration of a journaled database in `path`.
    #[must_use]
    pub fn journal(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Journal,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parses a JSON configuration. An empty or blank string yields the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed JSON, unknown keys, or a
    /// journal backend without a path.
    pub fn parse(text: &str) -> CoreResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_str(text)
            .map_err(|e| CoreError::invalid_argument(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the settings are consistent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the journal backend has no path.
    pub fn validate(&self) -> CoreResult<()> {
        if self.backend == BackendKind::Journal && self.path.is_none() {
            return Err(CoreError::invalid_argument(
                "config: journal backend requires a path",
            ));
        }
        Ok(())
    }

    /// Sets the backend.
    #[must_use]
    pub const fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the journal directory.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets whether to sync the journal on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets whether to create the directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the initial arena tape capacity.
    #[must_use]
    pub const fn arena_initial_capacity(mut self, bytes: usize) -> Self {
        self.arena_initial_capacity = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::Memory);
        assert!(config.path.is_none());
        assert!(config.create_if_missing);
        assert!(!config.sync_on_commit);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .backend(BackendKind::Journal)
            .path("/tmp/db")
            .sync_on_commit(true)
            .arena_initial_capacity(128);

        assert_eq!(config.backend, BackendKind::Journal);
        assert_eq!(config.path, Some(PathBuf::from("/tmp/db")));
        assert!(config.sync_on_commit);
        assert_eq!(config.arena_initial_capacity, 128);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_string_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
        assert_eq!(Config::parse("  ").unwrap(), Config::default());
    }

    #[test]
    fn parse_json() {
        let config =
            Config::parse(r#"{"backend": "journal", "path": "/data", "sync_on_commit": true}"#)
                .unwrap();
        assert_eq!(config, Config::journal("/data").sync_on_commit(true));
    }

    #[test]
    fn rejects_bad_input() {
        for text in [
            "{",
            r#"{"backend": "remote"}"#,
            r#"{"colour": "blue"}"#,
            r#"{"backend": "journal"}"#,
        ] {
            let err = Config::parse(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{text}");
        }
    }
}
