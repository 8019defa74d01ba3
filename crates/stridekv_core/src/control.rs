//! Administrative commands.
//!
//! | command   | effect                                               |
//! |-----------|------------------------------------------------------|
//! | `clear`   | removes every entry, keeps collection names          |
//! | `reset`   | removes every entry and every named collection       |
//! | `compact` | drops history no snapshot can see, rewrites journals |
//! | `info`    | build and backend metadata                           |
//! | `usage`   | per-collection sizes and statistics                  |
//!
//! Responses are JSON objects; their fields are informational and not a
//! stable interface.

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// A parsed administrative command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Remove all entries, keep names.
    Clear,
    /// Remove all entries and names.
    Reset,
    /// Compact history.
    Compact,
    /// Software and backend metadata.
    Info,
    /// Size and activity report.
    Usage,
}

impl Command {
    /// Lowercase command name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Reset => "reset",
            Self::Compact => "compact",
            Self::Info => "info",
            Self::Usage => "usage",
        }
    }
}

impl FromStr for Command {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" => Ok(Self::Clear),
            "reset" => Ok(Self::Reset),
            "compact" => Ok(Self::Compact),
            "info" => Ok(Self::Info),
            "usage" => Ok(Self::Usage),
            other => Err(CoreError::invalid_argument(format!(
                "unknown control command '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Database {
    /// Runs a textual administrative command and returns its JSON response.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unknown commands, or the storage error
    /// of the command.
    pub fn control(&self, request: &str) -> CoreResult<String> {
        let result = self
            .check_open()
            .and_then(|()| request.parse::<Command>())
            .and_then(|command| self.execute(command))
            .map(|value| value.to_string());
        self.inner.tally(result)
    }

    /// Runs a parsed command.
    ///
    /// # Errors
    ///
    /// Returns the storage error of the command.
    pub fn execute(&self, command: Command) -> CoreResult<Value> {
        self.check_open()?;
        let store = &self.inner.store;
        let response = match command {
            Command::Clear => json!({ "version": store.clear_all()?.as_u64() }),
            Command::Reset => json!({ "version": store.reset()?.as_u64() }),
            Command::Compact => {
                let stats = store.compact()?;
                json!({
                    "versions_removed": stats.versions_removed,
                    "keys_removed": stats.keys_removed,
                    "disk_bytes": stats.disk_bytes,
                })
            }
            Command::Info => json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "backend": store.kind().as_str(),
                "store_version": store.current_version().as_u64(),
            }),
            Command::Usage => {
                let usage = store.usage()?;
                let collections: Vec<Value> = usage
                    .collections
                    .iter()
                    .map(|c| {
                        json!({
                            "id": c.id.as_u64(),
                            "name": c.name.as_deref().unwrap_or(""),
                            "entries": c.entries,
                            "value_bytes": c.value_bytes,
                            "versions": c.versions,
                        })
                    })
                    .collect();
                json!({
                    "store_version": usage.version.as_u64(),
                    "collections": collections,
                    "pinned_snapshots": usage.pinned_snapshots,
                    "disk_bytes": usage.disk_bytes,
                    "stats": self.inner.stats.snapshot(),
                })
            }
        };
        debug!(%command, "control command executed");
        Ok(response)
    }
}
