//! Ledger configuration.
//!
//! Values come from an optional JSON file; anything missing falls back to
//! the defaults below. Command-line flags are applied on top by the CLI.
//!
//! ```json
//! { "database": "tally.db", "max_connections": 5, "busy_timeout_ms": 5000,
//!   "allow_negative_balance": true }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::application::TransferPolicy;
use crate::storage::StoreOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite database file path
    pub database: String,
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout_ms: u64,
    /// Let transfers drive the source balance below zero
    pub allow_negative_balance: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database: "tally.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
            allow_negative_balance: true,
        }
    }
}

impl LedgerConfig {
    pub fn for_database(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.database)
    }

    pub fn store_options(&self, create_if_missing: bool) -> StoreOptions {
        StoreOptions::new(self.database_url())
            .create_if_missing(create_if_missing)
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }

    pub fn transfer_policy(&self) -> TransferPolicy {
        TransferPolicy {
            allow_negative_balance: self.allow_negative_balance,
        }
    }
}
