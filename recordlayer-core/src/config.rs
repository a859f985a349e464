//! Store configuration.
//!
//! [`StoreConfig`] names the database every repository writes to and the default time limit
//! applied to find queries. It is immutable once a store is built and can be loaded from
//! JSON:
//!
//! ```ignore
//! let config = StoreConfig::from_json(r#"{ "database": "testdb", "find_timeout_ms": 5000 }"#)?;
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Find timeout used when none is configured.
pub const DEFAULT_FIND_TIMEOUT_MS: u64 = 20_000;

fn default_find_timeout_ms() -> u64 {
    DEFAULT_FIND_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database holding every collection of the store.
    pub database: String,
    /// Default query time limit in milliseconds.
    #[serde(default = "default_find_timeout_ms")]
    pub find_timeout_ms: u64,
}

impl StoreConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            find_timeout_ms: DEFAULT_FIND_TIMEOUT_MS,
        }
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json(json: &str) -> DocumentStoreResult<Self> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_find_timeout(mut self, timeout: Duration) -> Self {
        self.find_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn find_timeout(&self) -> Duration {
        Duration::from_millis(self.find_timeout_ms)
    }

    /// Fails with [`DocumentStoreError::Configuration`] for an unusable configuration.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.database.trim().is_empty() {
            return Err(DocumentStoreError::Configuration(
                "database must be set to a non-empty name".into(),
            ));
        }

        Ok(())
    }
}
