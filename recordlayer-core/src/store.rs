//! Main entry point: a configured store owning a persistence gateway.
//!
//! A [`RecordStore`] pairs one [`PersistenceGateway`] with an immutable [`StoreConfig`] and
//! hands out typed [`Repository`] handles. There is no process-wide connection: every
//! repository borrows the gateway of the store it came from.
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::store::RecordStore;
//! use recordlayer::memory::InMemoryStore;
//!
//! let store = RecordStore::builder()
//!     .gateway(InMemoryStore::new())
//!     .database("testdb")
//!     .build()?;
//!
//! let users = store.repository::<User>();
//! ```

use std::time::Duration;
use tracing::debug;

use crate::{
    config::StoreConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    gateway::PersistenceGateway,
    repository::Repository,
    schema::Model,
};

#[derive(Debug)]
pub struct RecordStore<G: PersistenceGateway> {
    gateway: G,
    config: StoreConfig,
}

impl<G: PersistenceGateway> RecordStore<G> {
    /// Creates a store from a gateway and a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Configuration`] if the configuration is invalid.
    pub fn new(gateway: G, config: StoreConfig) -> DocumentStoreResult<Self> {
        config.validate()?;

        debug!(
            target: "recordlayer::lifecycle",
            database = %config.database,
            find_timeout_ms = config.find_timeout_ms,
            "Record store initialized"
        );

        Ok(Self { gateway, config })
    }

    pub fn builder() -> RecordStoreBuilder<G> {
        RecordStoreBuilder::default()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Gets the repository for a record type, bound to its resolved collection.
    pub fn repository<M: Model>(&self) -> Repository<'_, M, G> {
        Repository::new(
            &self.gateway,
            &self.config.database,
            self.config.find_timeout(),
        )
    }

    /// Shuts the gateway down, consuming the store.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.gateway.shutdown().await
    }
}

/// Builder for [`RecordStore`].
///
/// Both a gateway and a database name are required; [`build`](Self::build) fails with
/// [`DocumentStoreError::Configuration`] when either is missing.
#[derive(Debug)]
pub struct RecordStoreBuilder<G: PersistenceGateway> {
    gateway: Option<G>,
    database: Option<String>,
    find_timeout: Option<Duration>,
}

impl<G: PersistenceGateway> Default for RecordStoreBuilder<G> {
    fn default() -> Self {
        Self {
            gateway: None,
            database: None,
            find_timeout: None,
        }
    }
}

impl<G: PersistenceGateway> RecordStoreBuilder<G> {
    pub fn gateway(mut self, gateway: G) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn find_timeout(mut self, timeout: Duration) -> Self {
        self.find_timeout = Some(timeout);
        self
    }

    /// Takes database and timeout from an existing configuration.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.find_timeout = Some(config.find_timeout());
        self.database = Some(config.database);
        self
    }

    pub fn build(self) -> DocumentStoreResult<RecordStore<G>> {
        let gateway = self.gateway.ok_or_else(|| {
            DocumentStoreError::Configuration(
                "a persistence gateway must be provided before use".into(),
            )
        })?;
        let database = self.database.ok_or_else(|| {
            DocumentStoreError::Configuration("a database name must be provided".into())
        })?;

        let mut config = StoreConfig::new(database);
        if let Some(timeout) = self.find_timeout {
            config = config.with_find_timeout(timeout);
        }

        RecordStore::new(gateway, config)
    }
}
