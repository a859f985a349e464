//! Typed repositories: the record lifecycle and finders for one record type.
//!
//! A [`Repository<M, G>`] is obtained from a [`RecordStore`](crate::store::RecordStore) and is
//! bound to the collection resolved for `M`. It drives the lifecycle transitions:
//!
//! ```text
//! new ──save()──▶ persisted ──destroy()──▶ destroyed
//!  │                 │ ▲
//!  │                 └─┘ save() (replace)
//!  └──destroy()──▶ no-op
//! ```
//!
//! Hooks run synchronously in a fixed order: `save()` runs `before_validation`, the
//! validators, `after_validation`, then `before_save`, the upsert and `after_save`.
//! `destroy()` always runs `before_destroy` first.

use bson::Uuid;
use std::{marker::PhantomData, time::Duration};
use tracing::{debug, warn};

use crate::{
    cursor::RecordCursor,
    error::{DocumentStoreError, DocumentStoreResult},
    gateway::{IndexKeys, IndexOptions, Namespace, PersistenceGateway, UpsertOptions},
    query::{Expr, Filter, Query},
    record::{LifecycleState, Record},
    schema::{Model, descriptor},
};

/// Result of [`Repository::destroy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// The stored document was removed and the record is now destroyed.
    Removed,
    /// Nothing was stored for the record, so no gateway call was made.
    NoOp,
}

#[derive(Debug)]
pub struct Repository<'a, M: Model, G: PersistenceGateway> {
    gateway: &'a G,
    namespace: Namespace,
    find_timeout: Duration,
    _marker: PhantomData<fn() -> M>,
}

impl<'a, M: Model, G: PersistenceGateway> Repository<'a, M, G> {
    pub(crate) fn new(gateway: &'a G, database: &str, find_timeout: Duration) -> Self {
        Self {
            gateway,
            namespace: Namespace::new(database, descriptor::<M>().collection_name()),
            find_timeout,
            _marker: PhantomData,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.namespace.collection
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn find_timeout(&self) -> Duration {
        self.find_timeout
    }

    /// Overrides the find timeout for queries issued through this repository.
    pub fn with_find_timeout(mut self, timeout: Duration) -> Self {
        self.find_timeout = timeout;
        self
    }

    /// Validates a record; see [`Record::validate`].
    pub fn validate(&self, record: &mut Record<M>) -> DocumentStoreResult<bool> {
        record.validate()
    }

    /// Validates and persists a record with default write options.
    pub async fn save(&self, record: &mut Record<M>) -> DocumentStoreResult<()> {
        self.save_with(record, &UpsertOptions::default()).await
    }

    /// Validates and persists a record.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::ValidationFailed`] if a validator rejected the record. Nothing
    ///   is written and `before_save` does not run.
    /// - [`DocumentStoreError::InvalidState`] if the record was destroyed.
    /// - Any gateway error, unchanged.
    pub async fn save_with(
        &self,
        record: &mut Record<M>,
        options: &UpsertOptions,
    ) -> DocumentStoreResult<()> {
        if record.is_destroyed() {
            return Err(DocumentStoreError::InvalidState(format!(
                "cannot save a destroyed {} record",
                M::type_name()
            )));
        }

        if !record.validate()? {
            let failures = record
                .errors()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>();

            debug!(
                target: "recordlayer::lifecycle",
                namespace = %self.namespace,
                failures = ?failures,
                "Save refused by validation"
            );

            return Err(DocumentStoreError::ValidationFailed(
                M::type_name().to_string(),
                failures,
            ));
        }

        record.model_mut().before_save();

        let document = record.to_document()?;
        let stored = self
            .gateway
            .upsert(&self.namespace, document, options)
            .await?;

        let identity = match record.identity() {
            Some(existing) if existing != stored => {
                warn!(
                    target: "recordlayer::lifecycle",
                    namespace = %self.namespace,
                    %existing,
                    %stored,
                    "Gateway echoed a different identity; keeping the assigned one"
                );
                existing
            }
            _ => stored,
        };

        record.mark_persisted(identity);
        record.model_mut().after_save();

        debug!(
            target: "recordlayer::lifecycle",
            namespace = %self.namespace,
            id = %identity,
            "Record saved"
        );

        Ok(())
    }

    /// Removes a record from storage.
    ///
    /// `before_destroy` always runs. A record that was never persisted (or is already
    /// destroyed) produces [`DestroyOutcome::NoOp`] without a gateway call.
    pub async fn destroy(&self, record: &mut Record<M>) -> DocumentStoreResult<DestroyOutcome> {
        record.model_mut().before_destroy();

        let id = match (record.state(), record.identity()) {
            (LifecycleState::Persisted, Some(id)) => id,
            (LifecycleState::Persisted, None) => {
                return Err(DocumentStoreError::InvalidState(format!(
                    "persisted {} record has no identity",
                    M::type_name()
                )));
            }
            (state, _) => {
                debug!(
                    target: "recordlayer::lifecycle",
                    namespace = %self.namespace,
                    ?state,
                    "Destroy skipped"
                );
                return Ok(DestroyOutcome::NoOp);
            }
        };

        self.gateway.remove(&self.namespace, id).await?;
        record.mark_destroyed();

        debug!(
            target: "recordlayer::lifecycle",
            namespace = %self.namespace,
            id = %id,
            "Record destroyed"
        );

        Ok(DestroyOutcome::Removed)
    }

    /// Returns a lazy cursor over the records matching `query`.
    ///
    /// Nothing is executed until the cursor is first advanced.
    pub fn find(&self, query: impl Into<Query>) -> RecordCursor<'a, M, G> {
        RecordCursor::new(self.gateway, self.namespace.clone(), self.prepare(query.into()))
    }

    /// Executes `query` and materializes every matching record.
    pub async fn find_all(&self, query: impl Into<Query>) -> DocumentStoreResult<Vec<Record<M>>> {
        self.find(query).collect_all().await
    }

    /// Returns the first matching record, or `None` when nothing matches.
    pub async fn find_one(&self, query: impl Into<Query>) -> DocumentStoreResult<Option<Record<M>>> {
        let mut query = query.into();
        query.limit = Some(1);

        self.find(query).first().await
    }

    /// Returns the record stored under `id`, or `None`.
    pub async fn find_by_id(&self, id: Uuid) -> DocumentStoreResult<Option<Record<M>>> {
        self.find_one(Filter::id(id)).await
    }

    /// Counts the stored records matching `filter` (all records for `None`).
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.gateway.count(&self.namespace, filter).await
    }

    pub async fn ensure_index(&self, keys: IndexKeys, options: IndexOptions) -> DocumentStoreResult<()> {
        self.gateway
            .ensure_index(&self.namespace, keys, options)
            .await
    }

    pub async fn drop_index(&self, keys: IndexKeys) -> DocumentStoreResult<()> {
        self.gateway.drop_index(&self.namespace, keys).await
    }

    fn prepare(&self, mut query: Query) -> Query {
        if query.timeout.is_none() {
            query.timeout = Some(self.find_timeout);
        }
        query
    }
}
