//! Storage backend abstraction consumed by the mapping core.
//!
//! The [`PersistenceGateway`] trait is the only seam between record mapping and a concrete
//! document store. It exposes the four primitives the core needs (upsert, remove, find,
//! count) plus index management passthroughs. Every call is scoped to a [`Namespace`]:
//! the configured database and the collection resolved for a record type.
//!
//! Documents cross the seam as [`bson::Document`]s holding the attribute values and, once
//! assigned, the identity under [`IDENTITY_KEY`](crate::schema::IDENTITY_KEY).
//!
//! # Examples
//!
//! ```ignore
//! use recordlayer::gateway::{Namespace, PersistenceGateway, UpsertOptions};
//! use bson::doc;
//!
//! let ns = Namespace::new("testdb", "users");
//! let id = gateway
//!     .upsert(&ns, doc! { "email": "a@b.com" }, &UpsertOptions::default())
//!     .await?;
//! gateway.remove(&ns, id).await?;
//! ```

use async_trait::async_trait;
use bson::{Document, Uuid};
use futures::stream::BoxStream;
use std::{fmt, fmt::Debug, time::Duration};

use crate::{
    error::DocumentStoreResult,
    query::{Expr, Query, SortDirection},
};

/// A lazily produced sequence of stored documents.
///
/// Implementations must yield documents one at a time rather than buffering the whole
/// result set where the backend allows it.
pub type DocumentStream = BoxStream<'static, DocumentStoreResult<Document>>;

/// Database and collection a gateway call applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Write options forwarded with an upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOptions {
    /// Wait for the write to reach the journal before acknowledging.
    pub journal: Option<bool>,
    /// Upper bound on waiting for write acknowledgement.
    pub w_timeout: Option<Duration>,
}

/// Ordered key specification of an index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexKeys {
    keys: Vec<(String, SortDirection)>,
}

impl IndexKeys {
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Single-field ascending index.
    pub fn ascending(field: impl Into<String>) -> Self {
        Self::new().key(field, SortDirection::Asc)
    }

    pub fn key(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SortDirection)> {
        self.keys
            .iter()
            .map(|(field, direction)| (field.as_str(), *direction))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// The conventional index name, e.g. `email_1_created_-1`.
    pub fn index_name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, direction)| format!("{field}_{}", direction.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Options forwarded with an index creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub unique: bool,
    pub sparse: bool,
    /// Overrides [`IndexKeys::index_name`].
    pub name: Option<String>,
}

/// Abstract interface of a document storage backend.
///
/// # Semantics
///
/// - [`upsert`](PersistenceGateway::upsert) assigns an identity to a document without one and
///   replaces the stored document wholesale when the identity already exists.
/// - [`remove`](PersistenceGateway::remove) acknowledges absent identities.
/// - [`find`](PersistenceGateway::find) applies the query's sort, offset, limit and timeout.
///
/// Errors are reported as [`DocumentStoreError`](crate::error::DocumentStoreError) and are
/// passed to callers unchanged; the core never retries.
#[async_trait]
pub trait PersistenceGateway: Send + Sync + Debug {
    /// Inserts or replaces a document and returns its identity.
    async fn upsert(
        &self,
        namespace: &Namespace,
        document: Document,
        options: &UpsertOptions,
    ) -> DocumentStoreResult<Uuid>;

    /// Removes the document with the given identity.
    async fn remove(&self, namespace: &Namespace, id: Uuid) -> DocumentStoreResult<()>;

    /// Executes a query and returns a forward-only stream of matching documents.
    async fn find(&self, namespace: &Namespace, query: Query) -> DocumentStoreResult<DocumentStream>;

    /// Counts the documents matching `filter` (all documents for `None`).
    async fn count(&self, namespace: &Namespace, filter: Option<Expr>) -> DocumentStoreResult<u64>;

    /// Creates an index if it does not exist yet.
    async fn ensure_index(
        &self,
        namespace: &Namespace,
        keys: IndexKeys,
        options: IndexOptions,
    ) -> DocumentStoreResult<()>;

    /// Drops the index built on `keys`.
    async fn drop_index(&self, namespace: &Namespace, keys: IndexKeys) -> DocumentStoreResult<()>;

    /// Releases connections and other resources. The default is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<G> PersistenceGateway for &G
where
    G: PersistenceGateway,
{
    async fn upsert(
        &self,
        namespace: &Namespace,
        document: Document,
        options: &UpsertOptions,
    ) -> DocumentStoreResult<Uuid> {
        (*self).upsert(namespace, document, options).await
    }

    async fn remove(&self, namespace: &Namespace, id: Uuid) -> DocumentStoreResult<()> {
        (*self).remove(namespace, id).await
    }

    async fn find(&self, namespace: &Namespace, query: Query) -> DocumentStoreResult<DocumentStream> {
        (*self).find(namespace, query).await
    }

    async fn count(&self, namespace: &Namespace, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        (*self).count(namespace, filter).await
    }

    async fn ensure_index(
        &self,
        namespace: &Namespace,
        keys: IndexKeys,
        options: IndexOptions,
    ) -> DocumentStoreResult<()> {
        (*self).ensure_index(namespace, keys, options).await
    }

    async fn drop_index(&self, namespace: &Namespace, keys: IndexKeys) -> DocumentStoreResult<()> {
        (*self).drop_index(namespace, keys).await
    }
}

/// Factory for gateway instances that need asynchronous setup (connections, pools).
#[async_trait]
pub trait GatewayBuilder {
    type Gateway: PersistenceGateway;

    async fn build(self) -> DocumentStoreResult<Self::Gateway>;
}
