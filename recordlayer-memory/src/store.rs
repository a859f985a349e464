//! In-memory persistence gateway.
//!
//! Documents are kept per [`Namespace`] in insertion order behind an async-aware read-write
//! lock. Queries scan the collection, so this gateway suits tests, development and small
//! data sets.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use bson::{Bson, Document, Uuid, de::deserialize_from_bson};
use futures::StreamExt;
use mea::rwlock::RwLock;
use tracing::{debug, trace};

use recordlayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    gateway::{
        DocumentStream, GatewayBuilder, IndexKeys, IndexOptions, Namespace, PersistenceGateway,
        UpsertOptions,
    },
    query::{Expr, Query},
    schema::IDENTITY_KEY,
};

use crate::evaluator::{compare_documents, matches_filter};

#[derive(Debug, Clone)]
struct IndexSpec {
    name: String,
    keys: IndexKeys,
    unique: bool,
    sparse: bool,
}

impl IndexSpec {
    /// The values a document contributes to this index, or `None` when a sparse index skips it.
    fn entry(&self, document: &Document) -> Option<Vec<Bson>> {
        let values = self
            .keys
            .iter()
            .map(|(field, _)| document.get(field).cloned())
            .collect::<Vec<_>>();

        if self.sparse && values.iter().all(Option::is_none) {
            return None;
        }

        Some(
            values
                .into_iter()
                .map(|value| value.unwrap_or(Bson::Null))
                .collect(),
        )
    }
}

#[derive(Debug, Default)]
struct CollectionState {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl CollectionState {
    fn position(&self, id: &Bson) -> Option<usize> {
        self.documents
            .iter()
            .position(|document| document.get(IDENTITY_KEY) == Some(id))
    }

    /// Fails if `candidate` collides with another document on a unique index.
    fn check_unique(&self, namespace: &Namespace, candidate: &Document) -> DocumentStoreResult<()> {
        let candidate_id = candidate.get(IDENTITY_KEY);

        for index in self.indexes.iter().filter(|index| index.unique) {
            let Some(entry) = index.entry(candidate) else {
                continue;
            };

            let collides = self
                .documents
                .iter()
                .filter(|stored| stored.get(IDENTITY_KEY) != candidate_id)
                .any(|stored| index.entry(stored).as_ref() == Some(&entry));

            if collides {
                return Err(DocumentStoreError::DuplicateKey(
                    index.name.clone(),
                    namespace.collection.clone(),
                ));
            }
        }

        Ok(())
    }
}

type StoreMap = HashMap<Namespace, CollectionState>;

/// Thread-safe in-memory [`PersistenceGateway`].
///
/// Clones share the same underlying data.
///
/// `find` evaluates the query under the read lock and buffers the matching page, so the
/// returned stream is a snapshot: writes made while it is consumed are not observed.
///
/// # Example
///
/// ```ignore
/// use recordlayer_memory::InMemoryStore;
/// use recordlayer::store::RecordStore;
///
/// let store = RecordStore::new(InMemoryStore::new(), StoreConfig::new("testdb"))?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Names of the indexes defined on a namespace, in creation order.
    pub async fn index_names(&self, namespace: &Namespace) -> Vec<String> {
        self.store
            .read()
            .await
            .get(namespace)
            .map(|state| state.indexes.iter().map(|index| index.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Raw documents of a namespace in insertion order.
    pub async fn documents(&self, namespace: &Namespace) -> Vec<Document> {
        self.store
            .read()
            .await
            .get(namespace)
            .map(|state| state.documents.clone())
            .unwrap_or_default()
    }
}

fn identity_of(value: &Bson) -> DocumentStoreResult<Uuid> {
    match value {
        Bson::String(text) => Uuid::parse_str(text)
            .map_err(|err| DocumentStoreError::Serialization(err.to_string())),
        other => Ok(deserialize_from_bson::<Uuid>(other.clone())?),
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryStore {
    async fn upsert(
        &self,
        namespace: &Namespace,
        mut document: Document,
        _options: &UpsertOptions,
    ) -> DocumentStoreResult<Uuid> {
        let id = match document.get(IDENTITY_KEY) {
            Some(value) => identity_of(value)?,
            None => Uuid::new(),
        };
        document.insert(IDENTITY_KEY, id);

        let mut store = self.store.write().await;
        let state = store.entry(namespace.clone()).or_default();

        state.check_unique(namespace, &document)?;

        match state.position(&Bson::from(id)) {
            Some(position) => {
                trace!(target: "recordlayer::memory", %namespace, %id, "Replacing document");
                state.documents[position] = document;
            }
            None => {
                trace!(target: "recordlayer::memory", %namespace, %id, "Inserting document");
                state.documents.push(document);
            }
        }

        Ok(id)
    }

    async fn remove(&self, namespace: &Namespace, id: Uuid) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if let Some(state) = store.get_mut(namespace) {
            let before = state.documents.len();
            let key = Bson::from(id);
            state
                .documents
                .retain(|document| document.get(IDENTITY_KEY) != Some(&key));

            trace!(
                target: "recordlayer::memory",
                %namespace,
                %id,
                removed = before - state.documents.len(),
                "Removed document"
            );
        }

        Ok(())
    }

    async fn find(&self, namespace: &Namespace, query: Query) -> DocumentStoreResult<DocumentStream> {
        let store = self.store.read().await;
        let Some(state) = store.get(namespace) else {
            return Ok(futures::stream::empty().boxed());
        };

        let mut documents = Vec::new();
        for document in &state.documents {
            if matches_filter(document, query.filter.as_ref())? {
                documents.push(document.clone());
            }
        }

        if !query.sort.is_empty() {
            documents.sort_by(|left, right| compare_documents(left, right, &query.sort));
        }

        let limit = query.limit.filter(|limit| *limit > 0).unwrap_or(usize::MAX);
        let documents = documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(limit)
            .collect::<Vec<_>>();

        debug!(
            target: "recordlayer::memory",
            %namespace,
            matched = documents.len(),
            timeout = ?query.timeout,
            "Query evaluated"
        );

        Ok(futures::stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn count(&self, namespace: &Namespace, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let Some(state) = store.get(namespace) else {
            return Ok(0);
        };

        let mut count = 0;
        for document in &state.documents {
            if matches_filter(document, filter.as_ref())? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn ensure_index(
        &self,
        namespace: &Namespace,
        keys: IndexKeys,
        options: IndexOptions,
    ) -> DocumentStoreResult<()> {
        if keys.is_empty() {
            return Err(DocumentStoreError::Backend(
                "an index needs at least one key".into(),
            ));
        }

        let mut store = self.store.write().await;
        let state = store.entry(namespace.clone()).or_default();
        let name = options.name.unwrap_or_else(|| keys.index_name());

        if state
            .indexes
            .iter()
            .any(|index| index.name == name || index.keys == keys)
        {
            return Ok(());
        }

        let index = IndexSpec {
            name,
            keys,
            unique: options.unique,
            sparse: options.sparse,
        };

        if index.unique {
            let mut seen = Vec::new();
            for entry in state.documents.iter().filter_map(|document| index.entry(document)) {
                if seen.contains(&entry) {
                    return Err(DocumentStoreError::DuplicateKey(
                        index.name.clone(),
                        namespace.collection.clone(),
                    ));
                }
                seen.push(entry);
            }
        }

        debug!(target: "recordlayer::memory", %namespace, index = %index.name, "Index created");
        state.indexes.push(index);

        Ok(())
    }

    async fn drop_index(&self, namespace: &Namespace, keys: IndexKeys) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let position = store
            .get(namespace)
            .and_then(|state| state.indexes.iter().position(|index| index.keys == keys));

        match (store.get_mut(namespace), position) {
            (Some(state), Some(position)) => {
                let index = state.indexes.remove(position);
                debug!(target: "recordlayer::memory", %namespace, index = %index.name, "Index dropped");
                Ok(())
            }
            _ => Err(DocumentStoreError::IndexNotFound(
                keys.index_name(),
                namespace.collection.clone(),
            )),
        }
    }
}

/// Builder for [`InMemoryStore`]; always succeeds.
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl GatewayBuilder for InMemoryStoreBuilder {
    type Gateway = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Gateway> {
        Ok(InMemoryStore::new())
    }
}
