use async_trait::async_trait;
use bson::{Bson, Document, Uuid, de::deserialize_from_bson, doc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{
        ClientOptions, FindOptions, IndexOptions as MongoIndexOptions, ReplaceOptions,
        WriteConcern,
    },
};
use tracing::debug;

use recordlayer_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    gateway::{
        DocumentStream, GatewayBuilder, IndexKeys, IndexOptions, Namespace, PersistenceGateway,
        UpsertOptions,
    },
    query::{Expr, Query},
    schema::IDENTITY_KEY,
};

use crate::query::MongoQueryTranslator;

const DUPLICATE_KEY_CODE: i32 = 11000;
const INDEX_NOT_FOUND_CODE: i32 = 27;
const NAMESPACE_NOT_FOUND_CODE: i32 = 26;

/// [`PersistenceGateway`] backed by a MongoDB deployment.
///
/// The database of every call comes from its [`Namespace`], so one client serves any number
/// of stores.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
}

impl MongoDbStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn builder(dsn: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, namespace: &Namespace) -> MongoCollection<Document> {
        self.client
            .database(&namespace.database)
            .collection(&namespace.collection)
    }
}

fn backend_error(err: MongoError) -> DocumentStoreError {
    DocumentStoreError::Backend(err.to_string())
}

/// Maps a write failure, recognizing unique index violations.
fn write_error(err: MongoError, namespace: &Namespace) -> DocumentStoreError {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(failure)) if failure.code == DUPLICATE_KEY_CODE => {
            DocumentStoreError::DuplicateKey(
                index_in_message(&failure.message).unwrap_or_default(),
                namespace.collection.clone(),
            )
        }
        _ => backend_error(err),
    }
}

/// Extracts the index name from a server message such as
/// `E11000 duplicate key error collection: db.users index: email_1 dup key: ...`.
fn index_in_message(message: &str) -> Option<String> {
    message
        .split_once("index: ")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .map(str::to_string)
}

/// Ensures the document carries an identity, generating one if needed.
fn assign_identity(document: &mut Document) -> DocumentStoreResult<Uuid> {
    match document.get(IDENTITY_KEY) {
        Some(value) => Ok(deserialize_from_bson::<Uuid>(value.clone())?),
        None => {
            let id = Uuid::new();
            document.insert(IDENTITY_KEY, id);
            Ok(id)
        }
    }
}

fn write_concern(options: &UpsertOptions) -> Option<WriteConcern> {
    if options.journal.is_none() && options.w_timeout.is_none() {
        return None;
    }

    Some(
        WriteConcern::builder()
            .journal(options.journal)
            .w_timeout(options.w_timeout)
            .build(),
    )
}

fn index_keys(keys: &IndexKeys) -> Document {
    keys.iter()
        .map(|(field, direction)| (field.to_string(), Bson::Int32(direction.as_i32())))
        .collect()
}

/// Whether a stored index key document was built from `keys`, field order included.
fn same_keys(stored: &Document, keys: &IndexKeys) -> bool {
    let direction_of = |value: &Bson| match value {
        Bson::Int32(value) => i64::from(*value).signum(),
        Bson::Int64(value) => value.signum(),
        Bson::Double(value) if *value < 0.0 => -1,
        Bson::Double(_) => 1,
        _ => 0,
    };

    stored.len() == keys.iter().count()
        && stored
            .iter()
            .zip(keys.iter())
            .all(|((field, value), (expected, direction))| {
                field == expected && direction_of(value) == i64::from(direction.as_i32())
            })
}

fn is_command_error(err: &MongoError, code: i32) -> bool {
    matches!(err.kind.as_ref(), ErrorKind::Command(command) if command.code == code)
}

impl MongoDbStore {
    /// Finds the name of the index built on `keys`, whatever name it was created with.
    async fn index_name(&self, namespace: &Namespace, keys: &IndexKeys) -> DocumentStoreResult<String> {
        let not_found = || DocumentStoreError::IndexNotFound(keys.index_name(), namespace.collection.clone());

        let mut indexes = match self.collection(namespace).list_indexes().await {
            Ok(cursor) => cursor,
            Err(err) if is_command_error(&err, NAMESPACE_NOT_FOUND_CODE) => return Err(not_found()),
            Err(err) => return Err(backend_error(err)),
        };

        while let Some(index) = indexes.try_next().await.map_err(backend_error)? {
            if !same_keys(&index.keys, keys) {
                continue;
            }
            if let Some(name) = index.options.and_then(|options| options.name) {
                return Ok(name);
            }
        }

        Err(not_found())
    }
}

#[async_trait]
impl PersistenceGateway for MongoDbStore {
    async fn upsert(
        &self,
        namespace: &Namespace,
        mut document: Document,
        options: &UpsertOptions,
    ) -> DocumentStoreResult<Uuid> {
        let id = assign_identity(&mut document)?;

        let mut replace_options = ReplaceOptions::default();
        replace_options.upsert = Some(true);
        replace_options.write_concern = write_concern(options);

        let result = self
            .collection(namespace)
            .replace_one(doc! { IDENTITY_KEY: id }, document)
            .with_options(replace_options)
            .await
            .map_err(|err| write_error(err, namespace))?;

        debug!(
            target: "recordlayer::mongodb",
            %namespace,
            %id,
            matched = result.matched_count,
            upserted = result.upserted_id.is_some(),
            "Document upserted"
        );

        Ok(id)
    }

    async fn remove(&self, namespace: &Namespace, id: Uuid) -> DocumentStoreResult<()> {
        let result = self
            .collection(namespace)
            .delete_one(doc! { IDENTITY_KEY: id })
            .await
            .map_err(backend_error)?;

        debug!(
            target: "recordlayer::mongodb",
            %namespace,
            %id,
            deleted = result.deleted_count,
            "Document removed"
        );

        Ok(())
    }

    async fn find(&self, namespace: &Namespace, query: Query) -> DocumentStoreResult<DocumentStream> {
        let filter = MongoQueryTranslator::translate(query.filter.as_ref())?;

        let mut options = FindOptions::default();
        options.sort = MongoQueryTranslator::sort(&query.sort);
        options.skip = query.offset.map(|skip| skip as u64);
        options.limit = query.limit.map(|limit| limit as i64);
        options.max_time = query.timeout;

        debug!(target: "recordlayer::mongodb", %namespace, %filter, "Executing find");

        let cursor = self
            .collection(namespace)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?;

        Ok(cursor.map_err(backend_error).boxed())
    }

    async fn count(&self, namespace: &Namespace, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        let filter = MongoQueryTranslator::translate(filter.as_ref())?;

        self.collection(namespace)
            .count_documents(filter)
            .await
            .map_err(backend_error)
    }

    async fn ensure_index(
        &self,
        namespace: &Namespace,
        keys: IndexKeys,
        options: IndexOptions,
    ) -> DocumentStoreResult<()> {
        let name = options.name.unwrap_or_else(|| keys.index_name());

        let model = IndexModel::builder()
            .keys(index_keys(&keys))
            .options(
                MongoIndexOptions::builder()
                    .unique(options.unique)
                    .sparse(options.sparse)
                    .name(name.clone())
                    .build(),
            )
            .build();

        self.collection(namespace)
            .create_index(model)
            .await
            .map_err(|err| write_error(err, namespace))?;

        debug!(target: "recordlayer::mongodb", %namespace, index = %name, "Index ensured");

        Ok(())
    }

    async fn drop_index(&self, namespace: &Namespace, keys: IndexKeys) -> DocumentStoreResult<()> {
        let name = self.index_name(namespace, &keys).await?;

        self.collection(namespace)
            .drop_index(name.clone())
            .await
            .map_err(|err| {
                if is_command_error(&err, INDEX_NOT_FOUND_CODE) {
                    DocumentStoreError::IndexNotFound(name.clone(), namespace.collection.clone())
                } else {
                    backend_error(err)
                }
            })?;

        debug!(target: "recordlayer::mongodb", %namespace, index = %name, "Index dropped");

        Ok(())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Connects a [`MongoDbStore`] from a connection string.
#[derive(Debug)]
pub struct MongoDbStoreBuilder {
    dsn: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str) -> Self {
        Self { dsn: dsn.to_string() }
    }
}

#[async_trait]
impl GatewayBuilder for MongoDbStoreBuilder {
    type Gateway = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Gateway> {
        let options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        Ok(MongoDbStore::new(
            Client::with_options(options)
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordlayer_core::query::SortDirection;
    use std::time::Duration;

    #[test]
    fn duplicate_key_message_names_the_index() {
        let message = "E11000 duplicate key error collection: testdb.users index: email_1 dup key: { email: \"a@b.com\" }";
        assert_eq!(index_in_message(message).as_deref(), Some("email_1"));
        assert_eq!(index_in_message("something else"), None);
    }

    #[test]
    fn identity_is_generated_once() {
        let mut document = doc! { "email": "a@b.com" };
        let id = assign_identity(&mut document).unwrap();

        assert_eq!(assign_identity(&mut document).unwrap(), id);
        assert_eq!(document.get(IDENTITY_KEY), Some(&Bson::from(id)));
    }

    #[test]
    fn write_concern_only_when_requested() {
        assert!(write_concern(&UpsertOptions::default()).is_none());

        let concern = write_concern(&UpsertOptions {
            journal: Some(true),
            w_timeout: Some(Duration::from_secs(1)),
        })
        .unwrap();
        assert_eq!(concern.journal, Some(true));
    }

    #[test]
    fn index_keys_keep_direction() {
        let keys = IndexKeys::ascending("email").key("created", SortDirection::Desc);
        assert_eq!(index_keys(&keys), doc! { "email": 1, "created": -1 });
    }

    #[test]
    fn stored_index_keys_match_regardless_of_name_or_number_type() {
        let keys = IndexKeys::ascending("email").key("created", SortDirection::Desc);

        assert!(same_keys(&doc! { "email": 1, "created": -1 }, &keys));
        assert!(same_keys(&doc! { "email": 1.0, "created": -1_i64 }, &keys));
        assert!(!same_keys(&doc! { "created": -1, "email": 1 }, &keys));
        assert!(!same_keys(&doc! { "email": 1, "created": 1 }, &keys));
        assert!(!same_keys(&doc! { "email": 1 }, &keys));
    }
}
