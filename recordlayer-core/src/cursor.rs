//! Lazy, typed query cursors.
//!
//! A [`RecordCursor`] holds a query and executes it on the first call to
//! [`next`](RecordCursor::next). Documents are pulled from the gateway stream one at a time
//! and materialized into persisted [`Record`]s; `after_new` never runs for them.
//!
//! The cursor is single-pass. [`rewind`](RecordCursor::rewind) drops the current stream so
//! the next call re-executes the query from the start.

use bson::Document;
use futures::TryStreamExt;
use std::{fmt, marker::PhantomData};
use tracing::debug;

use crate::{
    error::DocumentStoreResult,
    gateway::{DocumentStream, Namespace, PersistenceGateway},
    query::Query,
    record::Record,
    schema::Model,
};

pub struct RecordCursor<'a, M: Model, G: PersistenceGateway> {
    gateway: &'a G,
    namespace: Namespace,
    query: Query,
    stream: Option<DocumentStream>,
    exhausted: bool,
    _marker: PhantomData<fn() -> M>,
}

impl<'a, M: Model, G: PersistenceGateway> RecordCursor<'a, M, G> {
    pub(crate) fn new(gateway: &'a G, namespace: Namespace, query: Query) -> Self {
        Self {
            gateway,
            namespace,
            query,
            stream: None,
            exhausted: false,
            _marker: PhantomData,
        }
    }

    /// The query this cursor executes, with the effective timeout filled in.
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Advances to the next stored document and materializes it.
    ///
    /// Returns `Ok(None)` once the result set is exhausted, until [`rewind`](Self::rewind).
    pub async fn next(&mut self) -> DocumentStoreResult<Option<Record<M>>> {
        match self.next_document().await? {
            Some(document) => Ok(Some(Record::materialize(document)?)),
            None => Ok(None),
        }
    }

    async fn next_document(&mut self) -> DocumentStoreResult<Option<Document>> {
        if self.exhausted {
            return Ok(None);
        }

        if self.stream.is_none() {
            debug!(
                target: "recordlayer::cursor",
                namespace = %self.namespace,
                filter = ?self.query.filter,
                offset = ?self.query.offset,
                limit = ?self.query.limit,
                "Executing query"
            );

            self.stream = Some(
                self.gateway
                    .find(&self.namespace, self.query.clone())
                    .await?,
            );
        }

        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        match stream.try_next().await? {
            Some(document) => Ok(Some(document)),
            None => {
                self.exhausted = true;
                self.stream = None;
                Ok(None)
            }
        }
    }

    /// Discards the current position; the next call re-executes the query.
    pub fn rewind(&mut self) {
        self.stream = None;
        self.exhausted = false;
    }

    /// Returns the first record of the result set, or `None` if it is empty.
    pub async fn first(mut self) -> DocumentStoreResult<Option<Record<M>>> {
        self.next().await
    }

    /// Drains the remaining documents into a vector of records.
    pub async fn collect_all(mut self) -> DocumentStoreResult<Vec<Record<M>>> {
        let mut records = Vec::new();

        while let Some(record) = self.next().await? {
            records.push(record);
        }

        Ok(records)
    }
}

impl<M: Model, G: PersistenceGateway> fmt::Debug for RecordCursor<'_, M, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordCursor")
            .field("namespace", &self.namespace)
            .field("query", &self.query)
            .field("open", &self.stream.is_some())
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
