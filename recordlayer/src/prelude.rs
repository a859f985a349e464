//! Convenient re-exports of commonly used types from recordlayer.
//!
//! ```ignore
//! use recordlayer::prelude::*;
//! ```

pub use recordlayer_core::{
    config::StoreConfig,
    cursor::RecordCursor,
    error::{DocumentStoreError, DocumentStoreResult},
    gateway::{GatewayBuilder, IndexKeys, IndexOptions, Namespace, PersistenceGateway, UpsertOptions},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, Sort, SortDirection},
    record::{LifecycleState, Record},
    repository::{DestroyOutcome, Repository},
    schema::{Model, Schema, ValidatorTable},
    store::{RecordStore, RecordStoreBuilder},
    validate::ValidationError,
};

pub use recordlayer_macros::Schema;
