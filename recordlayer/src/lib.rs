//! Main recordlayer crate: typed, validated, lifecycle-aware records over a document store.
//!
//! This crate is the primary entry point for users of the recordlayer framework. It
//! re-exports the core types from the sub-crates, the `Schema` derive and the bundled
//! persistence gateways.
//!
//! # Features
//!
//! - **Derived schemas** - `#[derive(Schema)]` turns a plain struct into a record type
//! - **Convention-driven validation** - `validates_<attribute>` predicates run before every save
//! - **Lifecycle hooks** - `after_new`, `before_save`, `before_destroy` and friends
//! - **Lazy cursors** - Finders stream documents and materialize records on demand
//! - **Multiple gateways** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use recordlayer::{prelude::*, memory::InMemoryStore};
//!
//! #[derive(Debug, Default, Schema)]
//! pub struct User {
//!     pub email: Option<String>,
//!     pub password: Option<String>,
//! }
//!
//! impl Model for User {
//!     fn validators() -> ValidatorTable {
//!         ValidatorTable::new().register("validates_email", |value| {
//!             value.as_str().is_some_and(|email| email.contains('@'))
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = RecordStore::builder()
//!         .gateway(InMemoryStore::builder().build().await?)
//!         .database("testdb")
//!         .build()?;
//!     let users = store.repository::<User>();
//!
//!     let mut user = Record::<User>::default();
//!     user.email = Some("a@b.com".to_string());
//!     users.save(&mut user).await?;
//!
//!     let found = users
//!         .find_one(Filter::eq("email", "a@b.com"))
//!         .await?
//!         .expect("saved above");
//!     assert_eq!(found.identity(), user.identity());
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Gateways
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB storage (requires the `mongodb` feature)

pub mod prelude;

pub use recordlayer_core::{
    config, cursor, error, gateway, query, record, repository, resolve, schema, store, validate,
};

pub use recordlayer_macros::Schema;

// Re-export BSON types for convenience and for generated code
pub use bson;

/// Naming helpers used for collection resolution.
pub mod inflect {
    pub use recordlayer_inflect::{pluralize, tableize, underscore};
}

/// In-memory persistence gateway.
pub mod memory {
    pub use recordlayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB persistence gateway.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use recordlayer_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
