//! Generic record-mapping core: typed records over a schemaless document store.
//!
//! This crate is the core of the recordlayer project and provides:
//!
//! - **Record schema** ([`schema`]) - The `Schema` and `Model` traits, validators and the cached descriptor
//! - **Collection naming** ([`resolve`]) - Mapping record type names to collection names
//! - **Records** ([`record`]) - Identity, lifecycle state and generic attribute access
//! - **Validation** ([`validate`]) - The convention-driven validator pipeline
//! - **Lifecycle** ([`repository`]) - Save, destroy and finders for one record type
//! - **Cursors** ([`cursor`]) - Lazy iteration that materializes stored documents
//! - **Query API** ([`query`]) - Filter expressions and find options
//! - **Gateway abstraction** ([`gateway`]) - The trait storage backends implement
//! - **Store** ([`store`]) - Gateway ownership and repository access
//! - **Configuration** ([`config`]) - Database name and find timeout
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::prelude::*;
//!
//! #[derive(Debug, Default, Schema)]
//! pub struct User {
//!     pub email: Option<String>,
//!     pub password: Option<String>,
//! }
//!
//! impl Model for User {}
//!
//! let store = RecordStore::new(InMemoryStore::new(), StoreConfig::new("testdb"))?;
//! let users = store.repository::<User>();
//!
//! let mut user = Record::<User>::default();
//! user.email = Some("a@b.com".into());
//! users.save(&mut user).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_core;

pub mod config;
pub mod cursor;
pub mod error;
pub mod gateway;
pub mod query;
pub mod record;
pub mod repository;
pub mod resolve;
pub mod schema;
pub mod store;
pub mod validate;
