//! MongoDB persistence gateway for recordlayer.
//!
//! This crate provides a MongoDB-based implementation of the `PersistenceGateway` trait,
//! storing records as documents and delegating filtering and sorting to the server.
//!
//! To use this gateway, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! recordlayer = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Behavior
//!
//! - Saves are `replace_one` calls with upsert on `_id`, so a second save replaces the document
//! - Removing an absent identity is acknowledged
//! - Query timeouts are forwarded as `maxTimeMS`
//! - Index names follow the server convention (`email_1_created_-1`)
//!
//! # Example
//!
//! ```ignore
//! use recordlayer::{gateway::GatewayBuilder, mongodb::MongoDbStore, store::RecordStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = MongoDbStore::builder("mongodb://localhost:27017").build().await?;
//!     let store = RecordStore::builder().gateway(gateway).database("testdb").build()?;
//!
//!     let users = store.repository::<User>();
//!     let count = users.count(None).await?;
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_mongodb;

mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
