//! In-memory persistence gateway for recordlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `PersistenceGateway`
//! trait. It uses async-aware read-write locks for concurrent access and is intended for
//! development and testing.
//!
//! # Features
//!
//! - **Insertion order** - Unsorted queries return documents in the order they were first stored
//! - **Full query support** - Filters, multi-key sorting, offset and limit
//! - **Index bookkeeping** - Unique and sparse indexes are enforced on write
//!
//! # Quick Start
//!
//! ```ignore
//! use recordlayer::prelude::*;
//! use recordlayer::memory::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = InMemoryStore::builder().build().await?;
//!     let store = RecordStore::new(gateway, StoreConfig::new("testdb"))?;
//!
//!     let mut user = Record::<User>::default();
//!     user.email = Some("a@b.com".into());
//!     store.repository::<User>().save(&mut user).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as recordlayer_memory;

mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
