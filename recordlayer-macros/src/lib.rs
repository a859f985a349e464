//! Procedural macros for the recordlayer project.
//!
//! `#[derive(Schema)]` generates the compile-time attribute schema of a record type: its
//! declared field names in order, name-based field access and an optional collection name.
//!
//! ```ignore
//! #[derive(Debug, Default, Schema)]
//! #[record(collection = "accounts")]
//! pub struct User {
//!     pub email: Option<String>,
//!     #[serde(rename = "pass")]
//!     pub password: Option<String>,
//!     #[record(skip)]
//!     pub session: Option<String>,
//! }
//! ```
//!
//! Field attributes:
//!
//! - `#[record(skip)]` and `#[serde(skip)]` leave the field out of the schema entirely.
//! - `#[serde(rename = "...")]` changes the declared (and persisted) name.
//!
//! Fields whose declared name starts with `_` are declared but are not attributes.

#[allow(unused_extern_crates)]
extern crate self as recordlayer_macros;

use proc_macro::TokenStream;

mod schema;

#[proc_macro_derive(Schema, attributes(record))]
pub fn derive_schema(input: TokenStream) -> TokenStream {
    schema::derive_schema(input.into()).into()
}
