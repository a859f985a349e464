//! Record type declaration and the derived attribute schema.
//!
//! A record type is a plain struct that implements two traits:
//!
//! - [`Schema`] declares the fields in declaration order and provides typed, name-based
//!   access to them. It is normally generated by `#[derive(Schema)]`.
//! - [`Model`] registers validators and overrides lifecycle hooks. Every item has a
//!   default, so `impl Model for User {}` is a complete implementation.
//!
//! From these the crate derives a [`RecordDescriptor`]: the persistable attribute names,
//! the collection name and the validator table. The descriptor is a pure function of the
//! type and is cached process-wide on first use.
//!
//! # Attribute filtering
//!
//! Fields whose name starts with [`RESERVED_PREFIX`] are ordinary struct fields but are not
//! attributes. The identity key ([`IDENTITY_KEY`]) is handled by the record, never by the
//! attribute accessors. The same filtered name list drives schema introspection, generic
//! get/set, iteration and the persisted document shape.
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
//!     _login_attempts: u32,
//! }
//!
//! impl Model for User {
//!     fn validators() -> ValidatorTable {
//!         ValidatorTable::new().register("validates_email", |value| {
//!             value.as_str().is_some_and(|email| email.contains('@'))
//!         })
//!     }
//! }
//! ```

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use std::{any::TypeId, collections::HashMap, fmt, sync::Arc};
use tracing::debug;

use crate::{error::DocumentStoreResult, resolve::resolve_collection_name};

/// Document key that carries a record's identity.
pub const IDENTITY_KEY: &str = "_id";

/// Declared fields starting with this prefix are excluded from the attribute set.
pub const RESERVED_PREFIX: char = '_';

/// Name prefix binding a validator to an attribute: `validates_email` binds `email`.
pub const VALIDATOR_PREFIX: &str = "validates_";

/// A validator predicate. It receives the current value of its bound attribute.
pub type ValidatorFn = fn(&Bson) -> bool;

/// Compile-time declared field layout of a record type.
///
/// Implementations must keep the three views consistent: every name in
/// [`declared_fields`](Schema::declared_fields) is readable through
/// [`read_field`](Schema::read_field) and writable through [`write_field`](Schema::write_field),
/// and both return `None` for any other name.
///
/// # Implementing by hand
///
/// ```ignore
/// use recordlayer::schema::{Schema, capture, assign};
///
/// impl Schema for User {
///     fn type_name() -> &'static str { "User" }
///     fn declared_fields() -> &'static [&'static str] { &["email", "password"] }
///
///     fn read_field(&self, name: &str) -> Option<DocumentStoreResult<Bson>> {
///         match name {
///             "email" => Some(capture(&self.email)),
///             "password" => Some(capture(&self.password)),
///             _ => None,
///         }
///     }
///
///     fn write_field(&mut self, name: &str, value: Bson) -> Option<DocumentStoreResult<()>> {
///         match name {
///             "email" => Some(assign(&mut self.email, value)),
///             "password" => Some(assign(&mut self.password, value)),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Schema {
    /// Name of the record type. Module paths are stripped before collection resolution.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Every declared field in declaration order, reserved ones included.
    fn declared_fields() -> &'static [&'static str];

    /// Explicit collection name. `None` derives one from [`type_name`](Schema::type_name).
    fn collection_name() -> Option<&'static str> {
        None
    }

    /// Reads a declared field as BSON, or `None` if `name` is not declared.
    fn read_field(&self, name: &str) -> Option<DocumentStoreResult<Bson>>;

    /// Overwrites a declared field from BSON, or `None` if `name` is not declared.
    fn write_field(&mut self, name: &str, value: Bson) -> Option<DocumentStoreResult<()>>;
}

/// Validators and lifecycle hooks of a record type.
///
/// Hooks run synchronously at fixed points of the lifecycle and default to no-ops.
pub trait Model: Schema + Default + Send + Sync + 'static {
    /// The validator registration table. Evaluated once per type and cached.
    fn validators() -> ValidatorTable {
        ValidatorTable::new()
    }

    /// Runs once after a record is constructed as new. Never runs for materialized records.
    fn after_new(&mut self) {}

    fn before_validation(&mut self) {}

    fn after_validation(&mut self) {}

    /// Runs after validation succeeded and before the document snapshot is taken.
    fn before_save(&mut self) {}

    fn after_save(&mut self) {}

    /// Runs on every `destroy()`, including the no-op destroy of a new record.
    fn before_destroy(&mut self) {}
}

/// Serializes a field value to BSON. Used by generated [`Schema`] implementations.
pub fn capture<T: Serialize>(value: &T) -> DocumentStoreResult<Bson> {
    Ok(serialize_to_bson(value)?)
}

/// Deserializes BSON into a field slot. The slot is untouched if conversion fails.
pub fn assign<T: DeserializeOwned>(slot: &mut T, value: Bson) -> DocumentStoreResult<()> {
    *slot = deserialize_from_bson(value)?;
    Ok(())
}

/// Returns `true` if a declared field name is excluded from the attribute set.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Ordered registration of validators, keyed by validator name.
#[derive(Clone, Default)]
pub struct ValidatorTable {
    entries: Vec<(&'static str, ValidatorFn)>,
}

impl fmt::Debug for ValidatorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

impl ValidatorTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Registers a validator. Registration order is the evaluation order.
    pub fn register(mut self, name: &'static str, validator: ValidatorFn) -> Self {
        self.entries.push((name, validator));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, ValidatorFn)> {
        self.entries.iter()
    }
}

/// Cached, type-independent view of a record type's schema.
#[derive(Debug)]
pub struct RecordDescriptor {
    type_name: &'static str,
    attribute_names: Vec<&'static str>,
    collection_name: String,
    validators: ValidatorTable,
}

impl RecordDescriptor {
    fn build<M: Model>() -> Self {
        let attribute_names = M::declared_fields()
            .iter()
            .copied()
            .filter(|name| !is_reserved(name))
            .collect::<Vec<_>>();

        Self {
            type_name: M::type_name(),
            attribute_names,
            collection_name: resolve_collection_name(M::type_name(), M::collection_name()),
            validators: M::validators(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Attribute names in declaration order, optionally followed by the identity key.
    pub fn attribute_names(&self, include_identity: bool) -> Vec<&'static str> {
        let mut names = self.attribute_names.clone();
        if include_identity {
            names.push(IDENTITY_KEY);
        }
        names
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute_names.contains(&name)
    }

    pub(crate) fn attributes(&self) -> &[&'static str] {
        &self.attribute_names
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    pub fn validators(&self) -> &ValidatorTable {
        &self.validators
    }
}

static DESCRIPTORS: Lazy<RwLock<HashMap<TypeId, Arc<RecordDescriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns the cached descriptor of `M`, building it on first use.
pub fn descriptor<M: Model>() -> Arc<RecordDescriptor> {
    let key = TypeId::of::<M>();

    if let Some(descriptor) = DESCRIPTORS.read().get(&key) {
        return descriptor.clone();
    }

    DESCRIPTORS
        .write()
        .entry(key)
        .or_insert_with(|| {
            let descriptor = RecordDescriptor::build::<M>();
            debug!(
                target: "recordlayer::schema",
                record_type = descriptor.type_name,
                collection = %descriptor.collection_name,
                attributes = ?descriptor.attribute_names,
                "Record descriptor built"
            );
            Arc::new(descriptor)
        })
        .clone()
}

/// Attribute names of `M` in declaration order; see [`RecordDescriptor::attribute_names`].
pub fn attribute_names<M: Model>(include_identity: bool) -> Vec<&'static str> {
    descriptor::<M>().attribute_names(include_identity)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Two plain attributes, one reserved field and an `_id` field of its own.
    #[derive(Debug, Default, Clone)]
    pub struct TestEntity {
        pub email: Option<String>,
        pub password: Option<String>,
        pub _cache: Option<String>,
        pub _id: Option<String>,
        pub hooks: Vec<&'static str>,
    }

    impl Schema for TestEntity {
        fn type_name() -> &'static str {
            "TestEntity"
        }

        fn declared_fields() -> &'static [&'static str] {
            &["email", "password", "_cache", "_id"]
        }

        fn read_field(&self, name: &str) -> Option<DocumentStoreResult<Bson>> {
            match name {
                "email" => Some(capture(&self.email)),
                "password" => Some(capture(&self.password)),
                "_cache" => Some(capture(&self._cache)),
                "_id" => Some(capture(&self._id)),
                _ => None,
            }
        }

        fn write_field(&mut self, name: &str, value: Bson) -> Option<DocumentStoreResult<()>> {
            match name {
                "email" => Some(assign(&mut self.email, value)),
                "password" => Some(assign(&mut self.password, value)),
                "_cache" => Some(assign(&mut self._cache, value)),
                "_id" => Some(assign(&mut self._id, value)),
                _ => None,
            }
        }
    }

    impl Model for TestEntity {
        fn validators() -> ValidatorTable {
            ValidatorTable::new().register("validates_email", |value| {
                value
                    .as_str()
                    .is_some_and(|email| email.contains('@'))
            })
        }

        fn after_new(&mut self) {
            self.hooks.push("after_new");
        }

        fn before_validation(&mut self) {
            self.hooks.push("before_validation");
        }

        fn after_validation(&mut self) {
            self.hooks.push("after_validation");
        }

        fn before_save(&mut self) {
            self.hooks.push("before_save");
        }

        fn after_save(&mut self) {
            self.hooks.push("after_save");
        }

        fn before_destroy(&mut self) {
            self.hooks.push("before_destroy");
        }
    }

    /// Declares a validator for an attribute it does not have, after a valid one.
    #[derive(Debug, Default)]
    pub struct Misconfigured {
        pub name: Option<String>,
        pub trail: Vec<&'static str>,
    }

    impl Schema for Misconfigured {
        fn declared_fields() -> &'static [&'static str] {
            &["name"]
        }

        fn read_field(&self, name: &str) -> Option<DocumentStoreResult<Bson>> {
            match name {
                "name" => Some(capture(&self.name)),
                _ => None,
            }
        }

        fn write_field(&mut self, name: &str, value: Bson) -> Option<DocumentStoreResult<()>> {
            match name {
                "name" => Some(assign(&mut self.name, value)),
                _ => None,
            }
        }
    }

    impl Model for Misconfigured {
        fn validators() -> ValidatorTable {
            ValidatorTable::new()
                .register("validates_name", |value| value.as_str() != Some(""))
                .register("validates_nickname", |_| true)
        }

        fn before_validation(&mut self) {
            self.trail.push("before_validation");
        }

        fn after_validation(&mut self) {
            self.trail.push("after_validation");
        }
    }
}
