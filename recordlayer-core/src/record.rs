//! Records: typed models wrapped with identity, lifecycle state and generic attribute access.
//!
//! A [`Record<M>`] owns one model value. Typed fields are reached through `Deref`, while
//! [`get`](Record::get), [`set`](Record::set) and [`attributes`](Record::attributes) give
//! name-based access limited to the attribute set of `M`.
//!
//! ```ignore
//! let mut user = Record::<User>::default();
//! user.email = Some("a@b.com".into());
//! user.set("password", "pw")?;
//!
//! assert_eq!(user.get("email"), Some(Bson::String("a@b.com".into())));
//! assert!(user.set("nonexistent", 1).is_err());
//! ```

use bson::{Bson, Document, Uuid};
use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};
use tracing::warn;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    schema::{IDENTITY_KEY, Model, RecordDescriptor, descriptor},
    validate::{ValidationError, run_validators},
};

/// Stored lifecycle state of a record.
///
/// States only advance `New -> Persisted -> Destroyed`. Destroying a record that was never
/// saved leaves it `New`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    New,
    Persisted,
    Destroyed,
}

/// One instance of a record type.
#[derive(Debug, Clone)]
pub struct Record<M: Model> {
    model: M,
    identity: Option<Uuid>,
    state: LifecycleState,
    errors: Vec<ValidationError>,
}

impl<M: Model> Record<M> {
    /// Builds a record from an attribute mapping.
    ///
    /// With `is_new == true` the record starts in [`LifecycleState::New`] and `after_new`
    /// runs. With `is_new == false` the record is treated as already persisted: the
    /// [`IDENTITY_KEY`] entry, if any, becomes the identity and `after_new` is skipped.
    ///
    /// # Errors
    ///
    /// Fails with [`DocumentStoreError::UnknownAttribute`] for keys outside the attribute set
    /// (including `_id` on a new record) and with [`DocumentStoreError::Serialization`] for
    /// values that do not fit their field or an identity that is not a UUID.
    pub fn new(attributes: Document, is_new: bool) -> DocumentStoreResult<Self> {
        let descriptor = descriptor::<M>();
        let mut model = M::default();
        let mut identity = None;

        for (name, value) in attributes {
            if name == IDENTITY_KEY && !is_new {
                identity = Some(parse_identity(value)?);
                continue;
            }

            write_attribute(&descriptor, &mut model, &name, value)?;
        }

        Ok(Self::assemble(model, identity, is_new))
    }

    /// Wraps an already-built model as a new record and runs `after_new`.
    pub fn from_model(model: M) -> Self {
        Self::assemble(model, None, true)
    }

    /// Rebuilds a persisted record from a stored document. Never runs `after_new`.
    pub fn materialize(document: Document) -> DocumentStoreResult<Self> {
        Self::new(document, false)
    }

    fn assemble(model: M, identity: Option<Uuid>, is_new: bool) -> Self {
        let mut record = Self {
            model,
            identity,
            state: if is_new { LifecycleState::New } else { LifecycleState::Persisted },
            errors: Vec::new(),
        };

        if is_new {
            record.model.after_new();
        }

        record
    }

    pub fn descriptor(&self) -> Arc<RecordDescriptor> {
        descriptor::<M>()
    }

    /// Attribute names of this record's type; identical for every record of `M`.
    pub fn attribute_names(include_identity: bool) -> Vec<&'static str> {
        descriptor::<M>().attribute_names(include_identity)
    }

    pub fn identity(&self) -> Option<Uuid> {
        self.identity
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_new(&self) -> bool {
        self.state == LifecycleState::New
    }

    pub fn is_persisted(&self) -> bool {
        self.state == LifecycleState::Persisted
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == LifecycleState::Destroyed
    }

    /// Validator failures recorded by the most recent [`validate`](Record::validate).
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Reads an attribute, or the identity for [`IDENTITY_KEY`].
    ///
    /// Returns `None` for names outside the attribute set and for an unassigned identity.
    pub fn get(&self, name: &str) -> Option<Bson> {
        if name == IDENTITY_KEY {
            return self.identity.map(Bson::from);
        }

        if !descriptor::<M>().has_attribute(name) {
            return None;
        }

        match self.model.read_field(name)? {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target: "recordlayer::schema",
                    record_type = M::type_name(),
                    attribute = name,
                    error = %err,
                    "Attribute could not be read"
                );
                None
            }
        }
    }

    /// Overwrites an attribute.
    ///
    /// # Errors
    ///
    /// Fails with [`DocumentStoreError::UnknownAttribute`] if `name` is not an attribute.
    /// The identity is never writable through this path.
    pub fn set(&mut self, name: &str, value: impl Into<Bson>) -> DocumentStoreResult<()> {
        write_attribute(&descriptor::<M>(), &mut self.model, name, value.into())
    }

    /// Ordered snapshot of the attribute values, optionally followed by the identity.
    pub fn attributes(&self, include_identity: bool) -> DocumentStoreResult<Document> {
        let descriptor = descriptor::<M>();
        let mut document = Document::new();

        for name in descriptor.attributes() {
            document.insert(*name, read_attribute(&self.model, name)?);
        }

        if include_identity {
            document.insert(IDENTITY_KEY, self.identity.map(Bson::from).unwrap_or(Bson::Null));
        }

        Ok(document)
    }

    /// The document handed to the gateway: the attributes plus the identity once assigned.
    pub fn to_document(&self) -> DocumentStoreResult<Document> {
        self.attributes(self.identity.is_some())
    }

    /// Iterates `(name, value)` pairs in declaration order, ending with the identity.
    pub fn iter(&self) -> AttributeIter<'_, M> {
        AttributeIter::new(self)
    }

    /// Runs the validators wrapped in the `before_validation` / `after_validation` hooks.
    ///
    /// Returns `Ok(false)` when a validator rejects its attribute; the failure is kept in
    /// [`errors`](Record::errors). Returns `Err` only for configuration or conversion
    /// problems, after `after_validation` has run. Failures of earlier calls are cleared
    /// either way.
    pub fn validate(&mut self) -> DocumentStoreResult<bool> {
        self.errors.clear();
        self.model.before_validation();

        let descriptor = descriptor::<M>();
        let model = &self.model;
        let outcome = run_validators(&descriptor, |name| read_attribute(model, name));

        self.model.after_validation();

        self.errors = outcome?;
        Ok(self.errors.is_empty())
    }

    pub(crate) fn mark_persisted(&mut self, identity: Uuid) {
        self.identity = Some(identity);
        self.state = LifecycleState::Persisted;
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.state = LifecycleState::Destroyed;
    }
}

impl<M: Model> Default for Record<M> {
    fn default() -> Self {
        Self::from_model(M::default())
    }
}

impl<M: Model> Deref for Record<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M: Model> DerefMut for Record<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.model
    }
}

impl<'a, M: Model> IntoIterator for &'a Record<M> {
    type Item = (&'static str, Bson);
    type IntoIter = AttributeIter<'a, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// External iteration over a record's attributes followed by its identity.
///
/// Values are read lazily, one per step. Unreadable values are yielded as `Null`.
#[derive(Debug)]
pub struct AttributeIter<'a, M: Model> {
    record: &'a Record<M>,
    names: Vec<&'static str>,
    position: usize,
}

impl<'a, M: Model> AttributeIter<'a, M> {
    fn new(record: &'a Record<M>) -> Self {
        Self {
            record,
            names: descriptor::<M>().attribute_names(true),
            position: 0,
        }
    }

    /// Restarts the iteration from the first attribute.
    pub fn rewind(&mut self) {
        self.position = 0;
    }
}

impl<M: Model> Iterator for AttributeIter<'_, M> {
    type Item = (&'static str, Bson);

    fn next(&mut self) -> Option<Self::Item> {
        let name = *self.names.get(self.position)?;
        self.position += 1;

        Some((name, self.record.get(name).unwrap_or(Bson::Null)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.names.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl<M: Model> ExactSizeIterator for AttributeIter<'_, M> {}

fn read_attribute<M: Model>(model: &M, name: &str) -> DocumentStoreResult<Bson> {
    model
        .read_field(name)
        .unwrap_or(Ok(Bson::Null))
}

fn write_attribute<M: Model>(
    descriptor: &RecordDescriptor,
    model: &mut M,
    name: &str,
    value: Bson,
) -> DocumentStoreResult<()> {
    if !descriptor.has_attribute(name) {
        return Err(DocumentStoreError::UnknownAttribute(
            name.to_string(),
            descriptor.type_name().to_string(),
        ));
    }

    model
        .write_field(name, value)
        .unwrap_or_else(|| {
            Err(DocumentStoreError::UnknownAttribute(
                name.to_string(),
                descriptor.type_name().to_string(),
            ))
        })
}

fn parse_identity(value: Bson) -> DocumentStoreResult<Uuid> {
    match value {
        Bson::Binary(binary) => binary
            .to_uuid()
            .map_err(|err| DocumentStoreError::Serialization(err.to_string())),
        Bson::String(text) => Uuid::parse_str(&text)
            .map_err(|err| DocumentStoreError::Serialization(err.to_string())),
        other => Err(DocumentStoreError::Serialization(format!(
            "expected a UUID identity, found {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fixtures::{Misconfigured, TestEntity};
    use bson::doc;

    #[test]
    fn new_record_has_null_attributes_and_no_identity() {
        let record = Record::<TestEntity>::default();

        assert_eq!(
            record.attributes(false).unwrap(),
            doc! { "email": Bson::Null, "password": Bson::Null }
        );
        assert_eq!(record.identity(), None);
        assert!(record.is_new());
        assert_eq!(record.hooks, vec!["after_new"]);
    }

    #[test]
    fn set_and_get_declared_attributes() {
        let mut record = Record::<TestEntity>::default();
        record.set("email", "test@example.com").unwrap();
        record.password = Some("pass1234".into());

        assert_eq!(record.get("email"), Some(Bson::String("test@example.com".into())));
        assert_eq!(record.get("password"), Some(Bson::String("pass1234".into())));
    }

    #[test]
    fn unknown_attribute_is_rejected_without_mutation() {
        let mut record = Record::<TestEntity>::default();
        record.set("email", "a@b.com").unwrap();
        let before = record.attributes(true).unwrap();

        let err = record.set("nonexistent", "x").unwrap_err();

        assert!(matches!(err, DocumentStoreError::UnknownAttribute(name, _) if name == "nonexistent"));
        assert_eq!(record.attributes(true).unwrap(), before);
        assert_eq!(record.get("nonexistent"), None);
    }

    #[test]
    fn reserved_fields_and_identity_are_not_settable() {
        let mut record = Record::<TestEntity>::default();

        assert!(record.set("_cache", "x").is_err());
        assert!(record.set(IDENTITY_KEY, Uuid::new()).is_err());
        assert_eq!(record.get("_cache"), None);
        assert_eq!(record.identity(), None);
    }

    #[test]
    fn mismatched_value_leaves_attribute_unchanged() {
        let mut record = Record::<TestEntity>::default();
        record.set("email", "a@b.com").unwrap();

        assert!(matches!(
            record.set("email", 42),
            Err(DocumentStoreError::Serialization(_))
        ));
        assert_eq!(record.get("email"), Some(Bson::String("a@b.com".into())));
    }

    #[test]
    fn construction_from_attributes() {
        let record =
            Record::<TestEntity>::new(doc! { "email": "a@b.com", "password": "pw" }, true).unwrap();
        assert_eq!(record.email.as_deref(), Some("a@b.com"));

        let err = Record::<TestEntity>::new(doc! { "_id": Uuid::new() }, true).unwrap_err();
        assert!(matches!(err, DocumentStoreError::UnknownAttribute(..)));

        let err = Record::<TestEntity>::new(doc! { "age": 3 }, true).unwrap_err();
        assert!(matches!(err, DocumentStoreError::UnknownAttribute(..)));
    }

    #[test]
    fn materialized_record_is_persisted_and_skips_after_new() {
        let id = Uuid::new();
        let record = Record::<TestEntity>::materialize(doc! {
            "email": "a@b.com",
            "password": "pw",
            "_id": id,
        })
        .unwrap();

        assert!(record.is_persisted());
        assert_eq!(record.identity(), Some(id));
        assert!(record.hooks.is_empty());
        assert_eq!(record.get(IDENTITY_KEY), Some(Bson::from(id)));
    }

    #[test]
    fn iteration_yields_attributes_then_identity() {
        let mut record = Record::<TestEntity>::default();
        record.set("email", "a@b.com").unwrap();
        record.set("password", "pw").unwrap();

        let pairs = record.iter().collect::<Vec<_>>();
        assert_eq!(
            pairs,
            vec![
                ("email", Bson::String("a@b.com".into())),
                ("password", Bson::String("pw".into())),
                (IDENTITY_KEY, Bson::Null),
            ]
        );
    }

    #[test]
    fn iteration_can_be_rewound() {
        let record = Record::<TestEntity>::default();
        let mut iter = record.iter();

        assert_eq!(iter.len(), 3);
        iter.by_ref().for_each(drop);
        assert!(iter.next().is_none());

        iter.rewind();
        assert_eq!(iter.next().map(|(name, _)| name), Some("email"));
    }

    #[test]
    fn validate_runs_hooks_around_validators() {
        let mut record = Record::<TestEntity>::default();
        record.set("email", "personatpersoncom").unwrap();

        assert!(!record.validate().unwrap());
        assert_eq!(record.errors().len(), 1);
        assert_eq!(record.hooks, vec!["after_new", "before_validation", "after_validation"]);

        record.set("email", "person@person.com").unwrap();
        assert!(record.validate().unwrap());
        assert!(record.errors().is_empty());
    }

    #[test]
    fn validate_surfaces_invalid_validator() {
        let mut record = Record::<Misconfigured>::default();
        assert!(matches!(
            record.validate(),
            Err(DocumentStoreError::InvalidValidator(..))
        ));
        assert_eq!(record.trail, vec!["before_validation", "after_validation"]);
    }

    #[test]
    fn configuration_error_clears_earlier_failures() {
        let mut record = Record::<Misconfigured>::default();
        record.set("name", "").unwrap();

        assert!(!record.validate().unwrap());
        assert_eq!(record.errors().len(), 1);

        record.set("name", "fixed").unwrap();
        assert!(matches!(
            record.validate(),
            Err(DocumentStoreError::InvalidValidator(ref name, _)) if name == "validates_nickname"
        ));
        assert!(record.errors().is_empty());
    }
}
