//! Convention-bound attribute validation.
//!
//! Validators are registered per record type in a [`ValidatorTable`](crate::schema::ValidatorTable).
//! A validator named `validates_<attribute>` is bound to `<attribute>` and receives that
//! attribute's current value. The scan follows registration order and stops at the first
//! validator that returns `false`.
//!
//! A validator whose name does not follow the convention, or whose attribute is not
//! declared, is a configuration error ([`DocumentStoreError::InvalidValidator`]) and is
//! reported when the scan reaches it.

use bson::Bson;
use std::fmt;
use tracing::debug;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    schema::{RecordDescriptor, VALIDATOR_PREFIX},
};

/// A failed validator and the attribute it was bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub validator: &'static str,
    pub attribute: &'static str,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rejected {}", self.validator, self.attribute)
    }
}

/// Resolves the attribute a validator is bound to.
pub(crate) fn bound_attribute(
    descriptor: &RecordDescriptor,
    validator: &'static str,
) -> DocumentStoreResult<&'static str> {
    validator
        .strip_prefix(VALIDATOR_PREFIX)
        .and_then(|attribute| {
            descriptor
                .attributes()
                .iter()
                .copied()
                .find(|name| *name == attribute)
        })
        .ok_or_else(|| {
            DocumentStoreError::InvalidValidator(
                validator.to_string(),
                descriptor.type_name().to_string(),
            )
        })
}

/// Runs the descriptor's validators against the values produced by `value_of`.
///
/// Returns the failed validators; an empty list means the record is valid. At most one
/// entry is returned because the scan short-circuits.
pub(crate) fn run_validators<F>(
    descriptor: &RecordDescriptor,
    mut value_of: F,
) -> DocumentStoreResult<Vec<ValidationError>>
where
    F: FnMut(&'static str) -> DocumentStoreResult<Bson>,
{
    for &(validator, predicate) in descriptor.validators().iter() {
        let attribute = bound_attribute(descriptor, validator)?;
        let value = value_of(attribute)?;

        if !predicate(&value) {
            debug!(
                target: "recordlayer::lifecycle",
                record_type = descriptor.type_name(),
                validator,
                attribute,
                "Validator rejected attribute"
            );

            return Ok(vec![ValidationError { validator, attribute }]);
        }
    }

    Ok(Vec::new())
}
