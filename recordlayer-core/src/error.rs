//! Error types and result types for record mapping operations.
//!
//! This module provides the error enum shared by the mapping core and every gateway.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.
//!
//! Errors fall into three groups:
//!
//! - **Schema and configuration errors** ([`DocumentStoreError::UnknownAttribute`],
//!   [`DocumentStoreError::InvalidValidator`], [`DocumentStoreError::Configuration`]) are
//!   programming mistakes and should propagate straight to the caller.
//! - **Validation failure** ([`DocumentStoreError::ValidationFailed`]) is expected in normal
//!   operation and is recoverable.
//! - **Gateway errors** ([`DocumentStoreError::Backend`], [`DocumentStoreError::DuplicateKey`],
//!   ...) are passed through from the storage backend unchanged.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur while mapping, validating or persisting records.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The attribute is not part of the record type's schema.
    /// The first argument is the attribute name, the second is the record type name.
    #[error("The attribute {0} does not exist in the {1} record type")]
    UnknownAttribute(String, String),
    /// A registered validator does not bind to a declared attribute.
    /// The first argument is the validator name, the second is the record type name.
    #[error("Validator {0} of record type {1} does not bind to a declared attribute")]
    InvalidValidator(String, String),
    /// `save()` was refused because `validate()` returned `false`.
    /// The first argument is the record type name, the second lists the failed validators.
    #[error("Validation failed for {0}: {1:?}")]
    ValidationFailed(String, Vec<String>),
    /// The store was used without a proper connection or database.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The operation is not meaningful in the record's current lifecycle state.
    #[error("Invalid lifecycle state: {0}")]
    InvalidState(String),
    /// Serialization/deserialization error when converting attribute values to or from BSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during gateway initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A unique index rejected the write.
    /// The first argument is the index name, the second is the collection name.
    #[error("Duplicate key for index {0} in collection {1}")]
    DuplicateKey(String, String),
    /// The index to drop does not exist.
    /// The first argument is the index name, the second is the collection name.
    #[error("Index {0} not found in collection {1}")]
    IndexNotFound(String, String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    /// Returns `true` for the expected, recoverable "validator said no" outcome of `save()`.
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, DocumentStoreError::ValidationFailed(..))
    }

    /// Returns `true` for schema and configuration mistakes that should fail fast.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DocumentStoreError::UnknownAttribute(..)
                | DocumentStoreError::InvalidValidator(..)
                | DocumentStoreError::Configuration(_)
        )
    }
}

/// A specialized `Result` type for record mapping operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
