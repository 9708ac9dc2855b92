//! Error types and result types for document mapping operations.
//!
//! This module provides error handling for schema declaration, validation, connection
//! management and backend operations. Use [`DocumentStoreResult<T>`] as the return type
//! for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use std::fmt;
use thiserror::Error;

/// Represents all possible errors that can occur when mapping documents to a store.
///
/// Configuration errors are caused by bad schema declarations and are never recoverable.
/// Validation errors are raised by the validate stage of a save and carry a
/// [`ValidationError`]. Backend errors are passed through with the backend's own message.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The schema declaration is invalid (for example, an array with more than one element type).
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// An entity failed schema validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// An operation was attempted before a backend was connected.
    #[error("Not connected: call connect() before using the store")]
    NotConnected,
    /// No registered backend can handle the connection URL.
    #[error("Unrecognized connection url: {0}")]
    UnrecognizedUrl(String),
    /// A unique index rejected a duplicate value.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The document has an invalid structure for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document mapping operations.
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

/// The check that rejected a field value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationErrorKind {
    /// The value does not have the declared type.
    Type { expected: String, actual: String },
    /// A required field is empty.
    Required { actual: String },
    /// A text value does not match the declared pattern.
    Pattern { pattern: String, actual: String },
    /// The value is not one of the declared choices.
    Choice { choices: Vec<String>, actual: String },
    /// The value is below the declared minimum.
    Min { min: f64, actual: String },
    /// The value is above the declared maximum.
    Max { max: f64, actual: String },
    /// The custom validator returned `false`.
    Custom { actual: String },
}

/// A field that failed validation, along with the collection it belongs to.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Collection name of the owning entity.
    pub collection: String,
    /// The field that failed.
    pub field: String,
    /// What went wrong.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(collection: impl Into<String>, field: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            collection: collection.into(),
            field: field.into(),
            kind,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = format!("{}.{}", self.collection, self.field);

        match &self.kind {
            ValidationErrorKind::Type { expected, actual } => {
                write!(f, "Value assigned to {key} should be {expected}, got {actual}")
            }
            ValidationErrorKind::Required { actual } => {
                write!(f, "Key {key} is required, but got {actual}")
            }
            ValidationErrorKind::Pattern { pattern, actual } => write!(
                f,
                "Value assigned to {key} does not match the pattern {pattern}. Value was {actual}"
            ),
            ValidationErrorKind::Choice { choices, actual } => write!(
                f,
                "Value assigned to {key} should be in choices [{}], got {actual}",
                choices.join(", ")
            ),
            ValidationErrorKind::Min { min, actual } => {
                write!(f, "Value assigned to {key} is less than min, {min}, got {actual}")
            }
            ValidationErrorKind::Max { max, actual } => {
                write!(f, "Value assigned to {key} is greater than max, {max}, got {actual}")
            }
            ValidationErrorKind::Custom { actual } => {
                write!(f, "Value assigned to {key} failed custom validator. Value was {actual}")
            }
        }
    }
}
