//! Error types for collection operations.
//!
//! This module defines the structured error type returned by the collection
//! engine. Every operation is a single deterministic attempt; nothing here is
//! retried internally, so callers decide how to react to each variant.

use thiserror::Error;

use crate::collection::Collection;

/// Structured error types for collection operations.
///
/// Not-found conditions are only errors where the caller expressed intent to
/// act on a specific item (delete, extract, compose into a sub-collection).
/// Plain lookups report absence through `Option` instead.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// Malformed argument: bad name, unsupported flag combination, out of range level
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The addressed item, reference item or position does not exist
    #[error("Item not found: {key}")]
    NotFound { key: String },

    /// A duplicate check on insert found an item with the same name
    #[error("Item already exists: {name}")]
    AlreadyExists { name: String },

    /// The requested mode or disposition is not implemented
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// The operation conflicts with the ownership or structure of the target
    #[error("Invalid state: {reason}")]
    InvalidState { reason: String },

    /// A payload exceeds the configured maximum item size
    #[error("Item too large: {size} bytes exceeds the limit of {limit} bytes")]
    ResourceExhausted { size: usize, limit: usize },

    /// The only candidate was excluded by the type filter
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: String },
}

impl CollectionError {
    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        CollectionError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(key: impl Into<String>) -> Self {
        CollectionError::NotFound { key: key.into() }
    }

    pub(crate) fn invalid_state(reason: impl Into<String>) -> Self {
        CollectionError::InvalidState {
            reason: reason.into(),
        }
    }

    /// Check if this error means the target was absent.
    ///
    /// A type filter rejecting the only candidate is reported as
    /// [`CollectionError::TypeMismatch`] but counts as not found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CollectionError::NotFound { .. } | CollectionError::TypeMismatch { .. }
        )
    }

    /// Check if this error was raised by a duplicate-name policy
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CollectionError::AlreadyExists { .. })
    }

    /// Check if this error is an argument validation failure
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, CollectionError::InvalidArgument { .. })
    }

    /// Check if this error is an ownership or structure conflict
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, CollectionError::InvalidState { .. })
    }

    /// Check if this error reports an unimplemented mode
    pub fn is_unsupported(&self) -> bool {
        matches!(self, CollectionError::Unsupported { .. })
    }

    /// Check if this error reports an oversized payload
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, CollectionError::ResourceExhausted { .. })
    }

    /// Check if this error reports a type filter mismatch
    pub fn is_type_error(&self) -> bool {
        matches!(self, CollectionError::TypeMismatch { .. })
    }

    /// Get the key if this is a lookup error
    pub fn key(&self) -> Option<&str> {
        match self {
            CollectionError::NotFound { key } => Some(key),
            CollectionError::AlreadyExists { name } => Some(name),
            _ => None,
        }
    }
}

/// A failed embed.
///
/// Embedding consumes the child handle, so a rejected embed hands it back
/// here instead of dropping it. The child is exactly as it was passed in.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct EmbedError {
    error: Box<crate::Error>,
    child: Collection,
}

impl EmbedError {
    pub(crate) fn new(error: impl Into<crate::Error>, child: Collection) -> Self {
        Self {
            error: Box::new(error.into()),
            child,
        }
    }

    /// The reason the embed was rejected
    pub fn error(&self) -> &crate::Error {
        &self.error
    }

    pub fn child(&self) -> &Collection {
        &self.child
    }

    /// Takes back the child handle
    pub fn into_child(self) -> Collection {
        self.child
    }
}

impl From<EmbedError> for crate::Error {
    fn from(err: EmbedError) -> Self {
        crate::Error::Embed(err)
    }
}

// Conversion from CollectionError to the main Error type
impl From<CollectionError> for crate::Error {
    fn from(err: CollectionError) -> Self {
        crate::Error::Collection(err)
    }
}
