//!
//! Proptree: an in-memory container for hierarchical, typed properties.
//! This library provides named, reference-counted collections that can be
//! nested, shared and searched by dotted path.
//!
//! ## Core Concepts
//!
//! * **Collections (`collection::Collection`)**: Named, classed, ordered sequences of typed items. Handles are shared; storage lives until the last holder is gone.
//! * **Items (`collection::Node`, `collection::Item`, `collection::ItemRef`)**: A read-only view handed out by traversal, a detached item owned by the caller, and a handle to an item still inside a collection.
//! * **Composition (`collection::AddMode`)**: A child collection is attached by reference, embedded (moved in) or embedded as a deep copy.
//! * **Dotted paths (`collection::DottedPath`)**: `socket.peer.hostname` addresses an item by its name and the trailing chain of its ancestors.
//! * **Dispositions (`collection::Disposition`)**: Positional insert and extract among the children of one level, with duplicate-name policies.
//! * **Traversal and iteration**: A callback-driven depth-first walk and a stateful iterator that can jump out of nested levels.
//! * **Configuration (`config::Config`)**: Per-collection limits on item size and iterator stack growth.
//!
//! Collections are single-threaded; handles are neither `Send` nor `Sync`.

pub mod collection;
pub mod config;
pub mod constants;

pub use collection::{
    AddMode, Collection, CollectionError, CollectionIter, Disposition, DottedPath, DupPolicy,
    EmbedError, Item, ItemId, ItemRef, Kind, Kinds, Node, PathError, TraverseFlags, Value, WeakCollection,
};
pub use config::Config;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured errors from the collection engine
    #[error(transparent)]
    Collection(collection::CollectionError),

    /// Name and path validation errors
    #[error(transparent)]
    Path(collection::PathError),

    /// A rejected embed, carrying the child handle back to the caller
    #[error(transparent)]
    Embed(collection::EmbedError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self.cause() {
            Error::Serialize(_) => "serialize",
            Error::Path(_) => "path",
            Error::Collection(_) | Error::Embed(_) => "collection",
        }
    }

    /// The underlying error, looking through a rejected embed
    fn cause(&self) -> &Error {
        match self {
            Error::Embed(err) => err.error().cause(),
            other => other,
        }
    }

    /// Takes back the child handle of a rejected embed.
    ///
    /// Returns `None` for every other error.
    pub fn into_child(self) -> Option<Collection> {
        match self {
            Error::Embed(err) => Some(err.into_child()),
            _ => None,
        }
    }

    /// Check if this error indicates the target was not found.
    pub fn is_not_found(&self) -> bool {
        match self.cause() {
            Error::Collection(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates a conflict (already exists).
    pub fn is_conflict(&self) -> bool {
        match self.cause() {
            Error::Collection(err) => err.is_already_exists(),
            _ => false,
        }
    }

    /// Check if this error is an argument validation failure, including
    /// malformed names and paths.
    pub fn is_invalid_argument(&self) -> bool {
        match self.cause() {
            Error::Collection(err) => err.is_invalid_argument(),
            Error::Path(_) => true,
            _ => false,
        }
    }

    /// Check if this error reports an ownership or structure conflict.
    pub fn is_invalid_state(&self) -> bool {
        match self.cause() {
            Error::Collection(err) => err.is_invalid_state(),
            _ => false,
        }
    }

    /// Check if this error reports an unimplemented mode.
    pub fn is_unsupported(&self) -> bool {
        match self.cause() {
            Error::Collection(err) => err.is_unsupported(),
            _ => false,
        }
    }

    /// Check if this error reports an oversized payload.
    pub fn is_resource_exhausted(&self) -> bool {
        match self.cause() {
            Error::Collection(err) => err.is_resource_exhausted(),
            _ => false,
        }
    }

    /// Check if this error is a type filter mismatch.
    pub fn is_type_error(&self) -> bool {
        match self.cause() {
            Error::Collection(err) => err.is_type_error(),
            _ => false,
        }
    }
}
