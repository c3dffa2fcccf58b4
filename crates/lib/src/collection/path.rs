//! Dotted paths and property names.
//!
//! Items are addressed with a `.`-separated path whose segments are matched
//! against the tail of the chain of open ancestors plus the item's own name.
//! A caller only needs to supply as many trailing ancestors as it takes to
//! disambiguate:
//!
//! ```rust
//! # use proptree::collection::DottedPath;
//! let path: DottedPath = "peer.hostname".parse()?;
//!
//! assert!(path.matches("hostname", &["event", "socket", "peer"]));
//! assert!(!path.matches("hostname", &["event", "host"]));
//! # Ok::<(), proptree::collection::PathError>(())
//! ```
//!
//! Matching is first-match-wins in traversal order; two items that share the
//! same trailing chain cannot be told apart and callers must add segments.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Error type for path and name validation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Property or collection name rejected
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Path has no segments left after normalization
    #[error("Empty path '{path}'")]
    Empty { path: String },
}

// Conversion from PathError to the main Error type
impl From<PathError> for crate::Error {
    fn from(err: PathError) -> Self {
        crate::Error::Path(err)
    }
}

/// Normalizes a path string by cleaning up dots and empty components.
///
/// - Leading dots ".user" → "user"
/// - Trailing dots "user." → "user"
/// - Consecutive dots "user..profile" → "user.profile"
/// - Pure dots "..." → empty string
///
/// ```rust
/// # use proptree::collection::path::normalize_path;
/// assert_eq!(normalize_path(".peer.IPv6"), "peer.IPv6");
/// assert_eq!(normalize_path("peer..IPv6."), "peer.IPv6");
/// assert_eq!(normalize_path("..."), "");
/// ```
pub fn normalize_path(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    input
        .split('.')
        .filter(|component| !component.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Checks that `name` can be used as a property or collection name.
///
/// Names must be non-empty and contain neither whitespace nor dots, since
/// dots separate path segments.
pub fn validate_name(name: &str) -> Result<(), PathError> {
    let reason = if name.is_empty() {
        "names cannot be empty"
    } else if name.chars().any(char::is_whitespace) {
        "names cannot contain whitespace"
    } else if name.contains('.') {
        "names cannot contain dots"
    } else {
        return Ok(());
    };

    Err(PathError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// A normalized, non-empty dotted path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DottedPath {
    inner: String,
}

impl DottedPath {
    /// Parses and normalizes a dotted path.
    ///
    /// # Errors
    /// Returns [`PathError::Empty`] if nothing but dots remain.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let inner = normalize_path(input);
        if inner.is_empty() {
            return Err(PathError::Empty {
                path: input.to_string(),
            });
        }
        Ok(Self { inner })
    }

    /// Returns an iterator over the path segments.
    pub fn components(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.inner.split('.')
    }

    /// Returns the number of segments in the path.
    pub fn len(&self) -> usize {
        self.components().count()
    }

    /// Always `false`; empty paths are rejected at parse time.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the rightmost segment, the name of the addressed item.
    pub fn leaf(&self) -> &str {
        match self.inner.rfind('.') {
            Some(last_dot) => &self.inner[last_dot + 1..],
            None => &self.inner,
        }
    }

    /// Returns the path without its leaf, or `None` for a single segment.
    pub fn parent(&self) -> Option<DottedPath> {
        self.inner.rfind('.').map(|last_dot| DottedPath {
            inner: self.inner[..last_dot].to_string(),
        })
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Checks whether an item named `name` whose open ancestors are
    /// `ancestors` (outermost first) is addressed by this path.
    ///
    /// The leaf must equal `name` and the remaining segments must equal the
    /// innermost ancestors, compared right to left.
    pub fn matches<S: AsRef<str>>(&self, name: &str, ancestors: &[S]) -> bool {
        let mut segments = self.components().rev();
        if segments.next() != Some(name) {
            return false;
        }

        let mut chain = ancestors.iter().rev();
        for segment in segments {
            match chain.next() {
                Some(ancestor) if ancestor.as_ref() == segment => {}
                _ => return false,
            }
        }
        true
    }
}

impl FromStr for DottedPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DottedPath::parse(s)
    }
}

impl TryFrom<&str> for DottedPath {
    type Error = PathError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        DottedPath::parse(s)
    }
}

impl AsRef<str> for DottedPath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for DottedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}
