//! Typed payloads carried by collection items.
//!
//! A [`Value`] is either a data payload (strings, binary blobs, numbers,
//! booleans) or one of the structural markers that encode nesting in the
//! flat item sequence of a collection:
//!
//! - [`Value::Collection`] opens an embedded sub-collection
//! - [`Value::End`] closes the innermost open sub-collection
//! - [`Value::Reference`] links to a collection owned elsewhere
//!
//! Structural markers are produced by the collection itself; callers can only
//! add data payloads.

use std::fmt;

use crate::collection::{Collection, CollectionError};

bitflags::bitflags! {
    /// Type mask used to filter searches, deletes and extractions.
    ///
    /// Combine with bitwise OR: `Kinds::INT32 | Kinds::INT64`.
    /// [`Kinds::ANY`] matches every kind except the end marker.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Kinds: u32 {
        const STRING = 0x0000_0001;
        const BINARY = 0x0000_0002;
        const INT32 = 0x0000_0004;
        const UINT32 = 0x0000_0008;
        const INT64 = 0x0000_0010;
        const UINT64 = 0x0000_0020;
        const DOUBLE = 0x0000_0040;
        const BOOL = 0x0000_0080;
        const COLLECTION = 0x0000_0100;
        const REFERENCE = 0x0000_0200;
        const END = 0x1000_0000;
        const ANY = Self::STRING.bits()
            | Self::BINARY.bits()
            | Self::INT32.bits()
            | Self::UINT32.bits()
            | Self::INT64.bits()
            | Self::UINT64.bits()
            | Self::DOUBLE.bits()
            | Self::BOOL.bits()
            | Self::COLLECTION.bits()
            | Self::REFERENCE.bits();
    }
}

impl Kinds {
    /// Returns true if `kind` passes this filter
    pub fn matches(self, kind: Kind) -> bool {
        self.intersects(kind.mask())
    }
}

impl Default for Kinds {
    fn default() -> Self {
        Kinds::ANY
    }
}

/// The kind tag of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    String,
    Binary,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    Bool,
    /// Opening marker of an embedded sub-collection
    Collection,
    /// Link to an independently owned collection
    Reference,
    /// Closing marker of an embedded or referenced sub-collection
    End,
}

impl Kind {
    /// Returns the single-bit filter mask for this kind
    pub fn mask(self) -> Kinds {
        match self {
            Kind::String => Kinds::STRING,
            Kind::Binary => Kinds::BINARY,
            Kind::Int32 => Kinds::INT32,
            Kind::UInt32 => Kinds::UINT32,
            Kind::Int64 => Kinds::INT64,
            Kind::UInt64 => Kinds::UINT64,
            Kind::Double => Kinds::DOUBLE,
            Kind::Bool => Kinds::BOOL,
            Kind::Collection => Kinds::COLLECTION,
            Kind::Reference => Kinds::REFERENCE,
            Kind::End => Kinds::END,
        }
    }

    /// Returns the type name as a string
    pub fn name(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Binary => "binary",
            Kind::Int32 => "int32",
            Kind::UInt32 => "uint32",
            Kind::Int64 => "int64",
            Kind::UInt64 => "uint64",
            Kind::Double => "double",
            Kind::Bool => "bool",
            Kind::Collection => "collection",
            Kind::Reference => "reference",
            Kind::End => "end",
        }
    }

    /// Returns true for the markers that encode nesting
    pub fn is_structural(self) -> bool {
        matches!(self, Kind::Collection | Kind::Reference | Kind::End)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header metadata of an embedded sub-collection.
///
/// Embedded sub-collections are exclusively owned by the collection that
/// holds them, so they carry no reference count of their own. Their name is
/// the opening item's name, and their item count is derived from the span
/// (see [`ItemRef::child_count`](crate::ItemRef::child_count)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    pub class: u32,
}

/// Values that can be stored in a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 text; its reported length includes one trailing terminator
    String(String),
    Binary(Vec<u8>),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Bool(bool),
    /// Opening marker of an embedded sub-collection
    Collection(Header),
    /// Shared handle to a collection owned elsewhere
    Reference(Collection),
    /// Closing marker
    End,
}

impl Value {
    /// Builds a string value using the length convention of the typed add calls.
    ///
    /// A `length` of 0 measures the string. Otherwise `length` counts the
    /// trailing terminator, so only the first `length - 1` bytes are kept
    /// (clamped to the string and floored to a character boundary).
    ///
    /// ```rust
    /// # use proptree::collection::Value;
    /// assert_eq!(Value::string_with_len("some data", 0).len(), 10);
    /// assert_eq!(Value::string_with_len("some other data", 2), Value::from("s"));
    /// assert_eq!(Value::string_with_len("10.10.10.10", 12), Value::from("10.10.10.10"));
    /// ```
    pub fn string_with_len(s: &str, length: usize) -> Value {
        if length == 0 {
            return Value::String(s.to_string());
        }

        let mut keep = (length - 1).min(s.len());
        while !s.is_char_boundary(keep) {
            keep -= 1;
        }
        Value::String(s[..keep].to_string())
    }

    /// Returns the kind tag of this value
    pub fn kind(&self) -> Kind {
        match self {
            Value::String(_) => Kind::String,
            Value::Binary(_) => Kind::Binary,
            Value::Int32(_) => Kind::Int32,
            Value::UInt32(_) => Kind::UInt32,
            Value::Int64(_) => Kind::Int64,
            Value::UInt64(_) => Kind::UInt64,
            Value::Double(_) => Kind::Double,
            Value::Bool(_) => Kind::Bool,
            Value::Collection(_) => Kind::Collection,
            Value::Reference(_) => Kind::Reference,
            Value::End => Kind::End,
        }
    }

    /// Returns the payload length in bytes.
    ///
    /// Strings count their trailing terminator. Structural markers have no
    /// payload and report 0.
    pub fn len(&self) -> usize {
        match self {
            Value::String(s) => s.len() + 1,
            Value::Binary(b) => b.len(),
            Value::Int32(_) | Value::UInt32(_) => 4,
            Value::Int64(_) | Value::UInt64(_) | Value::Double(_) => 8,
            Value::Bool(_) => 1,
            Value::Collection(_) | Value::Reference(_) | Value::End => 0,
        }
    }

    /// Returns true if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if this is a data payload rather than a structural marker
    pub fn is_data(&self) -> bool {
        !self.kind().is_structural()
    }

    /// Rejects payloads longer than `limit` bytes
    pub(crate) fn check_size(&self, limit: usize) -> Result<(), CollectionError> {
        let size = self.len();
        if size > limit {
            return Err(CollectionError::ResourceExhausted { size, limit });
        }
        Ok(())
    }

    /// Attempts to convert to a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to convert to a byte slice
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::UInt32(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to get the referenced collection
    pub fn as_reference(&self) -> Option<&Collection> {
        match self {
            Value::Reference(c) => Some(c),
            _ => None,
        }
    }

    /// Attempts to get the header of an embedded sub-collection
    pub fn as_header(&self) -> Option<&Header> {
        match self {
            Value::Collection(h) => Some(h),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Binary(b) => write!(f, "{}", hex::encode(b)),
            Value::Int32(n) => write!(f, "{n}"),
            Value::UInt32(n) => write!(f, "{n}"),
            Value::Int64(n) => write!(f, "{n}"),
            Value::UInt64(n) => write!(f, "{n}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Collection(h) => write!(f, "<collection class {}>", h.class),
            Value::Reference(c) => write!(f, "<reference {}>", c.name()),
            Value::End => write!(f, "<end>"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Binary(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Binary(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::UInt32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::UInt64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
