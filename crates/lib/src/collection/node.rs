//! Items and the flat encoding of nested collections.
//!
//! A collection stores its whole tree as one ordered `Vec<Node>`. An embedded
//! sub-collection occupies a bracketed span:
//!
//! ```text
//! [Collection "socket"] [Int32 "id"] [Int64 "packets"] [End "socket"]
//! ```
//!
//! Spans nest, and every opening marker has exactly one matching `End` at
//! the same depth. A [`Value::Reference`] node has no inline children; its
//! subtree lives in the referenced collection's own sequence.
//!
//! Items are exposed three ways:
//! - [`Node`]: a read-only view, handed to traversal callbacks and iterators
//! - [`Item`]: a detached item owned by the caller after extraction
//! - [`ItemRef`]: a handle to an item still living inside a collection

use std::{
    ops::Range,
    sync::atomic::{AtomicU64, Ordering},
};

use tracing::trace;

use crate::{
    Result,
    collection::{
        Collection, CollectionError, WeakCollection,
        path::validate_name,
        value::{Header, Kind, Value},
    },
    constants::MAX_DATA,
};

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an item, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    fn next() -> Self {
        ItemId(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// One element of a collection's flat sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: ItemId,
    name: String,
    value: Value,
}

impl Node {
    pub(crate) fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            id: ItemId::next(),
            name: name.into(),
            value,
        }
    }

    pub(crate) fn open(name: impl Into<String>, class: u32) -> Self {
        Self::new(name, Value::Collection(Header { class }))
    }

    pub(crate) fn end(name: impl Into<String>) -> Self {
        Self::new(name, Value::End)
    }

    /// End marker reported when the walk leaves a referenced collection.
    /// It shares the id of the reference node it closes.
    pub(crate) fn end_of(reference: &Node) -> Self {
        Self {
            id: reference.id,
            name: reference.name.clone(),
            value: Value::End,
        }
    }

    /// Copy of this node under a fresh id
    pub(crate) fn duplicate(&self) -> Self {
        Self::new(self.name.clone(), self.value.clone())
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.value.kind()
    }

    /// Payload length in bytes, see [`Value::len`]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub(crate) fn set_id(&mut self, id: ItemId) {
        self.id = id;
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_value(&mut self, value: Value) {
        self.value = value;
    }
}

/// Returns the exclusive end of the span headed by `nodes[start]`.
///
/// A data or reference node spans itself; an opening marker spans through
/// its matching `End`. An unbalanced sequence ends at `nodes.len()`.
pub(crate) fn span_end(nodes: &[Node], start: usize) -> usize {
    if !matches!(nodes.get(start).map(Node::value), Some(Value::Collection(_))) {
        return (start + 1).min(nodes.len());
    }

    let mut depth = 0usize;
    for (index, node) in nodes.iter().enumerate().skip(start) {
        match node.value {
            Value::Collection(_) => depth += 1,
            Value::End => {
                depth -= 1;
                if depth == 0 {
                    return index + 1;
                }
            }
            _ => {}
        }
    }
    nodes.len()
}

/// Range of the children of the sub-collection opened at `open`,
/// excluding the opening and closing markers.
pub(crate) fn level_range(nodes: &[Node], open: usize) -> Range<usize> {
    let end = span_end(nodes, open);
    (open + 1)..end.saturating_sub(1).max(open + 1)
}

/// Spans of the direct children inside `level`. Each embedded
/// sub-collection counts as one child.
pub(crate) fn children(nodes: &[Node], level: Range<usize>) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut index = level.start;
    while index < level.end {
        let end = span_end(nodes, index).min(level.end);
        spans.push(index..end);
        index = end;
    }
    spans
}

/// Position of the node with `id`, if it is still in the sequence
pub(crate) fn position_of(nodes: &[Node], id: ItemId) -> Option<usize> {
    nodes.iter().position(|node| node.id == id)
}

/// An item detached from any collection.
///
/// Produced by [`Collection::extract`] or built with [`Item::new`]. The
/// caller owns it exclusively: it can be inserted into any collection with
/// [`Collection::insert`], inspected, or dropped. Extracting an embedded
/// sub-collection detaches its whole span.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    nodes: Vec<Node>,
}

impl Item {
    /// Creates a detached data item.
    ///
    /// # Errors
    /// - `InvalidArgument` for a malformed name or a structural value
    /// - `ResourceExhausted` if the payload exceeds [`MAX_DATA`]
    pub fn new(name: &str, value: impl Into<Value>) -> Result<Self> {
        validate_name(name)?;
        let value = value.into();
        if !value.is_data() {
            return Err(CollectionError::invalid_argument(format!(
                "cannot create a detached '{}' item",
                value.kind()
            ))
            .into());
        }
        value.check_size(MAX_DATA)?;

        Ok(Self {
            nodes: vec![Node::new(name, value)],
        })
    }

    pub(crate) fn from_nodes(nodes: Vec<Node>) -> Self {
        debug_assert!(!nodes.is_empty());
        Self { nodes }
    }

    pub(crate) fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    fn head(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn id(&self) -> ItemId {
        self.head().id
    }

    pub fn name(&self) -> &str {
        self.head().name()
    }

    pub fn kind(&self) -> Kind {
        self.head().kind()
    }

    pub fn len(&self) -> usize {
        self.head().len()
    }

    pub fn is_empty(&self) -> bool {
        self.head().is_empty()
    }

    pub fn value(&self) -> &Value {
        self.head().value()
    }

    /// Number of direct children when this item is a detached sub-collection
    pub fn child_count(&self) -> usize {
        match self.head().value {
            Value::Collection(_) => children(&self.nodes, level_range(&self.nodes, 0)).len(),
            _ => 0,
        }
    }
}

/// A handle to an item that lives inside a collection.
///
/// Handles do not keep the collection alive and do not count toward its
/// reference count. Once the item is extracted, deleted or its collection is
/// released, every accessor fails.
#[derive(Debug, Clone)]
pub struct ItemRef {
    owner: WeakCollection,
    id: ItemId,
}

impl ItemRef {
    pub(crate) fn new(owner: WeakCollection, id: ItemId) -> Self {
        Self { owner, id }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Returns a strong handle to the collection that owns the item.
    pub fn collection(&self) -> Result<Collection> {
        self.owner
            .upgrade()
            .ok_or_else(|| CollectionError::invalid_state("owning collection was released").into())
    }

    fn with_node<R>(&self, f: impl FnOnce(&Node) -> R) -> Result<R> {
        let owner = self.collection()?;
        let inner = owner.read();
        let node = inner
            .nodes
            .iter()
            .find(|node| node.id == self.id)
            .ok_or_else(|| CollectionError::not_found(format!("item #{}", self.id.0)))?;
        Ok(f(node))
    }

    /// Copy of the current state of the item
    pub fn snapshot(&self) -> Result<Node> {
        self.with_node(Node::clone)
    }

    pub fn name(&self) -> Result<String> {
        self.with_node(|node| node.name.clone())
    }

    pub fn kind(&self) -> Result<Kind> {
        self.with_node(Node::kind)
    }

    pub fn len(&self) -> Result<usize> {
        self.with_node(Node::len)
    }

    pub fn value(&self) -> Result<Value> {
        self.with_node(|node| node.value.clone())
    }

    /// Number of direct children of a sub-collection or of the collection a
    /// reference item points to; zero for any other item.
    ///
    /// Nested sub-collections count once each.
    pub fn child_count(&self) -> Result<usize> {
        let owner = self.collection()?;
        let inner = owner.read();
        let index = position_of(&inner.nodes, self.id)
            .ok_or_else(|| CollectionError::not_found(format!("item #{}", self.id.0)))?;
        Ok(match &inner.nodes[index].value {
            Value::Collection(_) => children(&inner.nodes, level_range(&inner.nodes, index)).len(),
            Value::Reference(target) => target.len(),
            _ => 0,
        })
    }

    /// Returns an owning handle to the collection this reference item points to.
    ///
    /// The returned handle is a new holder: the referenced collection's
    /// reference count goes up by one until it is dropped.
    pub fn reference(&self) -> Result<Collection> {
        self.with_node(|node| node.value.as_reference().cloned())?
            .ok_or_else(|| CollectionError::invalid_state("item is not a reference").into())
    }

    /// Renames the item
    pub fn rename(&self, name: &str) -> Result<()> {
        self.modify(Some(name), None)
    }

    /// Replaces the kind and payload of the item, keeping its position
    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        self.modify(None, Some(value.into()))
    }

    /// Renames and/or retypes the item in place.
    ///
    /// `None` keeps the current name or payload.
    ///
    /// # Errors
    /// - `InvalidState` if the item is a sub-collection, reference or end marker
    /// - `InvalidArgument` for a malformed name or a structural new value
    /// - `ResourceExhausted` if the payload exceeds the owner's limit
    pub fn modify(&self, name: Option<&str>, value: Option<Value>) -> Result<()> {
        if let Some(name) = name {
            validate_name(name)?;
        }

        let owner = self.collection()?;
        let limit = owner.config().max_data;
        if let Some(value) = &value {
            if !value.is_data() {
                return Err(CollectionError::invalid_argument(format!(
                    "cannot assign a '{}' value",
                    value.kind()
                ))
                .into());
            }
            value.check_size(limit)?;
        }

        let mut inner = owner.write()?;
        let node = inner
            .nodes
            .iter_mut()
            .find(|node| node.id == self.id)
            .ok_or_else(|| CollectionError::not_found(format!("item #{}", self.id.0)))?;

        if node.kind().is_structural() {
            return Err(CollectionError::invalid_state(format!(
                "cannot modify '{}' item '{}'",
                node.kind(),
                node.name
            ))
            .into());
        }

        trace!(item = %node.name, new_name = ?name, "Modifying item");
        if let Some(name) = name {
            node.set_name(name);
        }
        if let Some(value) = value {
            node.set_value(value);
        }
        Ok(())
    }
}
