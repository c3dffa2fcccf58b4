//! The collection engine.
//!
//! A [`Collection`] is a named, classed, reference-counted ordered sequence of
//! typed items. Nested trees are stored flat: an embedded sub-collection is a
//! bracketed span inside its owner's sequence (see [`node`]), so a single
//! owner can be walked, searched and spliced in one pass.
//!
//! # Ownership
//!
//! `Collection` is a shared handle. Cloning it creates another holder and
//! raises the reference count; dropping (or [`Collection::destroy`]) lowers
//! it. Storage is released when the last holder goes away. Collections are
//! composed in one of three modes:
//!
//! - **Reference**: the parent stores a link and becomes one more holder.
//! - **Embed**: the child's sequence is spliced into the parent. The child
//!   handle is consumed and must not be shared at that moment.
//! - **Clone**: a deep copy of the child is embedded; the child is untouched.
//!
//! Items reached through a reference can be read, searched and modified in
//! place, but structural edits (insert, extract, delete) must go through the
//! referenced collection's own handle.
//!
//! # Usage
//!
//! ```
//! use proptree::{Collection, Kinds, TraverseFlags};
//!
//! let peer = Collection::new("peer", 0)?;
//! peer.add_str(None, "hostname", "peerhost.mytest.com", 0)?;
//!
//! let socket = Collection::new("socket", 0)?;
//! socket.add_int(None, "id", 1)?;
//! socket.add_reference(None, Some("peer"), &peer)?;
//! peer.destroy();
//!
//! let host = socket.get_value("peer.hostname")?;
//! assert_eq!(host.and_then(|v| v.as_str().map(str::to_string)).as_deref(), Some("peerhost.mytest.com"));
//! assert!(socket.contains("socket.id", Kinds::INT32, TraverseFlags::DEFAULT)?);
//! # Ok::<(), proptree::Error>(())
//! ```

use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    ops::Range,
    rc::{Rc, Weak},
};

use tracing::{debug, warn};

use crate::{Config, Result, constants::CLASS_DEFAULT};

pub mod disposition;
pub mod errors;
pub mod iter;
pub mod node;
pub mod path;
pub mod traverse;
pub mod value;

pub use disposition::{Disposition, DupPolicy};
pub use errors::{CollectionError, EmbedError};
pub use iter::CollectionIter;
pub use node::{Item, ItemId, ItemRef, Node};
pub use path::{DottedPath, PathError};
pub use traverse::TraverseFlags;
pub use value::{Header, Kind, Kinds, Value};

use node::{level_range, position_of};
use path::validate_name;

/// Storage behind a collection handle.
pub(crate) struct Inner {
    pub(crate) name: String,
    pub(crate) class: u32,
    pub(crate) config: Config,
    pub(crate) nodes: Vec<Node>,
}

impl Inner {
    /// Range of the level opened by `open`, or the whole sequence for `None`
    pub(crate) fn level(&self, open: Option<ItemId>) -> std::result::Result<Range<usize>, CollectionError> {
        match open {
            None => Ok(0..self.nodes.len()),
            Some(id) => position_of(&self.nodes, id)
                .map(|index| level_range(&self.nodes, index))
                .ok_or_else(|| CollectionError::not_found(format!("sub-collection #{}", id.as_u64()))),
        }
    }
}

/// A shared handle to a collection.
///
/// See the [module documentation](self) for the ownership rules.
#[derive(Clone)]
pub struct Collection {
    inner: Rc<RefCell<Inner>>,
}

/// A non-owning handle that does not count toward the reference count.
#[derive(Clone)]
pub struct WeakCollection {
    inner: Weak<RefCell<Inner>>,
}

impl WeakCollection {
    /// Returns a strong handle if the collection is still alive
    pub fn upgrade(&self) -> Option<Collection> {
        self.inner.upgrade().map(|inner| Collection { inner })
    }

    /// Returns true while at least one holder keeps the collection alive
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl fmt::Debug for WeakCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCollection")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// How a child collection is attached to a parent.
#[derive(Debug)]
pub enum AddMode<'a> {
    /// Link to the child; the parent becomes one more holder
    Reference(&'a Collection),
    /// Splice the child's sequence into the parent, consuming the handle
    Embed(Collection),
    /// Embed a deep copy of the child
    Clone(&'a Collection),
}

impl Collection {
    /// Creates an empty collection with the default [`Config`].
    pub fn new(name: &str, class: u32) -> Result<Self> {
        Self::with_config(name, class, Config::default())
    }

    /// Creates an empty collection of the default class
    pub fn named(name: &str) -> Result<Self> {
        Self::new(name, CLASS_DEFAULT)
    }

    /// Creates an empty collection with explicit limits.
    pub fn with_config(name: &str, class: u32, config: Config) -> Result<Self> {
        validate_name(name)?;
        config.validate()?;
        debug!(name, class, "Creating collection");

        Ok(Self::from_inner(Inner {
            name: name.to_string(),
            class,
            config,
            nodes: Vec::new(),
        }))
    }

    fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    /// Releases this handle.
    ///
    /// Storage is freed only when this was the last holder; other handles,
    /// referencing parents and bound iterators keep working.
    pub fn destroy(self) {
        debug!(
            name = %self.name(),
            remaining = self.ref_count() - 1,
            "Releasing collection handle"
        );
    }

    pub(crate) fn read(&self) -> Ref<'_, Inner> {
        self.inner.borrow()
    }

    pub(crate) fn write(&self) -> Result<RefMut<'_, Inner>> {
        self.inner.try_borrow_mut().map_err(|_| {
            CollectionError::invalid_state(format!(
                "collection '{}' is being traversed and cannot be modified",
                self.name()
            ))
            .into()
        })
    }

    /// Returns a non-owning handle
    pub fn downgrade(&self) -> WeakCollection {
        WeakCollection {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Returns true if both handles point to the same collection
    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of holders: handles, referencing parents and bound iterators
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    /// Returns true if more than one holder exists
    pub fn is_shared(&self) -> bool {
        self.ref_count() > 1
    }

    pub fn name(&self) -> String {
        match self.inner.try_borrow() {
            Ok(inner) => inner.name.clone(),
            Err(_) => String::new(),
        }
    }

    pub fn config(&self) -> Config {
        self.read().config
    }

    pub fn class(&self) -> u32 {
        self.read().class
    }

    pub fn set_class(&self, class: u32) -> Result<()> {
        self.write()?.class = class;
        Ok(())
    }

    /// Returns true if the collection is of the given class
    pub fn is_of_class(&self, class: u32) -> bool {
        self.class() == class
    }

    /// Number of top-level items; each sub-collection counts as one
    pub fn len(&self) -> usize {
        let inner = self.read();
        node::children(&inner.nodes, 0..inner.nodes.len()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().nodes.is_empty()
    }

    /// Item count including the header, each sub-collection counted once
    pub fn count(&self) -> usize {
        self.len() + 1
    }

    /// Adds a data item at the end of the collection or of `subcollection`.
    ///
    /// # Errors
    /// - `InvalidArgument` for a malformed name or a structural value
    /// - `NotFound` if `subcollection` does not exist
    /// - `InvalidState` if `subcollection` is reached through a reference
    /// - `ResourceExhausted` if the payload exceeds the configured limit
    pub fn add_property(
        &self,
        subcollection: Option<&str>,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<ItemRef> {
        self.insert_property(
            subcollection,
            Disposition::End,
            DupPolicy::NoCheck,
            name,
            value,
        )
    }

    /// Adds a string. See [`Value::string_with_len`] for the length rules.
    pub fn add_str(
        &self,
        subcollection: Option<&str>,
        name: &str,
        value: &str,
        length: usize,
    ) -> Result<ItemRef> {
        self.add_property(subcollection, name, Value::string_with_len(value, length))
    }

    pub fn add_binary(&self, subcollection: Option<&str>, name: &str, data: &[u8]) -> Result<ItemRef> {
        self.add_property(subcollection, name, data)
    }

    pub fn add_int(&self, subcollection: Option<&str>, name: &str, number: i32) -> Result<ItemRef> {
        self.add_property(subcollection, name, number)
    }

    pub fn add_unsigned(&self, subcollection: Option<&str>, name: &str, number: u32) -> Result<ItemRef> {
        self.add_property(subcollection, name, number)
    }

    pub fn add_long(&self, subcollection: Option<&str>, name: &str, number: i64) -> Result<ItemRef> {
        self.add_property(subcollection, name, number)
    }

    pub fn add_ulong(&self, subcollection: Option<&str>, name: &str, number: u64) -> Result<ItemRef> {
        self.add_property(subcollection, name, number)
    }

    pub fn add_double(&self, subcollection: Option<&str>, name: &str, number: f64) -> Result<ItemRef> {
        self.add_property(subcollection, name, number)
    }

    pub fn add_bool(&self, subcollection: Option<&str>, name: &str, logical: bool) -> Result<ItemRef> {
        self.add_property(subcollection, name, logical)
    }

    /// Finds an item by dotted path and replaces its kind and payload in place.
    ///
    /// Works through references, since the item keeps its position.
    pub fn update_property(
        &self,
        path: &str,
        value: impl Into<Value>,
        flags: TraverseFlags,
    ) -> Result<()> {
        let hit = self
            .locate(path, Kinds::ANY, flags)?
            .ok_or_else(|| CollectionError::not_found(path))?;
        ItemRef::new(hit.owner.downgrade(), hit.id).set_value(value)
    }

    /// Updates a string item using the length rules of [`Collection::add_str`]
    pub fn update_str(
        &self,
        path: &str,
        value: &str,
        length: usize,
        flags: TraverseFlags,
    ) -> Result<()> {
        self.update_property(path, Value::string_with_len(value, length), flags)
    }

    /// Attaches `child` under one of the three ownership modes.
    ///
    /// `as_name` defaults to the child's own name. On failure the parent is
    /// left exactly as it was.
    pub fn add_collection(
        &self,
        subcollection: Option<&str>,
        as_name: Option<&str>,
        mode: AddMode<'_>,
    ) -> Result<()> {
        match mode {
            AddMode::Reference(child) => self.add_reference(subcollection, as_name, child),
            AddMode::Embed(child) => self.embed(subcollection, as_name, child),
            AddMode::Clone(child) => self.add_clone(subcollection, as_name, child),
        }
    }

    /// Adds a reference item pointing at `child`.
    ///
    /// The parent becomes one more holder of `child`; both stay independently
    /// usable and destroyable.
    ///
    /// # Errors
    /// `InvalidArgument` if `child` already reaches this collection through
    /// its own references.
    pub fn add_reference(
        &self,
        subcollection: Option<&str>,
        as_name: Option<&str>,
        child: &Collection,
    ) -> Result<()> {
        let name = as_name.map_or_else(|| child.name(), str::to_string);
        validate_name(&name)?;
        if reaches(child, self) {
            warn!(parent = %self.name(), child = %child.name(), "Refusing reference cycle");
            return Err(CollectionError::invalid_argument(format!(
                "referencing '{}' would create a cycle",
                child.name()
            ))
            .into());
        }

        let level = self.edit_level(subcollection)?;
        let mut inner = self.write()?;
        let range = inner.level(level)?;
        debug!(parent = %inner.name, child = %child.name(), as_name = %name, "Adding collection by reference");
        inner
            .nodes
            .insert(range.end, Node::new(name, Value::Reference(child.clone())));
        Ok(())
    }

    /// Splices `child` into this collection, consuming the handle.
    ///
    /// On failure the parent is unchanged and the error carries the child
    /// handle back (see [`crate::Error::into_child`]).
    ///
    /// # Errors
    /// - `InvalidState` if `child` has other holders (other handles, a
    ///   referencing parent or a bound iterator)
    /// - `InvalidArgument` if `child` references this collection, directly
    ///   or through other references
    /// - `NotFound` if `subcollection` does not exist
    pub fn embed(
        &self,
        subcollection: Option<&str>,
        as_name: Option<&str>,
        child: Collection,
    ) -> Result<()> {
        let (name, level) = match self.embed_target(subcollection, as_name, &child) {
            Ok(target) => target,
            Err(error) => return Err(EmbedError::new(error, child).into()),
        };
        let mut inner = match self.write() {
            Ok(inner) => inner,
            Err(error) => return Err(EmbedError::new(error, child).into()),
        };
        let range = match inner.level(level) {
            Ok(range) => range,
            Err(error) => return Err(EmbedError::new(error, child).into()),
        };

        let holders = child.ref_count();
        let child_name = child.name();
        let embedded = match Rc::try_unwrap(child.inner) {
            Ok(cell) => cell.into_inner(),
            Err(shared) => {
                warn!(child = %child_name, holders, "Refusing to embed a shared collection");
                let error = CollectionError::invalid_state(format!(
                    "collection '{child_name}' has {holders} holders and cannot be embedded"
                ));
                return Err(EmbedError::new(error, Collection { inner: shared }).into());
            }
        };

        debug!(parent = %inner.name, child = %child_name, as_name = %name, "Embedding collection");
        let mut nodes = Vec::with_capacity(embedded.nodes.len() + 2);
        nodes.push(Node::open(name.as_str(), embedded.class));
        nodes.extend(embedded.nodes);
        nodes.push(Node::end(name));
        inner.nodes.splice(range.end..range.end, nodes);
        Ok(())
    }

    /// Checks everything about an embed that does not need the child's storage
    fn embed_target(
        &self,
        subcollection: Option<&str>,
        as_name: Option<&str>,
        child: &Collection,
    ) -> Result<(String, Option<ItemId>)> {
        let name = as_name.map_or_else(|| child.name(), str::to_string);
        validate_name(&name)?;
        if closes_cycle(&child.read().nodes, self) {
            warn!(parent = %self.name(), child = %child.name(), "Refusing to embed a reference cycle");
            return Err(CollectionError::invalid_argument(format!(
                "embedding '{}' would create a reference cycle",
                child.name()
            ))
            .into());
        }
        let level = self.edit_level(subcollection)?;
        Ok((name, level))
    }

    /// Embeds a deep copy of `child`; `child` itself is left untouched.
    ///
    /// Collections referenced by `child` are copied too, so the result shares
    /// nothing with the source.
    pub fn add_clone(
        &self,
        subcollection: Option<&str>,
        as_name: Option<&str>,
        child: &Collection,
    ) -> Result<()> {
        let name = as_name.map_or_else(|| child.name(), str::to_string);
        validate_name(&name)?;

        let mut nodes = vec![Node::open(name.as_str(), child.class())];
        copy_nodes(child, &mut nodes);
        nodes.push(Node::end(name.as_str()));

        let level = self.edit_level(subcollection)?;
        let mut inner = self.write()?;
        let range = inner.level(level)?;
        debug!(parent = %inner.name, child = %child.name(), as_name = %name, "Embedding collection copy");
        inner.nodes.splice(range.end..range.end, nodes);
        Ok(())
    }

    /// Creates an independent top-level copy of this collection.
    ///
    /// Referenced sub-collections become embedded copies.
    pub fn deep_copy(&self, name: Option<&str>) -> Result<Collection> {
        let name = name.map_or_else(|| self.name(), str::to_string);
        validate_name(&name)?;

        let mut nodes = Vec::new();
        copy_nodes(self, &mut nodes);
        let (class, config) = {
            let inner = self.read();
            (inner.class, inner.config)
        };
        debug!(source = %self.name(), copy = %name, "Copying collection");

        Ok(Self::from_inner(Inner {
            name,
            class,
            config,
            nodes,
        }))
    }

    /// Returns an owning handle to the referenced collection at `path`.
    ///
    /// The caller becomes one more holder and should drop the handle after
    /// use.
    ///
    /// # Errors
    /// - `NotFound` if no reference or sub-collection matches
    /// - `InvalidState` if the match is an embedded sub-collection, which has
    ///   no handle of its own
    pub fn get_collection_reference(&self, path: &str) -> Result<Collection> {
        let hit = self
            .locate(path, Kinds::REFERENCE | Kinds::COLLECTION, TraverseFlags::DEFAULT)?
            .ok_or_else(|| CollectionError::not_found(path))?;

        let inner = hit.owner.read();
        match inner.nodes.get(hit.index).map(Node::value) {
            Some(Value::Reference(target)) => {
                debug!(path, target = %target.name(), "Extracting collection reference");
                Ok(target.clone())
            }
            _ => Err(CollectionError::invalid_state(format!(
                "'{path}' is an embedded sub-collection and has no handle of its own"
            ))
            .into()),
        }
    }

    /// Resolves the level a structural edit addresses.
    ///
    /// `None` is the top level. A sub-collection path must name an embedded
    /// sub-collection owned by this collection.
    pub(crate) fn edit_level(&self, subcollection: Option<&str>) -> Result<Option<ItemId>> {
        let Some(path) = subcollection else {
            return Ok(None);
        };

        let hit = self
            .locate(path, Kinds::COLLECTION | Kinds::REFERENCE, TraverseFlags::DEFAULT)?
            .ok_or_else(|| CollectionError::not_found(path))?;

        if hit.via_reference || hit.kind == Kind::Reference {
            return Err(CollectionError::invalid_state(format!(
                "'{path}' is reached through a reference; edit it through its owning handle"
            ))
            .into());
        }
        Ok(Some(hit.id))
    }
}

/// Appends deep copies of every node of `source` to `out`, turning
/// references into embedded copies of their targets.
fn copy_nodes(source: &Collection, out: &mut Vec<Node>) {
    let inner = source.read();
    for node in &inner.nodes {
        match node.value() {
            Value::Reference(target) => {
                out.push(Node::open(node.name(), target.class()));
                copy_nodes(target, out);
                out.push(Node::end(node.name()));
            }
            _ => out.push(node.duplicate()),
        }
    }
}

/// Returns true if any reference among `nodes` leads back to `parent`.
pub(crate) fn closes_cycle(nodes: &[Node], parent: &Collection) -> bool {
    nodes.iter().any(|node| {
        node.value()
            .as_reference()
            .is_some_and(|target| reaches(target, parent))
    })
}

/// Returns true if `target` is `from` or is reachable through its references.
fn reaches(from: &Collection, target: &Collection) -> bool {
    from.ptr_eq(target) || closes_cycle(&from.read().nodes, target)
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Collection")
                .field("name", &inner.name)
                .field("class", &inner.class)
                .field("ref_count", &self.ref_count())
                .field("nodes", &inner.nodes.len())
                .finish(),
            Err(_) => f.debug_struct("Collection").finish_non_exhaustive(),
        }
    }
}
