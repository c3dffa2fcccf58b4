//! Positional insert and extract.
//!
//! A [`Disposition`] addresses a slot among the direct children of one level.
//! Inserting resolves it to the gap the new item goes into; extracting
//! resolves it to the child that comes out. Every embedded sub-collection is
//! a single child and moves as a whole span.
//!
//! Duplicate handling on insert is chosen with a [`DupPolicy`]. Duplicates
//! are looked up among the direct children of the target level by the name
//! of the item being inserted.

use std::{fmt, ops::Range};

use tracing::trace;

use crate::{
    Result,
    collection::{
        Collection, CollectionError, ItemId, ItemRef, closes_cycle,
        node::{Item, Node, children, position_of, span_end},
        path::validate_name,
        traverse::TraverseFlags,
        value::{Kinds, Value},
    },
};

/// Where an item goes on insert, or which item comes out on extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition<'a> {
    /// After the last child / the last child
    End,
    /// Before the first child / the first child
    Front,
    /// Before / the child preceding the first child with this name
    Before(&'a str),
    /// After / the child following the first child with this name
    After(&'a str),
    /// At / the child at this zero-based position; insert appends when past the end
    Index(usize),
    /// Before / the first child of the run with this name
    FirstDup(&'a str),
    /// After / the last child of the run with this name
    LastDup(&'a str),
    /// At / the n-th child (zero-based) of the run with this name.
    /// Insert appends after the run when `n` is past it.
    NDup(&'a str, usize),
}

impl<'a> Disposition<'a> {
    /// Name of the duplicate run a dup disposition addresses.
    ///
    /// On insert the run must be the inserted item's own: an item only ever
    /// joins a run of items with its name.
    pub fn run_name(&self) -> Option<&'a str> {
        match *self {
            Disposition::FirstDup(name)
            | Disposition::LastDup(name)
            | Disposition::NDup(name, _) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Disposition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Disposition::End => f.write_str("end"),
            Disposition::Front => f.write_str("front"),
            Disposition::Before(name) => write!(f, "before '{name}'"),
            Disposition::After(name) => write!(f, "after '{name}'"),
            Disposition::Index(index) => write!(f, "index {index}"),
            Disposition::FirstDup(name) => write!(f, "first '{name}'"),
            Disposition::LastDup(name) => write!(f, "last '{name}'"),
            Disposition::NDup(name, n) => write!(f, "duplicate {n} of '{name}'"),
        }
    }
}

/// What to do when the target level already holds an item with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DupPolicy {
    /// Insert without looking for duplicates
    #[default]
    NoCheck,
    /// Replace the existing item in place
    OverwriteOnName,
    /// Replace the existing item in place if it also has the same kind
    OverwriteOnNameAndType,
    /// Fail with `AlreadyExists`
    ErrorOnName,
    /// Fail with `AlreadyExists` if the existing item also has the same kind
    ErrorOnNameAndType,
    /// Remove the existing item, then insert at the requested position
    MoveOnName,
    /// Like `MoveOnName`, restricted to items of the same kind
    MoveOnNameAndType,
}

impl DupPolicy {
    fn checks_type(self) -> bool {
        matches!(
            self,
            DupPolicy::OverwriteOnNameAndType
                | DupPolicy::ErrorOnNameAndType
                | DupPolicy::MoveOnNameAndType
        )
    }
}

type Resolved<T> = std::result::Result<T, CollectionError>;

fn find_child(nodes: &[Node], kids: &[Range<usize>], name: &str) -> Resolved<usize> {
    kids.iter()
        .position(|span| nodes[span.start].name() == name)
        .ok_or_else(|| CollectionError::not_found(name))
}

/// Indexes (into `kids`) of the first run of consecutive children named `name`
fn dup_run(nodes: &[Node], kids: &[Range<usize>], name: &str) -> Resolved<Range<usize>> {
    let first = find_child(nodes, kids, name)?;
    let length = kids[first..]
        .iter()
        .take_while(|span| nodes[span.start].name() == name)
        .count();
    Ok(first..first + length)
}

/// Resolves `disposition` to the sequence index a new item is spliced at.
pub(crate) fn insert_position(
    nodes: &[Node],
    level: Range<usize>,
    disposition: Disposition<'_>,
) -> Resolved<usize> {
    let kids = children(nodes, level.clone());
    let position = match disposition {
        Disposition::End => level.end,
        Disposition::Front => level.start,
        Disposition::Before(name) => kids[find_child(nodes, &kids, name)?].start,
        Disposition::After(name) => kids[find_child(nodes, &kids, name)?].end,
        Disposition::Index(index) => kids.get(index).map_or(level.end, |span| span.start),
        Disposition::FirstDup(name) => kids[dup_run(nodes, &kids, name)?.start].start,
        Disposition::LastDup(name) => kids[dup_run(nodes, &kids, name)?.end - 1].end,
        Disposition::NDup(name, n) => {
            let run = dup_run(nodes, &kids, name)?;
            if n < run.len() {
                kids[run.start + n].start
            } else {
                kids[run.end - 1].end
            }
        }
    };
    Ok(position)
}

/// Resolves `disposition` to the span of the child to extract.
pub(crate) fn extract_span(
    nodes: &[Node],
    level: Range<usize>,
    disposition: Disposition<'_>,
    kinds: Kinds,
) -> Resolved<Range<usize>> {
    let kids = children(nodes, level);
    let index = match disposition {
        Disposition::End => kids.len().checked_sub(1),
        Disposition::Front => (!kids.is_empty()).then_some(0),
        Disposition::Before(name) => find_child(nodes, &kids, name)?.checked_sub(1),
        Disposition::After(name) => {
            Some(find_child(nodes, &kids, name)? + 1).filter(|&next| next < kids.len())
        }
        Disposition::Index(index) => (index < kids.len()).then_some(index),
        Disposition::FirstDup(name) => Some(dup_run(nodes, &kids, name)?.start),
        Disposition::LastDup(name) => Some(dup_run(nodes, &kids, name)?.end - 1),
        Disposition::NDup(name, n) => {
            let run = dup_run(nodes, &kids, name)?;
            (n < run.len()).then_some(run.start + n)
        }
    }
    .ok_or_else(|| CollectionError::not_found(disposition.to_string()))?;

    let span = kids[index].clone();
    let kind = nodes[span.start].kind();
    if !kinds.matches(kind) {
        return Err(CollectionError::TypeMismatch {
            expected: format!("{kinds:?}"),
            actual: kind.name().to_string(),
        });
    }
    Ok(span)
}

/// Splices `item` into `level` according to `disposition` and `policy`.
/// Returns the id of the inserted head node.
fn splice_item(
    nodes: &mut Vec<Node>,
    level: Range<usize>,
    mut item: Item,
    disposition: Disposition<'_>,
    policy: DupPolicy,
) -> Resolved<ItemId> {
    let name = item.name().to_string();
    let kind = item.kind();

    if disposition.run_name().is_some_and(|run| run != name) {
        return Err(CollectionError::invalid_argument(format!(
            "'{name}' cannot be placed at {disposition}; it only joins its own run"
        )));
    }

    let existing = if policy == DupPolicy::NoCheck {
        None
    } else {
        children(nodes, level.clone()).into_iter().find(|span| {
            let head = &nodes[span.start];
            head.name() == name && (!policy.checks_type() || head.kind() == kind)
        })
    };

    if let Some(span) = existing {
        let id = nodes[span.start].id();
        match policy {
            DupPolicy::ErrorOnName | DupPolicy::ErrorOnNameAndType => {
                return Err(CollectionError::AlreadyExists { name });
            }
            DupPolicy::OverwriteOnName | DupPolicy::OverwriteOnNameAndType => {
                item.nodes_mut()[0].set_id(id);
                trace!(item = %name, "Overwriting duplicate in place");
                nodes.splice(span, item.into_nodes());
                return Ok(id);
            }
            DupPolicy::MoveOnName | DupPolicy::MoveOnNameAndType => {
                let removed: Vec<Node> = nodes.drain(span.clone()).collect();
                let shrunk = level.start..level.end - removed.len();
                return match insert_position(nodes, shrunk, disposition) {
                    Ok(at) => {
                        item.nodes_mut()[0].set_id(id);
                        trace!(item = %name, position = at, "Moving duplicate");
                        nodes.splice(at..at, item.into_nodes());
                        Ok(id)
                    }
                    Err(err) => {
                        nodes.splice(span.start..span.start, removed);
                        Err(err)
                    }
                };
            }
            DupPolicy::NoCheck => {}
        }
    }

    let at = insert_position(nodes, level, disposition)?;
    let id = item.id();
    trace!(item = %name, position = at, "Inserting item");
    nodes.splice(at..at, item.into_nodes());
    Ok(id)
}

impl Collection {
    /// Inserts a detached item into this collection or one of its embedded
    /// sub-collections.
    ///
    /// On success the item is owned by the collection and a handle to it is
    /// returned. On failure the collection is unchanged and the item is
    /// dropped.
    ///
    /// # Errors
    /// - `NotFound` if `subcollection` or the disposition's anchor is missing
    /// - `InvalidState` if `subcollection` is reached through a reference
    /// - `AlreadyExists` from the error duplicate policies
    /// - `ResourceExhausted` if a payload exceeds this collection's limit
    /// - `InvalidArgument` if the item would introduce a reference cycle, or a
    ///   dup disposition names a run other than the item's own
    pub fn insert(
        &self,
        subcollection: Option<&str>,
        item: Item,
        disposition: Disposition<'_>,
        policy: DupPolicy,
    ) -> Result<ItemRef> {
        let limit = self.config().max_data;
        for node in item.nodes() {
            node.value().check_size(limit)?;
        }
        if closes_cycle(item.nodes(), self) {
            return Err(CollectionError::invalid_argument(format!(
                "inserting '{}' would create a reference cycle",
                item.name()
            ))
            .into());
        }

        let level = self.edit_level(subcollection)?;
        let mut inner = self.write()?;
        let range = inner.level(level)?;
        let id = splice_item(&mut inner.nodes, range, item, disposition, policy)?;
        Ok(ItemRef::new(self.downgrade(), id))
    }

    /// Builds a data item and inserts it, see [`Collection::insert`].
    pub fn insert_property(
        &self,
        subcollection: Option<&str>,
        disposition: Disposition<'_>,
        policy: DupPolicy,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<ItemRef> {
        validate_name(name)?;
        let value = value.into();
        if !value.is_data() {
            return Err(CollectionError::invalid_argument(format!(
                "'{}' values are added with add_collection",
                value.kind()
            ))
            .into());
        }
        self.insert(
            subcollection,
            Item::from_nodes(vec![Node::new(name, value)]),
            disposition,
            policy,
        )
    }

    /// Detaches a direct child of this collection or of `subcollection`.
    ///
    /// Extracting a sub-collection detaches its whole span.
    ///
    /// # Errors
    /// - `NotFound` if the disposition addresses no child
    /// - `TypeMismatch` if the addressed child is not in `kinds`
    /// - `InvalidState` if `subcollection` is reached through a reference
    pub fn extract(
        &self,
        subcollection: Option<&str>,
        disposition: Disposition<'_>,
        kinds: Kinds,
    ) -> Result<Item> {
        let level = self.edit_level(subcollection)?;
        let mut inner = self.write()?;
        let range = inner.level(level)?;
        let span = extract_span(&inner.nodes, range, disposition, kinds)?;
        let nodes: Vec<Node> = inner.nodes.drain(span).collect();
        let item = Item::from_nodes(nodes);
        trace!(item = %item.name(), %disposition, "Extracted item");
        Ok(item)
    }

    /// Extracts and discards a child
    pub fn remove(
        &self,
        subcollection: Option<&str>,
        disposition: Disposition<'_>,
        kinds: Kinds,
    ) -> Result<()> {
        self.extract(subcollection, disposition, kinds).map(drop)
    }

    /// Deletes the first item matching `path`, with its span if it is a
    /// sub-collection.
    ///
    /// # Errors
    /// - `NotFound` if nothing matches
    /// - `InvalidState` if the match lives in a referenced collection
    pub fn delete_property(&self, path: &str, kinds: Kinds, flags: TraverseFlags) -> Result<()> {
        let hit = self
            .locate(path, kinds, flags)?
            .ok_or_else(|| CollectionError::not_found(path))?;
        if hit.via_reference {
            return Err(CollectionError::invalid_state(format!(
                "'{path}' lives in a referenced collection; delete it through its owning handle"
            ))
            .into());
        }

        let mut inner = self.write()?;
        let start =
            position_of(&inner.nodes, hit.id).ok_or_else(|| CollectionError::not_found(path))?;
        let end = span_end(&inner.nodes, start);
        let removed: Vec<Node> = inner.nodes.drain(start..end).collect();
        trace!(path, removed = removed.len(), "Deleted item");
        Ok(())
    }
}
