//! Stateful iteration over a collection.
//!
//! A [`CollectionIter`] yields the same items a traversal with the same
//! flags would visit, one at a time, and can abandon any number of enclosing
//! sub-collections with [`CollectionIter::jump_up`]. A bound iterator is a
//! holder of the collection: it stays valid if the caller drops its own
//! handle, and releases its hold on [`CollectionIter::unbind`] or drop.
//!
//! Unlike a traversal, the collection may be modified between calls to
//! `next`. The iterator keeps its place by the id of the last item it
//! returned, so edits elsewhere in the sequence do not make it skip or
//! repeat items.

use std::fmt;

use tracing::{debug, trace};

use crate::{
    Result,
    collection::{
        Collection, CollectionError, ItemId, ItemRef,
        node::{Node, position_of, span_end},
        traverse::TraverseFlags,
        value::Value,
    },
};

struct Frame {
    collection: Collection,
    position: usize,
    last: Option<ItemId>,
    /// Node that followed `last` when it was returned
    upcoming: Option<ItemId>,
    /// End marker reported when a referenced collection is exhausted
    closing: Option<Node>,
}

impl Frame {
    fn new(collection: Collection, closing: Option<Node>) -> Self {
        Self {
            collection,
            position: 0,
            last: None,
            upcoming: None,
            closing,
        }
    }

    /// Where to continue after the sequence was edited since the last step.
    ///
    /// If the last returned item is gone, the node that followed it is next.
    /// `None` keeps the current position.
    fn resynced(&self, nodes: &[Node]) -> Option<usize> {
        let last = self.last?;
        let in_place = self
            .position
            .checked_sub(1)
            .and_then(|index| nodes.get(index))
            .is_some_and(|node| node.id() == last);
        if in_place {
            return None;
        }
        match position_of(nodes, last) {
            Some(index) => Some(index + 1),
            None => self.upcoming.and_then(|next| position_of(nodes, next)),
        }
    }

    /// Returns the next node of this frame and advances past it, skipping the
    /// rest of a sub-collection span when `skip_spans` is set.
    fn step(&mut self, skip_spans: bool) -> Option<Node> {
        let inner = self.collection.read();
        let nodes = &inner.nodes;

        if let Some(position) = self.resynced(nodes) {
            self.position = position;
        }
        self.position = self.position.min(nodes.len());

        let node = nodes.get(self.position)?;
        let next = if skip_spans && matches!(node.value(), Value::Collection(_)) {
            span_end(nodes, self.position)
        } else {
            self.position + 1
        };
        self.position = next;
        self.last = nodes.get(next - 1).map(Node::id);
        self.upcoming = nodes.get(next).map(Node::id);
        Some(node.clone())
    }
}

/// One open level on the iterator's ancestor stack
enum Level {
    /// Embedded sub-collection, identified by its opening marker
    Embedded(ItemId),
    /// Referenced collection, which has a frame of its own
    Referenced,
}

/// Iterator bound to a collection.
///
/// ```
/// use proptree::{Collection, TraverseFlags};
///
/// let event = Collection::new("event", 0)?;
/// event.add_int(None, "id", 1)?;
/// let names: Vec<String> = event
///     .iter(TraverseFlags::DEFAULT)?
///     .map(|node| node.name().to_string())
///     .collect();
/// assert_eq!(names, vec!["id"]);
/// # Ok::<(), proptree::Error>(())
/// ```
pub struct CollectionIter {
    frames: Vec<Frame>,
    levels: Vec<Level>,
    flags: TraverseFlags,
    block: usize,
    current: Option<ItemRef>,
    done: bool,
}

impl Collection {
    /// Binds a new iterator to this collection.
    ///
    /// # Errors
    /// `Unsupported` for [`TraverseFlags::FLAT`].
    pub fn iter(&self, flags: TraverseFlags) -> Result<CollectionIter> {
        flags.check()?;
        let block = self.config().stack_depth_block;
        debug!(name = %self.name(), ?flags, "Binding iterator");

        Ok(CollectionIter {
            frames: vec![Frame::new(self.clone(), None)],
            levels: Vec::with_capacity(block),
            flags,
            block,
            current: None,
            done: false,
        })
    }
}

impl CollectionIter {
    /// Number of sub-collections the last returned item is nested in
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Handle to the item most recently returned by `next`
    pub fn current(&self) -> Option<&ItemRef> {
        self.current.as_ref()
    }

    /// Returns true once the iterator has run off the end
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Abandons the `levels` innermost open sub-collections.
    ///
    /// The next call to `next` continues with the item after the outermost
    /// abandoned sub-collection. Zero is a no-op.
    ///
    /// # Errors
    /// `InvalidArgument` if `levels` exceeds the current depth.
    pub fn jump_up(&mut self, levels: usize) -> Result<()> {
        if levels == 0 {
            return Ok(());
        }
        if levels > self.levels.len() {
            return Err(CollectionError::invalid_argument(format!(
                "cannot jump up {levels} levels from depth {}",
                self.levels.len()
            ))
            .into());
        }

        for _ in 0..levels {
            match self.levels.pop() {
                Some(Level::Referenced) => {
                    self.frames.pop();
                }
                Some(Level::Embedded(open)) => {
                    if let Some(frame) = self.frames.last_mut() {
                        let inner = frame.collection.read();
                        if let Some(index) = position_of(&inner.nodes, open) {
                            let end = span_end(&inner.nodes, index);
                            frame.position = end;
                            frame.last = inner.nodes.get(end - 1).map(Node::id);
                            frame.upcoming = inner.nodes.get(end).map(Node::id);
                        }
                    }
                }
                None => break,
            }
        }
        trace!(levels, depth = self.levels.len(), "Jumped up");
        Ok(())
    }

    /// Releases the iterator's hold on the collection
    pub fn unbind(self) {
        if let Some(frame) = self.frames.first() {
            debug!(name = %frame.collection.name(), "Unbinding iterator");
        }
    }

    fn push_level(&mut self, level: Level) {
        if self.levels.len() == self.levels.capacity() {
            self.levels.reserve_exact(self.block);
        }
        self.levels.push(level);
    }
}

impl fmt::Debug for CollectionIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionIter")
            .field("depth", &self.levels.len())
            .field("flags", &self.flags)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl Iterator for CollectionIter {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let skip_spans = self
            .flags
            .intersects(TraverseFlags::ONE_LEVEL | TraverseFlags::IGNORE);

        loop {
            if self.done {
                return None;
            }
            let frame = self.frames.last_mut()?;
            let owner = frame.collection.downgrade();

            let Some(node) = frame.step(skip_spans) else {
                if self.frames.len() == 1 {
                    self.done = true;
                    self.current = None;
                    return None;
                }
                let closing = self.frames.pop().and_then(|frame| frame.closing);
                self.levels.pop();
                match closing {
                    Some(end) if self.flags.contains(TraverseFlags::END) => {
                        if let Some(parent) = self.frames.last() {
                            self.current = Some(ItemRef::new(parent.collection.downgrade(), end.id()));
                        }
                        return Some(end);
                    }
                    _ => continue,
                }
            };

            match node.value() {
                Value::Collection(_) => {
                    if self.flags.contains(TraverseFlags::IGNORE) {
                        continue;
                    }
                    if !self.flags.contains(TraverseFlags::ONE_LEVEL) {
                        self.push_level(Level::Embedded(node.id()));
                    }
                }
                Value::End => {
                    self.levels.pop();
                    if !self.flags.contains(TraverseFlags::END) {
                        continue;
                    }
                }
                Value::Reference(target) => {
                    if self.flags.contains(TraverseFlags::IGNORE) {
                        continue;
                    }
                    if !self.flags.contains(TraverseFlags::ONE_LEVEL) {
                        let frame = Frame::new(target.clone(), Some(Node::end_of(&node)));
                        self.push_level(Level::Referenced);
                        self.frames.push(frame);
                    }
                }
                _ => {}
            }

            self.current = Some(ItemRef::new(owner, node.id()));
            return Some(node);
        }
    }
}
