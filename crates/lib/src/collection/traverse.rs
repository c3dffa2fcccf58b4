//! Depth-first traversal and dotted-path search.
//!
//! The walk visits items in sequence order, descending into embedded
//! sub-collections and, unless told otherwise, into referenced collections.
//! The top-level header is not visited. Each visited item carries the chain
//! of open ancestor names, starting with the top-level collection's own name,
//! which is what dotted paths are matched against.

use std::ops::ControlFlow;

use bitflags::bitflags;

use crate::{
    Result,
    collection::{
        Collection, CollectionError, DottedPath, ItemId, ItemRef,
        node::{Node, span_end},
        value::{Kind, Kinds, Value},
    },
};

bitflags! {
    /// Modifiers for traversal, search and iteration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TraverseFlags: u32 {
        /// Full depth-first walk
        const DEFAULT = 0;
        /// Report sub-collection headers but do not descend into them
        const ONE_LEVEL = 0x1;
        /// Also report the end marker of every nested sub-collection
        const END = 0x2;
        /// Skip sub-collections and references entirely
        const IGNORE = 0x4;
        /// Flatten nested levels into one; not supported
        const FLAT = 0x8;
    }
}

impl TraverseFlags {
    pub(crate) fn check(self) -> std::result::Result<(), CollectionError> {
        if self.contains(TraverseFlags::FLAT) {
            return Err(CollectionError::Unsupported {
                operation: "flattened traversal".to_string(),
            });
        }
        Ok(())
    }
}

/// One step of the walk as seen by internal visitors.
pub(crate) struct Visit<'a> {
    pub(crate) node: &'a Node,
    /// Collection whose sequence holds `node`
    pub(crate) owner: &'a Collection,
    pub(crate) index: usize,
    pub(crate) ancestors: &'a [String],
    /// True when `owner` was entered through a reference item
    pub(crate) via_reference: bool,
}

type Visitor<'f> = dyn FnMut(&Visit<'_>) -> ControlFlow<()> + 'f;

pub(crate) fn walk(
    collection: &Collection,
    flags: TraverseFlags,
    ancestors: &mut Vec<String>,
    via_reference: bool,
    visit: &mut Visitor<'_>,
) -> ControlFlow<()> {
    let inner = collection.read();
    let nodes = &inner.nodes;
    let mut index = 0;

    while index < nodes.len() {
        let node = &nodes[index];
        match node.value() {
            Value::Collection(_) => {
                if flags.contains(TraverseFlags::IGNORE) {
                    index = span_end(nodes, index);
                    continue;
                }
                visit(&Visit {
                    node,
                    owner: collection,
                    index,
                    ancestors,
                    via_reference,
                })?;
                if flags.contains(TraverseFlags::ONE_LEVEL) {
                    index = span_end(nodes, index);
                    continue;
                }
                ancestors.push(node.name().to_string());
            }
            Value::End => {
                ancestors.pop();
                if flags.contains(TraverseFlags::END) {
                    visit(&Visit {
                        node,
                        owner: collection,
                        index,
                        ancestors,
                        via_reference,
                    })?;
                }
            }
            Value::Reference(target) => {
                if !flags.contains(TraverseFlags::IGNORE) {
                    visit(&Visit {
                        node,
                        owner: collection,
                        index,
                        ancestors,
                        via_reference,
                    })?;

                    if !flags.contains(TraverseFlags::ONE_LEVEL) {
                        ancestors.push(node.name().to_string());
                        walk(target, flags, ancestors, true, visit)?;
                        ancestors.pop();

                        if flags.contains(TraverseFlags::END) {
                            let end = Node::end_of(node);
                            visit(&Visit {
                                node: &end,
                                owner: collection,
                                index,
                                ancestors,
                                via_reference,
                            })?;
                        }
                    }
                }
            }
            _ => visit(&Visit {
                node,
                owner: collection,
                index,
                ancestors,
                via_reference,
            })?,
        }
        index += 1;
    }

    ControlFlow::Continue(())
}

/// Location of a search match.
pub(crate) struct Hit {
    pub(crate) owner: Collection,
    pub(crate) index: usize,
    pub(crate) id: ItemId,
    pub(crate) kind: Kind,
    pub(crate) via_reference: bool,
}

impl Collection {
    /// Calls `f` for every item in depth-first order.
    ///
    /// Returning [`ControlFlow::Break`] stops the walk early; that is not an
    /// error. The collection cannot be modified from inside `f`: any attempt
    /// fails with `InvalidState`.
    ///
    /// # Errors
    /// `Unsupported` for [`TraverseFlags::FLAT`].
    pub fn traverse<F>(&self, flags: TraverseFlags, mut f: F) -> Result<()>
    where
        F: FnMut(&Node) -> ControlFlow<()>,
    {
        flags.check()?;
        let mut ancestors = vec![self.name()];
        let _ = walk(self, flags, &mut ancestors, false, &mut |step| f(step.node));
        Ok(())
    }

    /// First item, in traversal order, whose name and ancestors match `path`
    /// and whose kind is in `kinds`.
    pub(crate) fn locate(&self, path: &str, kinds: Kinds, flags: TraverseFlags) -> Result<Option<Hit>> {
        flags.check()?;
        let path = DottedPath::parse(path)?;
        let mut found = None;
        let mut ancestors = vec![self.name()];

        let _ = walk(self, flags, &mut ancestors, false, &mut |step| {
            let kind = step.node.kind();
            if kind != Kind::End
                && kinds.matches(kind)
                && path.matches(step.node.name(), step.ancestors)
            {
                found = Some(Hit {
                    owner: step.owner.clone(),
                    index: step.index,
                    id: step.node.id(),
                    kind,
                    via_reference: step.via_reference,
                });
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        });

        Ok(found)
    }

    /// Finds the first item matching `path` and calls `f` on it.
    ///
    /// Returns `Ok(false)` without calling `f` when nothing matches.
    pub fn search<F>(&self, path: &str, kinds: Kinds, flags: TraverseFlags, f: F) -> Result<bool>
    where
        F: FnOnce(&Node),
    {
        let Some(hit) = self.locate(path, kinds, flags)? else {
            return Ok(false);
        };
        let inner = hit.owner.read();
        match inner.nodes.get(hit.index) {
            Some(node) => {
                f(node);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns a handle to the first item matching `path`.
    ///
    /// Absence is `Ok(None)`, not an error.
    pub fn get_item(&self, path: &str, kinds: Kinds, flags: TraverseFlags) -> Result<Option<ItemRef>> {
        Ok(self
            .locate(path, kinds, flags)?
            .map(|hit| ItemRef::new(hit.owner.downgrade(), hit.id)))
    }

    /// Returns a copy of the value of the first item of any kind matching `path`
    pub fn get_value(&self, path: &str) -> Result<Option<Value>> {
        let mut value = None;
        self.search(path, Kinds::ANY, TraverseFlags::DEFAULT, |node| {
            value = Some(node.value().clone());
        })?;
        Ok(value)
    }

    /// Returns true if an item matching `path` and `kinds` exists
    pub fn contains(&self, path: &str, kinds: Kinds, flags: TraverseFlags) -> Result<bool> {
        Ok(self.locate(path, kinds, flags)?.is_some())
    }
}
