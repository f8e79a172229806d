//! Lazy depth-first traversal of the namespace.
//!
//! A [`Walk`] visits every descendant of a starting node. At each level the
//! entries come first, then each child container followed by its own
//! descendants. Children are read from the store only when the walk reaches
//! them, so a walk reflects concurrent changes and cannot be restarted; walk
//! again to re-enumerate.
//!
//! A branch that cannot be read (access denied or any other store failure)
//! ends that branch only. The walk reports it as [`WalkEntry::Skipped`] and
//! carries on with the siblings. [`Walk::nodes`] drops those markers for
//! callers that only want the reachable nodes.

use crate::address::Address;
use crate::error::RegistryError;
use crate::key::{ContainerKey, EntryKey, Key, Node};
use crate::store::NamespaceStore;
use std::collections::VecDeque;
use tracing::debug;

/// One step of a walk.
#[derive(Debug)]
pub enum WalkEntry {
    /// A reachable node at `depth` (1 for the starting node's children).
    Node {
        /// The node visited.
        key: Key,
        /// Distance from the starting node.
        depth: usize,
    },

    /// A container whose children could not be read.
    Skipped {
        /// Address of the unreadable container.
        address: Address,
        /// Distance from the starting node (0 for the starting node itself).
        depth: usize,
        /// Why the children could not be read.
        error: RegistryError,
    },
}

impl WalkEntry {
    /// Returns the visited node, if this is not a skip marker.
    pub fn key(&self) -> Option<&Key> {
        match self {
            WalkEntry::Node { key, .. } => Some(key),
            WalkEntry::Skipped { .. } => None,
        }
    }

    /// Consumes the entry, returning the visited node.
    pub fn into_key(self) -> Option<Key> {
        match self {
            WalkEntry::Node { key, .. } => Some(key),
            WalkEntry::Skipped { .. } => None,
        }
    }

    /// Returns the depth of this step.
    pub fn depth(&self) -> usize {
        match self {
            WalkEntry::Node { depth, .. } | WalkEntry::Skipped { depth, .. } => *depth,
        }
    }

    /// Returns true for skip markers.
    pub fn is_skipped(&self) -> bool {
        matches!(self, WalkEntry::Skipped { .. })
    }
}

/// Walk configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Deepest level to visit; `None` walks the whole subtree.
    pub max_depth: Option<usize>,
}

impl WalkOptions {
    /// Creates options that walk the whole subtree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the walk to `depth` levels below the starting node.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

/// Children of one container still waiting to be visited.
struct Frame {
    entries: VecDeque<EntryKey>,
    containers: VecDeque<ContainerKey>,
    depth: usize,
}

/// Lazy iterator over the descendants of a node.
pub struct Walk<'s, S: NamespaceStore + ?Sized> {
    store: &'s S,
    options: WalkOptions,
    stack: Vec<Frame>,
    pending: Option<(Key, usize)>,
}

impl<'s, S: NamespaceStore + ?Sized> Walk<'s, S> {
    /// Starts a walk below `node`. Nothing is read until the first step.
    pub fn new(store: &'s S, node: &Key) -> Self {
        Self::with_options(store, node, WalkOptions::default())
    }

    /// Starts a walk below `node` with explicit options.
    pub fn with_options(store: &'s S, node: &Key, options: WalkOptions) -> Self {
        Self {
            store,
            options,
            stack: Vec::new(),
            pending: Some((node.clone(), 1)),
        }
    }

    /// Drops skip markers, yielding only reachable nodes.
    pub fn nodes(self) -> Nodes<'s, S> {
        Nodes { inner: self }
    }

    /// Reads the children of `node` into a new frame at `depth`.
    fn expand(&mut self, node: Key, depth: usize) -> Option<WalkEntry> {
        if node.is_entry() {
            return None;
        }
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return None;
        }

        match node.children(self.store) {
            Ok(children) => {
                let mut frame = Frame {
                    entries: VecDeque::new(),
                    containers: VecDeque::new(),
                    depth,
                };
                for child in children {
                    match child {
                        Key::Entry(entry) => frame.entries.push_back(entry),
                        Key::Container(container) => frame.containers.push_back(container),
                        Key::Root(_) => {}
                    }
                }
                self.stack.push(frame);
                None
            }
            Err(error) => {
                let address = node.address().into_owned();
                debug!(key = %address, error = %error, "Skipping unreadable branch");
                Some(WalkEntry::Skipped {
                    address,
                    depth: depth - 1,
                    error,
                })
            }
        }
    }
}

impl<'s, S: NamespaceStore + ?Sized> Iterator for Walk<'s, S> {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((node, depth)) = self.pending.take() {
                if let Some(skipped) = self.expand(node, depth) {
                    return Some(skipped);
                }
            }

            let frame = self.stack.last_mut()?;
            let depth = frame.depth;

            if let Some(entry) = frame.entries.pop_front() {
                return Some(WalkEntry::Node {
                    key: Key::Entry(entry),
                    depth,
                });
            }

            if let Some(container) = frame.containers.pop_front() {
                let key = Key::Container(container);
                self.pending = Some((key.clone(), depth + 1));
                return Some(WalkEntry::Node { key, depth });
            }

            self.stack.pop();
        }
    }
}

/// Iterator over the reachable nodes of a [`Walk`].
pub struct Nodes<'s, S: NamespaceStore + ?Sized> {
    inner: Walk<'s, S>,
}

impl<'s, S: NamespaceStore + ?Sized> Iterator for Nodes<'s, S> {
    type Item = Key;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.by_ref().find_map(WalkEntry::into_key)
    }
}

/// Walks the descendants of `node`.
pub fn walk<'s, S: NamespaceStore + ?Sized>(store: &'s S, node: &Key) -> Walk<'s, S> {
    Walk::new(store, node)
}
