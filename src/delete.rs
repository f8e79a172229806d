//! Bottom-up deletion of whole subtrees.
//!
//! The deleter collects the subtree with a [`Walk`], reverses it so leaves
//! come before their parents, and works through the list in passes. An item
//! that refuses deletion (typically a container that gained a child after
//! it was enumerated) is walked again; anything new found below it is queued
//! ahead of it for the next pass.
//!
//! Deletion is not transactional. An interrupted run can leave a partly
//! deleted subtree; running again is safe because absent nodes count as
//! deleted.
//!
//! Termination is bounded two ways: the run gives up after
//! `max_idle_passes` consecutive passes that delete nothing, and after
//! `max_passes` passes overall, so a subtree that is re-created forever
//! cannot hold the caller hostage.

use crate::address::Address;
use crate::key::{Key, Node};
use crate::store::NamespaceStore;
use crate::walk::Walk;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Tree deletion configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Only check that every node could be deleted; never mutate the store.
    pub preview: bool,

    /// Consecutive passes without a single deletion before giving up.
    pub max_idle_passes: usize,

    /// Upper bound on the total number of passes.
    pub max_passes: usize,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            preview: false,
            max_idle_passes: 1,
            max_passes: 64,
        }
    }
}

impl DeleteOptions {
    /// Creates the default options: real deletion, one idle pass, 64 passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets preview mode.
    pub fn preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    /// Sets how many passes without progress are tolerated.
    pub fn max_idle_passes(mut self, passes: usize) -> Self {
        self.max_idle_passes = passes.max(1);
        self
    }

    /// Sets the overall pass limit.
    pub fn max_passes(mut self, passes: usize) -> Self {
        self.max_passes = passes.max(1);
        self
    }
}

/// Outcome of a tree deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeleteReport {
    /// Nodes deleted (or found already absent), in deletion order.
    ///
    /// One entry per deletion: a node that is re-created and deleted again
    /// appears once for every time it went.
    pub deleted: Vec<Address>,

    /// Nodes left behind when the run stopped.
    pub failed: Vec<Address>,

    /// Number of passes made over the worklist.
    pub passes: usize,

    /// Whether this was a preview run.
    pub preview: bool,
}

impl DeleteReport {
    /// Returns true if nothing was left behind.
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Serializes the report as pretty-printed JSON.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Deletes subtrees children-first, retrying what could not be deleted yet.
pub struct TreeDeleter<'s, S: NamespaceStore + ?Sized> {
    store: &'s S,
    options: DeleteOptions,
}

impl<'s, S: NamespaceStore + ?Sized> TreeDeleter<'s, S> {
    /// Creates a deleter with default options.
    pub fn new(store: &'s S) -> Self {
        Self::with_options(store, DeleteOptions::default())
    }

    /// Creates a deleter with explicit options.
    pub fn with_options(store: &'s S, options: DeleteOptions) -> Self {
        Self { store, options }
    }

    /// Returns the options in effect.
    pub fn options(&self) -> &DeleteOptions {
        &self.options
    }

    /// Deletes `node` and everything below it.
    #[instrument(skip(self, node), fields(node = %node, preview = self.options.preview))]
    pub fn run(&self, node: &Key) -> DeleteReport {
        let preview = self.options.preview;
        let mut report = DeleteReport {
            preview,
            ..DeleteReport::default()
        };

        let mut worklist: Vec<Key> = std::iter::once(node.clone())
            .chain(Walk::new(self.store, node).nodes())
            .collect();
        worklist.reverse();
        let mut queued: HashSet<Address> =
            worklist.iter().map(|key| key.address().into_owned()).collect();
        debug!(items = worklist.len(), "Collected subtree");

        let mut idle = 0usize;
        while !worklist.is_empty() {
            if report.passes >= self.options.max_passes {
                warn!(passes = report.passes, remaining = worklist.len(), "Pass limit reached");
                break;
            }
            report.passes += 1;

            let mut progress = false;
            let mut remaining = Vec::new();
            for item in std::mem::take(&mut worklist) {
                let address = item.address().into_owned();
                if item.delete(self.store, preview) {
                    queued.remove(&address);
                    report.deleted.push(address);
                    progress = true;
                    continue;
                }

                if !preview {
                    let fresh: Vec<Key> = Walk::new(self.store, &item)
                        .nodes()
                        .filter(|key| !queued.contains(&*key.address()))
                        .collect();
                    if !fresh.is_empty() {
                        debug!(key = %address, found = fresh.len(), "Rediscovered descendants");
                    }
                    for key in fresh.into_iter().rev() {
                        queued.insert(key.address().into_owned());
                        remaining.push(key);
                    }
                }
                remaining.push(item);
            }
            worklist = remaining;

            if preview {
                break;
            }
            if progress {
                idle = 0;
            } else {
                idle += 1;
                if idle >= self.options.max_idle_passes {
                    warn!(passes = report.passes, remaining = worklist.len(), "No progress, giving up");
                    break;
                }
            }
        }

        report.failed = worklist
            .iter()
            .map(|key| key.address().into_owned())
            .collect();

        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            passes = report.passes,
            "Tree deletion finished"
        );
        report
    }
}

/// Deletes `node` and its subtree; returns true if nothing was left behind.
///
/// With `preview` set, no mutating store call is made and the result says
/// whether the whole subtree could be deleted.
pub fn delete_tree<S: NamespaceStore + ?Sized>(store: &S, node: &Key, preview: bool) -> bool {
    TreeDeleter::with_options(store, DeleteOptions::new().preview(preview))
        .run(node)
        .success()
}
