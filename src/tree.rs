//! Filepath: src/tree.rs
//! `TagTree` - a concurrent, order-preserving, type-tagged key/value
//! container.
//!
//! This module provides the main [`TagTree<V>`] type: a 2-3-4 balanced
//! tree parameterized by `order` (up to `order` entries and `order + 1`
//! children per node).
//!
//! # Locking protocol
//!
//! Two layers of locks:
//!
//! - The tree-wide structural lock guards the root pointer. Any mutation
//!   that can reshape the tree (create, delete, destroy paths) holds its
//!   write guard end to end; lookups and scans hold its read guard only
//!   long enough to pin the root node.
//! - Each node carries its own reader/writer lock. Traversal is
//!   hand-over-hand: a node's lock is released only once the child lock it
//!   hands off to is already held, so a reader never observes a node
//!   mid-split or mid-merge. Writers descend acquiring write guards in
//!   root-to-leaf order (and left-to-right across sibling pairs), which
//!   drains any in-flight reader ahead of them without deadlock.
//!
//! Teardown (`destroy_all`) is coordinated separately: an atomic
//! destroying flag plus an in-flight operation counter let it drain every
//! concurrent caller before taking exclusive ownership (see the `destroy`
//! submodule).

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::TreeError;
use crate::key::Key;
use crate::node::{min_values, Node, NodeRef};

mod create;
mod delete;
mod destroy;
mod find;

use destroy::DestroyCoordinator;

/// Maximum accepted order. The slot arithmetic pre-sizes `order + 2`
/// child slots, so the top two values are rejected.
const MAX_ORDER: usize = usize::MAX - 2;

/// A concurrent, order-preserving, type-tagged key/value container.
///
/// Keys are [`Key`] values; stored values are an opaque payload `V` that
/// the tree never interprets. Duplicate keys are rejected, and at most one
/// wildcard ([`Key::Any`]) entry can exist at a time (it always sorts to
/// the rightmost position).
///
/// All operations take `&self` and may be called from any number of
/// threads concurrently; `TagTree<V>` is `Send + Sync` when `V` is.
///
/// # Example
///
/// ```rust
/// use tagtree::{Key, TagTree, TypeWindow};
///
/// let tree: TagTree<u64> = TagTree::new(4).unwrap();
///
/// tree.create(Key::Int(7), || Ok(700)).unwrap();
///
/// let mut seen = Vec::new();
/// tree.find(&Key::Int(7), TypeWindow::all(), |key, value| {
///     seen.push((key.clone(), *value));
///     true
/// });
/// assert_eq!(seen, vec![(Key::Int(7), 700)]);
/// ```
pub struct TagTree<V> {
    /// Configured maximum entries per node.
    order: usize,

    /// Root pointer, `None` when the tree is empty. The lock doubles as
    /// the tree-wide structural lock; the pointer is replaced wholesale on
    /// every height change.
    root: RwLock<Option<NodeRef<V>>>,

    /// Destroy bookkeeping, separately locked so status checks do not
    /// serialize against ordinary reads.
    coord: DestroyCoordinator,
}

impl<V> TagTree<V> {
    /// Create an empty tree with the given order (maximum entries per
    /// node; children per node is `order + 1`).
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidOrder`] when `order <= 1` or `order`
    /// is within 2 of `usize::MAX` (slot-size arithmetic would overflow).
    pub fn new(order: usize) -> Result<Self, TreeError> {
        if order <= 1 || order > MAX_ORDER {
            return Err(TreeError::InvalidOrder(order));
        }

        Ok(Self {
            order,
            root: RwLock::new(None),
            coord: DestroyCoordinator::new(),
        })
    }

    /// Configured order of this tree.
    #[inline]
    #[must_use]
    pub const fn order(&self) -> usize {
        self.order
    }

    /// Whether the tree holds no entries. Never fails; like the other
    /// read operations it waits out an in-progress teardown.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let _op = self.coord.enter_reading();
        self.root.read().is_none()
    }

    /// Walk the whole tree under read locks and verify its structural
    /// invariants: node occupancy bounds, child/entry counts, equal leaf
    /// depth, strict in-node ascending key order, and separator bounds.
    ///
    /// Intended for tests and debugging; the walk holds the structural
    /// read lock for its duration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        let root_slot = self.root.read();
        let Some(root) = root_slot.as_ref() else {
            return Ok(());
        };

        let root_node = root.read();
        if root_node.entries.is_empty() {
            return Err("non-empty tree has a root with no entries".to_owned());
        }

        check_node(&root_node, self.order, true, None, None).map(|_depth| ())
    }

    /// Diagnostic snapshot of node key contents, level by level (root
    /// first), nodes left to right within a level.
    #[must_use]
    pub fn levels(&self) -> Vec<Vec<Vec<Key>>> {
        let root_slot = self.root.read();
        let mut levels = Vec::new();

        let Some(root) = root_slot.as_ref() else {
            return levels;
        };

        let mut frontier = vec![Arc::clone(root)];
        while !frontier.is_empty() {
            let mut level = Vec::with_capacity(frontier.len());
            let mut next = Vec::new();

            for node in &frontier {
                let guard = node.read();
                level.push(guard.entries.iter().map(|e| e.key.clone()).collect());
                next.extend(guard.children.iter().map(Arc::clone));
            }

            levels.push(level);
            frontier = next;
        }

        levels
    }
}

impl<V> std::fmt::Debug for TagTree<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagTree")
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

/// Recursive invariant check. Returns the subtree height so the caller
/// can verify all leaves sit at equal depth. `low`/`high` are the
/// exclusive separator bounds inherited from the parent.
fn check_node<V>(
    node: &Node<V>,
    order: usize,
    is_root: bool,
    low: Option<&Key>,
    high: Option<&Key>,
) -> Result<usize, String> {
    if node.entries.len() > order {
        return Err(format!(
            "node holds {} entries, order is {order}",
            node.entries.len()
        ));
    }

    if !is_root && node.entries.len() < min_values(order) {
        return Err(format!(
            "non-root node holds {} entries, minimum is {}",
            node.entries.len(),
            min_values(order)
        ));
    }

    for pair in node.entries.windows(2) {
        if pair[0].key >= pair[1].key {
            return Err(format!(
                "entries out of order: {:?} !< {:?}",
                pair[0].key, pair[1].key
            ));
        }
    }

    if let (Some(low), Some(first)) = (low, node.entries.first()) {
        if first.key <= *low {
            return Err(format!(
                "entry {:?} not above parent separator {low:?}",
                first.key
            ));
        }
    }
    if let (Some(high), Some(last)) = (high, node.entries.last()) {
        if last.key >= *high {
            return Err(format!(
                "entry {:?} not below parent separator {high:?}",
                last.key
            ));
        }
    }

    if node.is_leaf() {
        return Ok(1);
    }

    if node.children.len() != node.entries.len() + 1 {
        return Err(format!(
            "internal node has {} children for {} entries",
            node.children.len(),
            node.entries.len()
        ));
    }

    let mut depth = None;
    for (index, child) in node.children.iter().enumerate() {
        // Outermost children inherit the bounds this node was checked
        // against, so violations carry across levels.
        let child_low = match index.checked_sub(1) {
            Some(i) => Some(&node.entries[i].key),
            None => low,
        };
        let child_high = match node.entries.get(index) {
            Some(entry) => Some(&entry.key),
            None => high,
        };

        let child_node = child.read();
        let child_depth = check_node(&child_node, order, false, child_low, child_high)?;

        match depth {
            None => depth = Some(child_depth),
            Some(expected) if expected != child_depth => {
                return Err(format!(
                    "leaves at unequal depth: {expected} vs {child_depth}"
                ));
            }
            Some(_) => {}
        }
    }

    // Internal node has at least one child, so depth is set.
    Ok(depth.unwrap_or(0) + 1)
}
