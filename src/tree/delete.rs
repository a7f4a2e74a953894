//! Mutation engine: `delete` and the underflow rebalancing walk.
//!
//! Deletion descends under the structural write lock taking node write
//! guards top-down. After every recursive delete the parent checks
//! whether the affected child fell below the minimum occupancy; if so it
//! rotates an entry in from a sibling with slack, else merges the child
//! with a sibling, propagating the correction upward. A root left with
//! zero entries collapses into its sole child, shrinking tree height.

use std::sync::Arc;

use crate::error::TreeError;
use crate::key::Key;
use crate::node::{min_values, Entry, Node, NodeRef};
use crate::tracing_helpers::trace_log;

use super::TagTree;

/// Result of a recursive delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DeleteOutcome {
    /// The key is not in the tree; nothing changed.
    NotFound,

    /// `can_delete` returned false; nothing changed.
    Vetoed,

    /// The entry was removed (and the subtree rebalanced).
    Deleted,
}

impl<V> TagTree<V> {
    /// Remove the entry for `key`, if present.
    ///
    /// `can_delete`, when given, is invoked with the stored value once the
    /// entry is located; returning `false` vetoes the deletion and the
    /// whole call is a no-op — the tree is left untouched, with no partial
    /// rebalancing. Deleting an absent key is also a successful no-op.
    ///
    /// # Errors
    ///
    /// [`TreeError::TreeDestroying`] while a [`destroy_all`] runs.
    ///
    /// [`destroy_all`]: TagTree::destroy_all
    pub fn delete(
        &self,
        key: &Key,
        can_delete: Option<&dyn Fn(&V) -> bool>,
    ) -> Result<(), TreeError> {
        let _op = self.coord.enter_mutating()?;

        let mut root_slot = self.root.write();
        self.delete_in(&mut root_slot, key, can_delete);

        Ok(())
    }

    /// Delete through an already-held structural write guard. Shared by
    /// `delete`, `destroy`, and the `destroy_all` bulk path.
    pub(super) fn delete_in(
        &self,
        root_slot: &mut Option<NodeRef<V>>,
        key: &Key,
        can_delete: Option<&dyn Fn(&V) -> bool>,
    ) -> DeleteOutcome {
        let Some(root) = root_slot.as_ref().map(Arc::clone) else {
            return DeleteOutcome::NotFound;
        };

        let outcome = self.delete_at(&root, key, can_delete);

        if outcome == DeleteOutcome::Deleted {
            // Height shrinks when the root empties out.
            let collapsed = {
                let guard = root.read();
                if guard.entries.is_empty() {
                    if guard.is_leaf() {
                        Some(None)
                    } else {
                        Some(Some(Arc::clone(&guard.children[0])))
                    }
                } else {
                    None
                }
            };

            if let Some(new_root) = collapsed {
                trace_log!("root collapsed, tree shrinks a level");
                *root_slot = new_root;
            }
        }

        outcome
    }

    /// Recursive descent. The caller's write guard on the parent stays
    /// held across this call so underflow can be cured on the way back up.
    fn delete_at(
        &self,
        node: &NodeRef<V>,
        key: &Key,
        can_delete: Option<&dyn Fn(&V) -> bool>,
    ) -> DeleteOutcome {
        let mut guard = node.write();

        match guard.search(key) {
            Ok(slot) => {
                // The veto runs before any mutation so a false answer
                // leaves the tree byte-for-byte unchanged.
                if let Some(veto) = can_delete {
                    if !veto(&guard.entries[slot].value) {
                        return DeleteOutcome::Vetoed;
                    }
                }

                if guard.is_leaf() {
                    guard.entries.remove(slot);
                    return DeleteOutcome::Deleted;
                }

                // An internal entry is never removed in place: swap it
                // with the adjacent leaf's extreme value, then apply the
                // leaf deletion rules. Left child wins the tie so
                // deletions shrink leaves deterministically.
                let left = Arc::clone(&guard.children[slot]);
                let right = Arc::clone(&guard.children[slot + 1]);
                let use_left = left.read().entries.len() >= right.read().entries.len();

                let (subtree, child_slot) = if use_left {
                    (left, slot)
                } else {
                    (right, slot + 1)
                };

                swap_with_extreme(&subtree, &mut guard.entries[slot], use_left);

                // The veto already passed; the leaf delete must not re-ask.
                let outcome = self.delete_at(&subtree, key, None);
                debug_assert_eq!(outcome, DeleteOutcome::Deleted);

                self.fix_child(&mut guard, child_slot);
                DeleteOutcome::Deleted
            }

            Err(_) if guard.is_leaf() => DeleteOutcome::NotFound,

            Err(slot) => {
                let child = Arc::clone(&guard.children[slot]);
                let outcome = self.delete_at(&child, key, can_delete);

                if outcome == DeleteOutcome::Deleted {
                    self.fix_child(&mut guard, slot);
                }
                outcome
            }
        }
    }

    /// Cure an underflow in `parent.children[slot]` after a recursive
    /// delete: rotate from a sibling with slack, else merge (the right
    /// sibling always folds into the left).
    fn fix_child(&self, parent: &mut Node<V>, slot: usize) {
        let minimum = min_values(self.order);

        if parent.children[slot].read().entries.len() >= minimum {
            return;
        }

        if slot > 0 && parent.children[slot - 1].read().entries.len() > minimum {
            trace_log!(slot, "underflow cured by right rotation");
            parent.rotate_right(slot - 1);
            return;
        }

        let last = parent.children.len() - 1;
        if slot < last && parent.children[slot + 1].read().entries.len() > minimum {
            trace_log!(slot, "underflow cured by left rotation");
            parent.rotate_left(slot);
            return;
        }

        trace_log!(slot, "underflow cured by merge");
        if slot < last {
            parent.merge_down(slot);
        } else {
            parent.merge_down(slot - 1);
        }
    }
}

/// Descend to the extreme leaf of `subtree` (greatest when `greatest`,
/// least otherwise) and swap its extreme entry with `slot`, holding write
/// guards along the descent. Afterwards the key that was in `slot` sits
/// at the leaf extreme, still in sorted position, ready for leaf deletion.
fn swap_with_extreme<V>(subtree: &NodeRef<V>, slot: &mut Entry<V>, greatest: bool) {
    let mut guard = subtree.write();

    if guard.is_leaf() {
        let extreme = if greatest { guard.entries.len() - 1 } else { 0 };
        std::mem::swap(slot, &mut guard.entries[extreme]);
        return;
    }

    let extreme = if greatest { guard.children.len() - 1 } else { 0 };
    let child = Arc::clone(&guard.children[extreme]);
    swap_with_extreme(&child, slot, greatest);
}
