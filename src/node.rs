//! Filepath: src/node.rs
//!
//! Tree nodes and the pure rebalancing primitives.
//!
//! A [`Node`] holds up to `order` entries sorted ascending by key and, when
//! internal, `entries.len() + 1` children. Each node sits behind its own
//! `parking_lot::RwLock` (see [`NodeRef`]); every primitive here assumes
//! the caller already holds the write guard for `self` and acquires child
//! guards internally where a primitive reaches into a child.
//!
//! # Occupancy invariants
//!
//! With `min_children = ceil((order + 1) / 2)`:
//!
//! - every node except the root holds `min_children - 1 ..= order` entries;
//! - the root may be under-full but never over-full;
//! - a node overflows to `order + 1` entries transiently during insertion
//!   (cured by [`Node::split`]) and underflows transiently during deletion
//!   (cured by rotation or [`Node::merge_down`]) before the mutating call
//!   returns.

use std::mem;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::key::Key;

/// Shared, lockable handle to a node.
///
/// A node is owned by its parent (or by the tree, for the root); the extra
/// `Arc` references held transiently by in-flight readers keep spliced-out
/// nodes alive until those readers unwind.
pub(crate) type NodeRef<V> = Arc<RwLock<Node<V>>>;

/// A key/value pair stored in a node slot. The value is opaque to the tree.
#[derive(Debug)]
pub(crate) struct Entry<V> {
    pub key: Key,
    pub value: V,
}

/// A single tree node: sorted entries plus child links when internal.
#[derive(Debug)]
pub(crate) struct Node<V> {
    pub entries: Vec<Entry<V>>,
    pub children: Vec<NodeRef<V>>,
}

/// Minimum entry count for a non-root node of the given order.
#[inline]
pub(crate) fn min_values(order: usize) -> usize {
    // min_children - 1, with min_children = ceil((order + 1) / 2).
    (order + 2) / 2 - 1
}

impl<V> Node<V> {
    /// Create an empty node with slot arrays pre-sized for transient
    /// overflow (`order + 1` entries, `order + 2` children).
    pub fn new(order: usize) -> Self {
        Self {
            entries: Vec::with_capacity(order + 1),
            children: Vec::with_capacity(order + 2),
        }
    }

    /// Wrap this node in its lock and shared handle.
    pub fn into_ref(self) -> NodeRef<V> {
        Arc::new(RwLock::new(self))
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Binary search for `key`: `Ok(slot)` on an exact match, `Err(slot)`
    /// with the child index to descend into (or the insertion slot for a
    /// leaf) otherwise.
    #[inline]
    pub fn search(&self, key: &Key) -> Result<usize, usize> {
        self.entries.binary_search_by(|entry| entry.key.cmp(key))
    }

    /// Shift-insert an entry at its sorted position. O(order).
    pub fn insert_sorted(&mut self, key: Key, value: V) {
        let slot = match self.search(&key) {
            Ok(slot) | Err(slot) => slot,
        };
        self.entries.insert(slot, Entry { key, value });
    }

    /// Split an overflowed node (`order + 1` entries) around the median
    /// entry at `order / 2`.
    ///
    /// The left half stays in place; the right half of the entries (and,
    /// for an internal node, of the children) moves into a fresh right
    /// sibling. Returns the median entry and the sibling so the caller can
    /// splice them into the parent with [`Node::insert_promoted`], or build
    /// a new root.
    pub fn split(&mut self, order: usize) -> (Entry<V>, NodeRef<V>) {
        debug_assert!(self.entries.len() == order + 1, "split requires overflow");

        let pivot = order / 2;

        let mut right = Self::new(order);
        right.entries.extend(self.entries.drain(pivot + 1..));
        if !self.children.is_empty() {
            right.children.extend(self.children.drain(pivot + 1..));
        }

        let median = match self.entries.pop() {
            Some(entry) => entry,
            None => unreachable!("overflowed node has a median"),
        };

        (median, right.into_ref())
    }

    /// Splice a promoted `(entry, right-sibling)` pair from a split of
    /// `children[slot]` into this node, shifting later slots right.
    pub fn insert_promoted(&mut self, slot: usize, entry: Entry<V>, right: NodeRef<V>) {
        self.entries.insert(slot, entry);
        self.children.insert(slot + 1, right);
    }

    /// Move one entry from `children[slot + 1]` through the separator into
    /// `children[slot]`, curing an underflow in the left child.
    pub fn rotate_left(&mut self, slot: usize) {
        let left = Arc::clone(&self.children[slot]);
        let right = Arc::clone(&self.children[slot + 1]);

        let mut right_node = right.write();
        let moved = right_node.entries.remove(0);
        let moved_child = if right_node.is_leaf() {
            None
        } else {
            Some(right_node.children.remove(0))
        };
        drop(right_node);

        let separator = mem::replace(&mut self.entries[slot], moved);

        let mut left_node = left.write();
        left_node.entries.push(separator);
        if let Some(child) = moved_child {
            left_node.children.push(child);
        }
    }

    /// Move one entry from `children[slot]` through the separator into
    /// `children[slot + 1]`, curing an underflow in the right child.
    pub fn rotate_right(&mut self, slot: usize) {
        let left = Arc::clone(&self.children[slot]);
        let right = Arc::clone(&self.children[slot + 1]);

        let (moved, moved_child) = left.write().drop_greatest();
        let separator = mem::replace(&mut self.entries[slot], moved);

        let mut right_node = right.write();
        right_node.entries.insert(0, separator);
        if let Some(child) = moved_child {
            right_node.children.insert(0, child);
        }
    }

    /// Fold the separator at `slot` and all of `children[slot + 1]` into
    /// `children[slot]`, removing the emptied slot (later slots shift
    /// left). The right sibling always merges into the left.
    pub fn merge_down(&mut self, slot: usize) {
        let right = self.children.remove(slot + 1);
        let separator = self.entries.remove(slot);

        let left = Arc::clone(&self.children[slot]);
        let mut left_node = left.write();
        let mut right_node = right.write();

        left_node.entries.push(separator);
        left_node.entries.append(&mut right_node.entries);
        left_node.children.append(&mut right_node.children);
    }

    /// Remove and return this node's rightmost entry and, when internal,
    /// its rightmost child. Used by rotation.
    pub fn drop_greatest(&mut self) -> (Entry<V>, Option<NodeRef<V>>) {
        let entry = match self.entries.pop() {
            Some(entry) => entry,
            None => unreachable!("drop_greatest on an empty node"),
        };
        let child = self.children.pop();

        (entry, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(order: usize, keys: &[i64]) -> Node<u64> {
        let mut node = Node::new(order);
        for &k in keys {
            node.insert_sorted(Key::Int(k), k as u64);
        }
        node
    }

    fn keys_of(node: &Node<u64>) -> Vec<Key> {
        node.entries.iter().map(|e| e.key.clone()).collect()
    }

    #[test]
    fn insert_sorted_keeps_ascending_order() {
        let node = leaf(4, &[30, 10, 20, 40]);
        assert_eq!(
            keys_of(&node),
            vec![Key::Int(10), Key::Int(20), Key::Int(30), Key::Int(40)]
        );
    }

    #[test]
    fn split_leaf_picks_median_at_half_order() {
        // order 2, overflowed to 3 entries: pivot = 1.
        let mut node = leaf(2, &[1, 2, 3]);
        let (median, right) = node.split(2);

        assert_eq!(median.key, Key::Int(2));
        assert_eq!(keys_of(&node), vec![Key::Int(1)]);
        assert_eq!(keys_of(&right.read()), vec![Key::Int(3)]);
    }

    #[test]
    fn split_internal_redistributes_children() {
        let mut node = leaf(2, &[20, 40, 60]);
        for k in [10, 30, 50, 70] {
            node.children.push(leaf(2, &[k]).into_ref());
        }

        let (median, right) = node.split(2);

        assert_eq!(median.key, Key::Int(40));
        assert_eq!(node.children.len(), 2);
        let right_node = right.read();
        assert_eq!(keys_of(&right_node), vec![Key::Int(60)]);
        assert_eq!(right_node.children.len(), 2);
        assert_eq!(keys_of(&right_node.children[0].read()), vec![Key::Int(50)]);
    }

    #[test]
    fn rotate_left_moves_right_least_through_separator() {
        let mut parent = leaf(3, &[20]);
        parent.children.push(leaf(3, &[10]).into_ref());
        parent.children.push(leaf(3, &[30, 40]).into_ref());

        parent.rotate_left(0);

        assert_eq!(keys_of(&parent), vec![Key::Int(30)]);
        assert_eq!(
            keys_of(&parent.children[0].read()),
            vec![Key::Int(10), Key::Int(20)]
        );
        assert_eq!(keys_of(&parent.children[1].read()), vec![Key::Int(40)]);
    }

    #[test]
    fn rotate_right_moves_left_greatest_through_separator() {
        let mut parent = leaf(3, &[30]);
        parent.children.push(leaf(3, &[10, 20]).into_ref());
        parent.children.push(leaf(3, &[40]).into_ref());

        parent.rotate_right(0);

        assert_eq!(keys_of(&parent), vec![Key::Int(20)]);
        assert_eq!(keys_of(&parent.children[0].read()), vec![Key::Int(10)]);
        assert_eq!(
            keys_of(&parent.children[1].read()),
            vec![Key::Int(30), Key::Int(40)]
        );
    }

    #[test]
    fn merge_down_folds_right_sibling_into_left() {
        let mut parent = leaf(3, &[20, 40]);
        parent.children.push(leaf(3, &[10]).into_ref());
        parent.children.push(leaf(3, &[30]).into_ref());
        parent.children.push(leaf(3, &[50]).into_ref());

        parent.merge_down(0);

        assert_eq!(keys_of(&parent), vec![Key::Int(40)]);
        assert_eq!(parent.children.len(), 2);
        assert_eq!(
            keys_of(&parent.children[0].read()),
            vec![Key::Int(10), Key::Int(20), Key::Int(30)]
        );
    }

    #[test]
    fn min_values_matches_ceil_half() {
        assert_eq!(min_values(2), 1);
        assert_eq!(min_values(3), 1);
        assert_eq!(min_values(4), 2);
        assert_eq!(min_values(5), 2);
        assert_eq!(min_values(6), 3);
    }
}
