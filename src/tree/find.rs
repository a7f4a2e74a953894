//! Traversal engine: exact lookup, the ordered find family, and iteration.
//!
//! Exact lookups descend hand-over-hand with owned read guards: the child
//! lock is acquired before the parent guard drops, so there is never a
//! gap where neither is held. Range scans recurse left-to-right
//! (ascending) regardless of the variant's direction — "greater than"
//! variants filter during the same ascending walk rather than walking in
//! reverse — which keeps lock acquisition order consistent. A scan holds
//! its read guards along the visited path because separator entries are
//! read between child visits.
//!
//! Early termination (`on_iterate` returning false) unwinds the recursion
//! and releases every acquired guard before the call returns; leaked read
//! locks would starve later writers indefinitely.

use crate::key::{Key, TypeWindow};
use crate::node::NodeRef;

use super::TagTree;

impl<V> TagTree<V> {
    /// Exact-match descent with hand-over-hand read locks. Runs `visit`
    /// on the matching entry while its node lock is held.
    pub(super) fn lookup<R>(&self, key: &Key, visit: impl FnOnce(&Key, &V) -> R) -> Option<R> {
        // Pin the root node before the structural lock is released.
        let mut guard = {
            let root_slot = self.root.read();
            let root = root_slot.as_ref()?;
            root.read_arc()
        };

        loop {
            match guard.search(key) {
                Ok(slot) => {
                    let entry = &guard.entries[slot];
                    return Some(visit(&entry.key, &entry.value));
                }

                Err(_) if guard.is_leaf() => return None,

                Err(slot) => {
                    // Acquire the child before the parent guard drops.
                    let child = guard.children[slot].read_arc();
                    guard = child;
                }
            }
        }
    }

    /// Exact lookup for `key` within a type window.
    ///
    /// When `key` carries a concrete tag inside the window, the matching
    /// entry (if any) is visited; if the window's upper bound includes the
    /// wildcard tag, the wildcard entry is additionally and separately
    /// visited. A wildcard `key` degenerates into a full scan restricted
    /// to the window. A key whose tag falls outside the window visits
    /// nothing.
    ///
    /// `on_iterate` returning `false` stops the traversal early.
    pub fn find(&self, key: &Key, window: TypeWindow, mut on_iterate: impl FnMut(&Key, &V) -> bool) {
        let _op = self.coord.enter_reading();

        if key.tag().is_wildcard() {
            self.scan(window, &mut |_| true, &mut on_iterate);
            return;
        }

        if !window.contains(key.tag()) {
            return;
        }

        let mut keep_going = true;
        self.lookup(key, |k, v| {
            keep_going = on_iterate(k, v);
        });

        if keep_going && window.includes_wildcard() {
            self.lookup(&Key::Any, |k, v| {
                on_iterate(k, v);
            });
        }
    }

    /// Visit, in ascending order, every in-window entry whose key is less
    /// than `key`.
    pub fn find_less_than(
        &self,
        key: &Key,
        window: TypeWindow,
        mut on_iterate: impl FnMut(&Key, &V) -> bool,
    ) {
        let _op = self.coord.enter_reading();
        self.scan(window, &mut |k| k < key, &mut on_iterate);
    }

    /// Visit, in ascending order, every in-window entry whose key is less
    /// than or equal to `key`.
    pub fn find_less_than_or_equal(
        &self,
        key: &Key,
        window: TypeWindow,
        mut on_iterate: impl FnMut(&Key, &V) -> bool,
    ) {
        let _op = self.coord.enter_reading();
        self.scan(window, &mut |k| k <= key, &mut on_iterate);
    }

    /// Visit, in ascending order, every in-window entry whose key is
    /// greater than `key`.
    pub fn find_greater_than(
        &self,
        key: &Key,
        window: TypeWindow,
        mut on_iterate: impl FnMut(&Key, &V) -> bool,
    ) {
        let _op = self.coord.enter_reading();
        self.scan(window, &mut |k| k > key, &mut on_iterate);
    }

    /// Visit, in ascending order, every in-window entry whose key is
    /// greater than or equal to `key`.
    pub fn find_greater_than_or_equal(
        &self,
        key: &Key,
        window: TypeWindow,
        mut on_iterate: impl FnMut(&Key, &V) -> bool,
    ) {
        let _op = self.coord.enter_reading();
        self.scan(window, &mut |k| k >= key, &mut on_iterate);
    }

    /// Visit, in ascending order, every in-window entry except the one
    /// matching `key`.
    pub fn find_not_equal(
        &self,
        key: &Key,
        window: TypeWindow,
        mut on_iterate: impl FnMut(&Key, &V) -> bool,
    ) {
        let _op = self.coord.enter_reading();
        self.scan(window, &mut |k| k != key, &mut on_iterate);
    }

    /// Visit every entry in ascending order, wildcard included.
    pub fn iterate(&self, mut on_iterate: impl FnMut(&Key, &V) -> bool) {
        let _op = self.coord.enter_reading();
        self.scan(TypeWindow::all(), &mut |_| true, &mut on_iterate);
    }

    /// Visit every in-window entry in ascending order.
    pub fn iterate_match_type(&self, window: TypeWindow, mut on_iterate: impl FnMut(&Key, &V) -> bool) {
        let _op = self.coord.enter_reading();
        self.scan(window, &mut |_| true, &mut on_iterate);
    }

    /// Window-filtered ascending walk shared by the scan variants. Holds
    /// the structural read guard for the walk's duration.
    fn scan(
        &self,
        window: TypeWindow,
        keep: &mut dyn FnMut(&Key) -> bool,
        on_iterate: &mut dyn FnMut(&Key, &V) -> bool,
    ) {
        let root_slot = self.root.read();
        if let Some(root) = root_slot.as_ref() {
            scan_subtree(root, window, keep, on_iterate);
        }
    }
}

/// In-order walk of one subtree. Returns false when `on_iterate` asked to
/// stop; the unwind releases every guard acquired on the way down.
fn scan_subtree<V>(
    node: &NodeRef<V>,
    window: TypeWindow,
    keep: &mut dyn FnMut(&Key) -> bool,
    on_iterate: &mut dyn FnMut(&Key, &V) -> bool,
) -> bool {
    let guard = node.read();
    let leaf = guard.is_leaf();

    for (slot, entry) in guard.entries.iter().enumerate() {
        let tag = entry.key.tag();

        // Keys left of this entry are smaller still, so their tags all
        // sit below the window; skip the whole subtree.
        if tag < window.min() {
            continue;
        }

        if !leaf && !scan_subtree(&guard.children[slot], window, keep, on_iterate) {
            return false;
        }

        // Everything from here on is larger; once past the window's upper
        // bound the walk is done.
        if tag > window.max() {
            return true;
        }

        if keep(&entry.key) && !on_iterate(&entry.key, &entry.value) {
            return false;
        }
    }

    if !leaf {
        return scan_subtree(&guard.children[guard.entries.len()], window, keep, on_iterate);
    }

    true
}
