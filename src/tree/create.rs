//! Mutation engine: `create` and `create_or_find`.
//!
//! Insertion descends from the root under the structural write lock,
//! taking node write guards top-down, and propagates splits back up the
//! held path: a leaf that overflows past `order` entries promotes its
//! median into the parent, and a split that reaches the root grows the
//! tree by one level.

use std::sync::Arc;

use crate::error::{TreeError, ValueError};
use crate::key::Key;
use crate::node::{Entry, Node, NodeRef};
use crate::tracing_helpers::trace_log;

use super::TagTree;

/// Result of one level of the locked insert descent.
enum InsertStep<V> {
    /// The key was already present; no entry was added.
    Existed,

    /// Inserted without overflowing this subtree.
    Done,

    /// This subtree split: the median entry and the new right sibling
    /// must be spliced into the caller.
    Promoted(Entry<V>, NodeRef<V>),
}

impl<V> TagTree<V> {
    /// Insert a new entry for `key`, obtaining the value from `on_create`.
    ///
    /// `on_create` runs only once the destination leaf is locked and the
    /// key is known to be absent; it is never invoked for a present key.
    /// A failing `on_create` leaves the tree unchanged.
    ///
    /// # Errors
    ///
    /// - [`TreeError::KeyAlreadyExists`] when `key` is present.
    /// - [`TreeError::TreeDestroying`] while a [`destroy_all`] runs.
    /// - [`TreeError::ValueConstruction`] when `on_create` fails.
    ///
    /// [`destroy_all`]: TagTree::destroy_all
    pub fn create<F>(&self, key: Key, on_create: F) -> Result<(), TreeError>
    where
        F: FnOnce() -> Result<V, ValueError>,
    {
        let _op = self.coord.enter_mutating()?;

        // Read pass first: a present key is reported without touching the
        // structural write lock, so concurrent reads proceed while a
        // create is pending.
        if self.lookup(&key, |_, _| ()).is_some() {
            return Err(TreeError::KeyAlreadyExists);
        }

        match self.insert_locked(key, on_create, None)? {
            // The key appeared between the read pass and the write lock.
            InsertStep::Existed => Err(TreeError::KeyAlreadyExists),
            InsertStep::Done | InsertStep::Promoted(..) => Ok(()),
        }
    }

    /// Insert a new entry for `key`, or visit the existing one.
    ///
    /// Exactly one of the callbacks runs per call: `on_create` when the
    /// key is absent, `on_find` (with the stored value) when present.
    ///
    /// # Errors
    ///
    /// - [`TreeError::TreeDestroying`] while a [`destroy_all`] runs.
    /// - [`TreeError::ValueConstruction`] when `on_create` fails.
    ///
    /// [`destroy_all`]: TagTree::destroy_all
    pub fn create_or_find<F, G>(&self, key: Key, on_create: F, on_find: G) -> Result<(), TreeError>
    where
        F: FnOnce() -> Result<V, ValueError>,
        G: FnOnce(&V),
    {
        let _op = self.coord.enter_mutating()?;

        let mut on_find = Some(on_find);

        let found = self
            .lookup(&key, |_, value| {
                if let Some(callback) = on_find.take() {
                    callback(value);
                }
            })
            .is_some();
        if found {
            return Ok(());
        }

        let mut fallback = |value: &V| {
            if let Some(callback) = on_find.take() {
                callback(value);
            }
        };
        self.insert_locked(key, on_create, Some(&mut fallback))?;

        Ok(())
    }

    /// Locked insert path shared by `create` and `create_or_find`.
    ///
    /// Holds the structural write lock end to end; `on_find`, when given,
    /// is invoked if the key turns out to be present after all.
    fn insert_locked<F>(
        &self,
        key: Key,
        on_create: F,
        on_find: Option<&mut dyn FnMut(&V)>,
    ) -> Result<InsertStep<V>, TreeError>
    where
        F: FnOnce() -> Result<V, ValueError>,
    {
        let mut root_slot = self.root.write();

        let Some(root) = root_slot.as_ref().map(Arc::clone) else {
            let value = on_create().map_err(TreeError::ValueConstruction)?;
            let mut leaf = Node::new(self.order);
            leaf.insert_sorted(key, value);
            *root_slot = Some(leaf.into_ref());
            return Ok(InsertStep::Done);
        };

        let step = self.insert_at(&root, key, on_create, on_find)?;

        if let InsertStep::Promoted(median, right) = step {
            trace_log!("root split, tree grows a level");
            let mut new_root = Node::new(self.order);
            new_root.entries.push(median);
            new_root.children.push(root);
            new_root.children.push(right);
            *root_slot = Some(new_root.into_ref());
            return Ok(InsertStep::Done);
        }

        Ok(step)
    }

    /// Recursive descent for the locked insert. The caller's write guard
    /// on the parent stays held across this call, so promoted splits can
    /// be spliced in on the way back up.
    fn insert_at<F>(
        &self,
        node: &NodeRef<V>,
        key: Key,
        on_create: F,
        on_find: Option<&mut dyn FnMut(&V)>,
    ) -> Result<InsertStep<V>, TreeError>
    where
        F: FnOnce() -> Result<V, ValueError>,
    {
        let mut guard = node.write();

        match guard.search(&key) {
            Ok(slot) => {
                if let Some(callback) = on_find {
                    callback(&guard.entries[slot].value);
                }
                Ok(InsertStep::Existed)
            }

            Err(slot) if guard.is_leaf() => {
                // Destination leaf is locked and the key is absent: this
                // is the deepest point at which on_create may run.
                let value = on_create().map_err(TreeError::ValueConstruction)?;
                guard.entries.insert(slot, Entry { key, value });

                if guard.entries.len() > self.order {
                    trace_log!(slot, "leaf overflow, splitting");
                    let (median, right) = guard.split(self.order);
                    return Ok(InsertStep::Promoted(median, right));
                }
                Ok(InsertStep::Done)
            }

            Err(slot) => {
                let child = Arc::clone(&guard.children[slot]);

                match self.insert_at(&child, key, on_create, on_find)? {
                    InsertStep::Promoted(median, right) => {
                        guard.insert_promoted(slot, median, right);

                        if guard.entries.len() > self.order {
                            trace_log!(slot, "internal overflow, splitting");
                            let (median, right) = guard.split(self.order);
                            return Ok(InsertStep::Promoted(median, right));
                        }
                        Ok(InsertStep::Done)
                    }
                    step => Ok(step),
                }
            }
        }
    }
}
