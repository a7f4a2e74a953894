//! Lifecycle coordinator: `destroy`, `destroy_all`, and the drain
//! protocol.
//!
//! Teardown coordination is tree-wide state separate from the structural
//! lock, so status checks never serialize against ordinary reads:
//!
//! - an atomic destroying-all flag, claimed by compare-and-swap so only
//!   one `destroy_all` runs at a time;
//! - a counter of in-flight operations, drained to zero (via condvar)
//!   before teardown takes exclusive ownership;
//! - the set of keys currently mid-`destroy`, rejecting concurrent
//!   destroys of the same key.
//!
//! While the flag is set, mutating calls fail fast with
//! [`TreeError::TreeDestroying`]; read calls never fail for this reason —
//! they wait on the condvar until the flag clears.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;

use parking_lot::{Condvar, Mutex};

use crate::error::TreeError;
use crate::key::Key;
use crate::node::NodeRef;
use crate::ordering::{FLAG_CLAIM, FLAG_CLAIM_FAILED, FLAG_CLEAR, FLAG_READ};
use crate::tracing_helpers::{debug_log, warn_log};

use super::delete::DeleteOutcome;
use super::TagTree;

/// Tree-wide destroy bookkeeping.
pub(super) struct DestroyCoordinator {
    /// Set while a `destroy_all` is in progress.
    destroying_all: AtomicBool,

    inner: Mutex<CoordInner>,

    /// Signaled when the in-flight counter reaches zero and when the
    /// destroying-all flag clears.
    drained: Condvar,
}

struct CoordInner {
    /// Count of public operations currently in flight.
    in_flight: usize,

    /// Keys currently mid-`destroy`.
    destroying_keys: HashSet<Key>,
}

impl DestroyCoordinator {
    pub fn new() -> Self {
        Self {
            destroying_all: AtomicBool::new(false),
            inner: Mutex::new(CoordInner {
                in_flight: 0,
                destroying_keys: HashSet::new(),
            }),
            drained: Condvar::new(),
        }
    }

    /// Count a read operation in. Waits out an in-progress teardown
    /// instead of failing: the read table has no destroy error.
    pub fn enter_reading(&self) -> OpGuard<'_> {
        let mut inner = self.inner.lock();
        while self.destroying_all.load(FLAG_READ) {
            self.drained.wait(&mut inner);
        }
        inner.in_flight += 1;

        OpGuard { coord: self }
    }

    /// Count a mutating operation in; fails fast during a teardown.
    pub fn enter_mutating(&self) -> Result<OpGuard<'_>, TreeError> {
        let mut inner = self.inner.lock();
        if self.destroying_all.load(FLAG_READ) {
            return Err(TreeError::TreeDestroying);
        }
        inner.in_flight += 1;

        Ok(OpGuard { coord: self })
    }

    /// Register `key` as mid-destroy. A duplicate registration means a
    /// concurrent destroy of the same key is still running.
    fn register_key(&self, key: &Key) -> Result<KeyGuard<'_>, TreeError> {
        let mut inner = self.inner.lock();
        if !inner.destroying_keys.insert(key.clone()) {
            warn_log!(?key, "concurrent destroy of the same key rejected");
            return Err(TreeError::KeyDestroying);
        }

        Ok(KeyGuard {
            coord: self,
            key: key.clone(),
        })
    }

    /// Claim the teardown flag; the loser of the race gets an error.
    fn claim_teardown(&self) -> Result<TeardownGuard<'_>, TreeError> {
        if self
            .destroying_all
            .compare_exchange(false, true, FLAG_CLAIM, FLAG_CLAIM_FAILED)
            .is_err()
        {
            return Err(TreeError::TreeDestroying);
        }

        Ok(TeardownGuard { coord: self })
    }

    /// Block until every in-flight operation has finished.
    fn drain(&self) {
        let mut inner = self.inner.lock();
        while inner.in_flight > 0 {
            self.drained.wait(&mut inner);
        }
    }
}

/// RAII in-flight registration; the drop decrement wakes a draining
/// teardown.
pub(super) struct OpGuard<'a> {
    coord: &'a DestroyCoordinator,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.coord.inner.lock();
        inner.in_flight -= 1;
        if inner.in_flight == 0 {
            self.coord.drained.notify_all();
        }
    }
}

/// RAII destroying-key registration; unregisters on every exit path.
struct KeyGuard<'a> {
    coord: &'a DestroyCoordinator,
    key: Key,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.coord.inner.lock();
        inner.destroying_keys.remove(&self.key);
    }
}

/// Clears the teardown flag on every exit path, including a panic in a
/// caller's veto callback, and wakes the readers parked on the condvar.
struct TeardownGuard<'a> {
    coord: &'a DestroyCoordinator,
}

impl Drop for TeardownGuard<'_> {
    fn drop(&mut self) {
        // Flip under the mutex so parked waiters observe the clear.
        let _inner = self.coord.inner.lock();
        self.coord.destroying_all.store(false, FLAG_CLEAR);
        self.coord.drained.notify_all();
    }
}

impl<V> TagTree<V> {
    /// Remove a single key with [`delete`](TagTree::delete) semantics,
    /// coordinated against concurrent teardown: the call counts itself
    /// in-flight (an active `destroy_all` must wait for it), and the key
    /// is registered as mid-destroy for the call's duration.
    ///
    /// # Errors
    ///
    /// - [`TreeError::TreeDestroying`] while a `destroy_all` runs.
    /// - [`TreeError::KeyDestroying`] when another `destroy` of the same
    ///   key is in flight.
    pub fn destroy(
        &self,
        key: &Key,
        can_delete: Option<&dyn Fn(&V) -> bool>,
    ) -> Result<(), TreeError> {
        let _op = self.coord.enter_mutating()?;
        let _key_guard = self.coord.register_key(key)?;

        let mut root_slot = self.root.write();
        self.delete_in(&mut root_slot, key, can_delete);

        Ok(())
    }

    /// Exclusive full-tree teardown.
    ///
    /// Claims the destroying flag (only one `destroy_all` at a time),
    /// waits for every in-flight operation to drain, then takes the
    /// structural write lock, enumerates every key, and deletes them one
    /// at a time through the normal deletion path, honoring `can_delete`
    /// per key. The first veto aborts the remaining bulk delete: prior
    /// deletions stay applied and the tree is left balanced (partial
    /// commit, not rolled back).
    ///
    /// # Errors
    ///
    /// [`TreeError::TreeDestroying`] when another `destroy_all` is
    /// already in progress.
    pub fn destroy_all(&self, can_delete: Option<&dyn Fn(&V) -> bool>) -> Result<(), TreeError> {
        let _teardown = self.coord.claim_teardown()?;

        debug_log!("destroy_all claimed, draining in-flight operations");
        self.coord.drain();

        let mut root_slot = self.root.write();

        // Deleting and rebalancing mid-traversal is unsafe, so enumerate
        // every key first, then delete through the normal path.
        let mut keys = Vec::new();
        if let Some(root) = root_slot.as_ref() {
            collect_keys(root, &mut keys);
        }
        debug_log!(total = keys.len(), "destroy_all deleting");

        for key in keys {
            if self.delete_in(&mut root_slot, &key, can_delete) == DeleteOutcome::Vetoed {
                debug_log!(?key, "destroy_all stopped by veto");
                break;
            }
        }

        Ok(())
    }
}

/// Collect every key of the subtree in ascending order.
fn collect_keys<V>(node: &NodeRef<V>, keys: &mut Vec<Key>) {
    let guard = node.read();

    for (slot, entry) in guard.entries.iter().enumerate() {
        if !guard.is_leaf() {
            collect_keys(&guard.children[slot], keys);
        }
        keys.push(entry.key.clone());
    }

    if !guard.is_leaf() {
        collect_keys(&guard.children[guard.entries.len()], keys);
    }
}
