//! Standard memory orderings for the destroy-coordination atomics.
//!
//! These constants keep ordering usage consistent across the codebase and
//! make the intent clear at each access point.

use std::sync::atomic::Ordering;

/// Ordering for reading the destroying-all flag on the operation fast
/// path. Pairs with the teardown's Release stores.
pub(crate) const FLAG_READ: Ordering = Ordering::Acquire;

/// Ordering for the CAS that claims the destroying-all flag.
pub(crate) const FLAG_CLAIM: Ordering = Ordering::AcqRel;

/// Ordering for a failed claim CAS. Only needs to observe the current
/// value.
pub(crate) const FLAG_CLAIM_FAILED: Ordering = Ordering::Acquire;

/// Ordering for clearing the destroying-all flag when teardown finishes.
/// Must be visible to waiting readers.
pub(crate) const FLAG_CLEAR: Ordering = Ordering::Release;
