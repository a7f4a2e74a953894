//! # `TagTree`
//!
//! A concurrent, order-preserving, type-tagged key/value container: a
//! 2-3-4 balanced tree (up to `order` entries and `order + 1` children
//! per node) with per-node reader/writer locks.
//!
//! ## Features
//!
//! | Feature | Status |
//! |---------|--------|
//! | Point lookup (`find`) | Hand-over-hand read locking |
//! | Ordered range scans | Five variants, bounded by a type window |
//! | Insert with create semantics | `create` / `create_or_find` |
//! | Delete with caller veto | `delete(can_delete)` |
//! | Safe bulk teardown | `destroy` / `destroy_all` with drain protocol |
//!
//! ## Thread Safety
//!
//! `TagTree<V>` is `Send + Sync` when `V: Send + Sync`. Every operation
//! takes `&self`; any number of threads may call in concurrently. There
//! is no single global lock serializing every access: lookups and scans
//! use per-node lock coupling, while structural mutations hold a
//! tree-wide writer lock (plus node write locks) so a reader never
//! observes a node mid-split or mid-merge.
//!
//! ```rust
//! use tagtree::{Key, KeyTag, TagTree, TypeWindow};
//!
//! let tree: TagTree<String> = TagTree::new(4).unwrap();
//!
//! tree.create(Key::Str("alpha".into()), || Ok("a".to_owned())).unwrap();
//! tree.create(Key::Int(1), || Ok("one".to_owned())).unwrap();
//!
//! // Scan only the string-tagged keys.
//! let mut names = Vec::new();
//! tree.iterate_match_type(TypeWindow::single(KeyTag::Str), |key, value| {
//!     names.push((key.clone(), value.clone()));
//!     true
//! });
//! assert_eq!(names.len(), 1);
//! ```
//!
//! ## Keys
//!
//! Keys carry a type tag ([`KeyTag`]) and a payload; the total order
//! compares tags first, payloads within a tag second. The wildcard key
//! ([`Key::Any`]) sorts after every concrete key, exists at most once per
//! tree, and is visited by scans only when the caller's [`TypeWindow`]
//! explicitly includes the `Any` tag.
//!
//! ## Design
//!
//! The tree deliberately trades some scan throughput for correctness
//! simplicity: no lock-free paths, no optimistic retries. Lock coupling
//! (acquire the child's lock before releasing the parent's) plus a
//! tree-wide writer lock for structure-reshaping mutations gives
//! serializable per-node snapshots. Full teardown drains in-flight
//! operations through a separate coordination layer before taking
//! exclusive ownership.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod key;
pub mod tree;

mod node;
mod ordering;
mod tracing_helpers;

// Re-export main types for convenience
pub use error::{TreeError, ValueError};
pub use key::{Key, KeyTag, TypeWindow};
pub use tree::TagTree;
