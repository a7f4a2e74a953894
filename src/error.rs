//! Error types for [`TagTree`](crate::TagTree) operations.
//!
//! All conflict errors are detected before any mutation is applied, so an
//! `Err` return never leaves the tree partially modified.

use std::error::Error as StdError;
use std::fmt as StdFmt;

use crate::key::KeyTag;

/// Boxed error returned by a caller's value-construction callback.
pub type ValueError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors that can occur during tree operations.
#[derive(Debug)]
pub enum TreeError {
    /// The requested order is unusable: a tree needs at least two entries
    /// per node, and the slot arithmetic reserves two extra indices.
    InvalidOrder(usize),

    /// A type window with `min > max` was requested.
    InvalidTypeWindow {
        /// Requested lower tag bound.
        min: KeyTag,
        /// Requested upper tag bound.
        max: KeyTag,
    },

    /// `create` found the key already present. The create callback was
    /// not invoked.
    KeyAlreadyExists,

    /// A `destroy` for the same key is already in flight on another caller.
    KeyDestroying,

    /// A `destroy_all` is in progress; mutating calls are rejected until
    /// it completes.
    TreeDestroying,

    /// The caller's `on_create` callback failed. The tree is unchanged.
    ValueConstruction(ValueError),
}

impl StdFmt::Display for TreeError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::InvalidOrder(order) => {
                write!(f, "invalid tree order {order} (must be 2..=usize::MAX-2)")
            }

            Self::InvalidTypeWindow { min, max } => {
                write!(f, "invalid type window: min {min:?} > max {max:?}")
            }

            Self::KeyAlreadyExists => write!(f, "key already exists"),

            Self::KeyDestroying => write!(f, "key is being destroyed by another caller"),

            Self::TreeDestroying => write!(f, "tree teardown in progress"),

            Self::ValueConstruction(source) => {
                write!(f, "value construction failed: {source}")
            }
        }
    }
}

impl StdError for TreeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::ValueConstruction(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}
