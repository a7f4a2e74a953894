//! Filepath: src/key.rs
//!
//! Type-tagged keys and the ordering contract for [`TagTree`](crate::TagTree).
//!
//! A [`Key`] carries a [`KeyTag`] and a payload. The total order compares
//! tags first (numeric tag order, with [`KeyTag::Any`] the maximum), then
//! payloads within the same tag. Payload comparison across different tags
//! is never performed.
//!
//! [`TypeWindow`] is the `{min, max}` tag bound that scans use to restrict
//! which entries they visit. Because the wildcard tag is the numeric
//! maximum, `window.contains(KeyTag::Any)` holds exactly when the window's
//! upper bound is `Any`, which is the wildcard-inclusion rule for every
//! scan variant.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::error::TreeError;

/// Discrete tag identifying the kind of a [`Key`] payload.
///
/// The variant order is the comparison order: a key with a numerically
/// earlier tag sorts before any key with a later tag. `Any` is reserved
/// for the wildcard key and sorts after every concrete tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum KeyTag {
    /// Boolean payload (`false < true`).
    Bool = 0,
    /// Signed 64-bit integer payload.
    Int = 1,
    /// Unsigned 64-bit integer payload.
    Uint = 2,
    /// 64-bit float payload, ordered by `f64::total_cmp`.
    Float = 3,
    /// UTF-8 string payload, ordered lexicographically.
    Str = 4,
    /// Raw byte payload, ordered lexicographically.
    Bytes = 5,
    /// Wildcard tag. At most one `Any` key exists per tree; it sorts last
    /// and is only visited when a window's upper bound includes it.
    Any = 6,
}

impl KeyTag {
    /// Whether this is the wildcard tag.
    #[inline]
    #[must_use]
    pub const fn is_wildcard(self) -> bool {
        matches!(self, Self::Any)
    }
}

/// A tagged key value stored in the tree.
///
/// Equality and ordering are total: tags compare first, then payloads
/// within the same tag. Floats use [`f64::total_cmp`], so `Key` satisfies
/// `Eq`, `Ord`, and `Hash` even for NaN payloads.
#[derive(Debug, Clone)]
pub enum Key {
    /// Boolean key.
    Bool(bool),
    /// Signed integer key.
    Int(i64),
    /// Unsigned integer key.
    Uint(u64),
    /// Float key.
    Float(f64),
    /// String key.
    Str(String),
    /// Byte-string key.
    Bytes(Vec<u8>),
    /// The wildcard key.
    Any,
}

impl Key {
    /// Return this key's tag.
    #[inline]
    #[must_use]
    pub const fn tag(&self) -> KeyTag {
        match self {
            Self::Bool(_) => KeyTag::Bool,
            Self::Int(_) => KeyTag::Int,
            Self::Uint(_) => KeyTag::Uint,
            Self::Float(_) => KeyTag::Float,
            Self::Str(_) => KeyTag::Str,
            Self::Bytes(_) => KeyTag::Bytes,
            Self::Any => KeyTag::Any,
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.tag().cmp(&other.tag()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }

        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Uint(a), Self::Uint(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Str(a), Self::Str(b)) => a.cmp(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
            (Self::Any, Self::Any) => Ordering::Equal,
            // Tags matched above, so the payload shapes match.
            _ => unreachable!("payload comparison across different tags"),
        }
    }
}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.tag() as u8).hash(state);

        match self {
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Uint(v) => v.hash(state),
            // Bit pattern, so hashing agrees with total_cmp equality.
            Self::Float(v) => v.to_bits().hash(state),
            Self::Str(v) => v.hash(state),
            Self::Bytes(v) => v.hash(state),
            Self::Any => {}
        }
    }
}

/// An inclusive `{min, max}` bound on key tags restricting which entries a
/// scan visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeWindow {
    min: KeyTag,
    max: KeyTag,
}

impl TypeWindow {
    /// Create a window covering `min..=max`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidTypeWindow`] when `min > max`.
    pub fn new(min: KeyTag, max: KeyTag) -> Result<Self, TreeError> {
        if min > max {
            return Err(TreeError::InvalidTypeWindow { min, max });
        }

        Ok(Self { min, max })
    }

    /// The window covering every tag, wildcard included.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            min: KeyTag::Bool,
            max: KeyTag::Any,
        }
    }

    /// The window covering every concrete tag, wildcard excluded.
    #[must_use]
    pub const fn concrete() -> Self {
        Self {
            min: KeyTag::Bool,
            max: KeyTag::Bytes,
        }
    }

    /// A single-tag window.
    #[must_use]
    pub const fn single(tag: KeyTag) -> Self {
        Self { min: tag, max: tag }
    }

    /// Lower tag bound.
    #[inline]
    #[must_use]
    pub const fn min(self) -> KeyTag {
        self.min
    }

    /// Upper tag bound.
    #[inline]
    #[must_use]
    pub const fn max(self) -> KeyTag {
        self.max
    }

    /// Whether `tag` falls inside the window.
    #[inline]
    #[must_use]
    pub fn contains(self, tag: KeyTag) -> bool {
        self.min <= tag && tag <= self.max
    }

    /// Whether the window's upper bound includes the wildcard tag.
    #[inline]
    #[must_use]
    pub const fn includes_wildcard(self) -> bool {
        self.max.is_wildcard()
    }
}
