//! Generational handles.
//!
//! A handle packs a slot index (low bits) and a generation counter (high bits)
//! into a single `u32`:
//!
//! ```text
//!  31        22 21                    0
//! [ generation |        index         ]
//! ```
//!
//! The generation is bumped every time a slot is freed, so a handle kept
//! around after its slot was destroyed and reused no longer matches the slot
//! and is detected as stale.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque generational handle into a [`Pool`](crate::Pool).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Handle(u32);

impl Handle {
    /// Number of bits reserved for the generation.
    pub const GENERATION_BITS: u32 = 10;
    /// Number of bits reserved for the index.
    pub const INDEX_BITS: u32 = u32::BITS - Self::GENERATION_BITS;

    /// Mask selecting the index bits.
    pub const INDEX_MASK: u32 = (1 << Self::INDEX_BITS) - 1;
    /// Mask selecting the generation bits.
    pub const GENERATION_MASK: u32 = !Self::INDEX_MASK;

    /// Largest index a pool may hand out (exclusive).
    ///
    /// The all-ones index is reserved so that [`Handle::INVALID`] can never
    /// alias a live slot.
    pub const MAX_INDEX: u32 = Self::INDEX_MASK;
    /// Largest representable generation.
    pub const MAX_GENERATION: u32 = (1 << Self::GENERATION_BITS) - 1;

    /// The reserved "no object" handle.
    pub const INVALID: Self = Self(u32::MAX);

    /// Create a generation-0 handle for `index`.
    pub fn new(index: u32) -> Self {
        assert!(
            index < Self::MAX_INDEX,
            "handle index {index} does not fit in {} bits",
            Self::INDEX_BITS
        );
        Self(index)
    }

    /// Build a handle from an index and a generation.
    pub fn from_parts(index: u32, generation: u32) -> Self {
        assert!(index < Self::MAX_INDEX, "handle index {index} out of range");
        assert!(
            generation <= Self::MAX_GENERATION,
            "handle generation {generation} out of range"
        );
        Self(index | (generation << Self::INDEX_BITS))
    }

    /// Reinterpret raw bits as a handle.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bit pattern.
    pub const fn to_bits(self) -> u32 {
        self.0
    }

    /// Slot index.
    pub const fn index(self) -> u32 {
        self.0 & Self::INDEX_MASK
    }

    /// Slot generation.
    pub const fn generation(self) -> u32 {
        (self.0 & Self::GENERATION_MASK) >> Self::INDEX_BITS
    }

    /// Whether this is the reserved invalid handle.
    pub const fn is_invalid(self) -> bool {
        self.0 == Self::INVALID.0
    }

    /// Whether the generation can still be bumped.
    pub const fn can_regenerate(self) -> bool {
        self.generation() < Self::MAX_GENERATION
    }

    /// Same index, next generation.
    ///
    /// # Panics
    /// Panics if the generation would overflow its bit width.
    pub fn regenerate(self) -> Self {
        let generation = self.generation() + 1;
        assert!(
            generation <= Self::MAX_GENERATION,
            "generation overflow regenerating handle {self}"
        );
        Self(self.index() | (generation << Self::INDEX_BITS))
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "#invalid")
        } else {
            write!(f, "#{}:{}", self.index(), self.generation())
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({self})")
    }
}

/// A key type a [`Pool`](crate::Pool) can be addressed with.
///
/// Implemented by [`Handle`] itself and by every newtype declared with
/// [`define_handle!`](crate::define_handle).
pub trait PoolKey: Copy + Eq {
    /// Wrap a raw handle.
    fn from_handle(handle: Handle) -> Self;
    /// Unwrap to the raw handle.
    fn handle(self) -> Handle;
}

impl PoolKey for Handle {
    fn from_handle(handle: Handle) -> Self {
        handle
    }

    fn handle(self) -> Handle {
        self
    }
}

/// Declare a strongly typed handle wrapping [`Handle`].
///
/// ```
/// locus_core::define_handle! {
///     /// Handle to a texture.
///     pub struct TextureHandle;
/// }
///
/// let pool = locus_core::Pool::<u32, TextureHandle>::unbounded();
/// assert!(!pool.is_valid(TextureHandle::INVALID));
/// ```
#[macro_export]
macro_rules! define_handle {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        $vis struct $name($crate::Handle);

        impl $name {
            /// The reserved "no object" handle.
            pub const INVALID: Self = Self($crate::Handle::INVALID);

            /// Underlying generational handle.
            pub const fn raw(self) -> $crate::Handle {
                self.0
            }

            /// Slot index.
            pub const fn index(self) -> u32 {
                self.0.index()
            }

            /// Slot generation.
            pub const fn generation(self) -> u32 {
                self.0.generation()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl $crate::PoolKey for $name {
            fn from_handle(handle: $crate::Handle) -> Self {
                Self(handle)
            }

            fn handle(self) -> $crate::Handle {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}{}", stringify!($name), self.0)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_layout() {
        assert_eq!(Handle::INDEX_BITS, 22);
        assert_eq!(Handle::INDEX_MASK ^ Handle::GENERATION_MASK, u32::MAX);

        let handle = Handle::from_parts(5, 3);
        assert_eq!(handle.index(), 5);
        assert_eq!(handle.generation(), 3);
        assert_eq!(handle.to_bits(), 5 | (3 << 22));
    }

    #[test]
    fn regenerate_keeps_index() {
        let handle = Handle::new(42);
        let next = handle.regenerate();
        assert_eq!(next.index(), 42);
        assert_eq!(next.generation(), 1);
        assert_ne!(handle, next);
    }

    #[test]
    #[should_panic(expected = "generation overflow")]
    fn regenerate_overflow_panics() {
        Handle::from_parts(1, Handle::MAX_GENERATION).regenerate();
    }

    #[test]
    fn invalid_is_all_ones() {
        assert_eq!(Handle::INVALID.to_bits(), u32::MAX);
        assert!(Handle::INVALID.is_invalid());
        assert!(!Handle::new(0).is_invalid());
        assert_eq!(Handle::default(), Handle::INVALID);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn reserved_index_rejected() {
        Handle::new(Handle::MAX_INDEX);
    }

    #[test]
    fn display_format() {
        assert_eq!(Handle::from_parts(7, 2).to_string(), "#7:2");
        assert_eq!(Handle::INVALID.to_string(), "#invalid");
    }

    define_handle! {
        struct TestHandle;
    }

    #[test]
    fn typed_handle_roundtrip() {
        let raw = Handle::from_parts(3, 1);
        let typed = TestHandle::from_handle(raw);
        assert_eq!(typed.raw(), raw);
        assert_eq!(typed.index(), 3);
        assert_eq!(typed.generation(), 1);
        assert_eq!(TestHandle::default(), TestHandle::INVALID);
        assert_eq!(typed.to_string(), "TestHandle#3:1");
    }
}
