//! Opaque handle naming a live native/script object pair
//!
//! Handles are plain integers so they can travel into the script domain as a
//! number property. Zero is reserved as "no handle".

use std::fmt;
use std::num::NonZeroU64;

/// Largest handle the registry will ever issue (63 usable bits).
pub const MAX_HANDLE: u64 = i64::MAX as u64;

/// Handle shared by both halves of an object pair.
///
/// Backed by a `NonZeroU64`, so `Option<Handle>` is the same size as a `u64`
/// and the reserved zero can never be constructed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(NonZeroU64);

impl Handle {
    /// Wrap a raw value, rejecting the reserved zero and anything above
    /// [`MAX_HANDLE`].
    pub fn from_raw(raw: u64) -> Option<Self> {
        if raw > MAX_HANDLE {
            return None;
        }
        NonZeroU64::new(raw).map(Self)
    }

    /// Return the raw value backing this handle.
    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<Handle> for u64 {
    fn from(handle: Handle) -> Self {
        handle.get()
    }
}
