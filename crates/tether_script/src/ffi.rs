//! FFI layer between Rust and scripts
//!
//! Handles cross into JavaScript as plain numbers, so only values that a
//! double can hold exactly are allowed through.

use tether_core::Handle;

/// Largest integer a JavaScript number represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Handle as seen by script code.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScriptHandle(pub f64);

impl ScriptHandle {
    /// Sentinel written into invalidated proxies.
    pub const NONE: ScriptHandle = ScriptHandle(0.0);

    /// Convert back to a registry handle. Anything that is not an exact
    /// positive safe integer maps to `None`.
    pub fn to_handle(self) -> Option<Handle> {
        let value = self.0;
        if !value.is_finite() || value.fract() != 0.0 {
            return None;
        }
        if value < 1.0 || value > MAX_SAFE_INTEGER as f64 {
            return None;
        }
        Handle::from_raw(value as u64)
    }
}

impl TryFrom<Handle> for ScriptHandle {
    type Error = Handle;

    /// Fails for handles above [`MAX_SAFE_INTEGER`], returning the handle.
    fn try_from(handle: Handle) -> Result<Self, Self::Error> {
        if handle.get() > MAX_SAFE_INTEGER {
            return Err(handle);
        }
        Ok(ScriptHandle(handle.get() as f64))
    }
}
