//! Native and script references stored in the process-wide registry

use crate::handle::Handle;
use std::fmt;
use std::sync::Arc;

/// A native object that can be mirrored into a script runtime.
pub trait SharedObject: Send + Sync + 'static {
    /// Name shown to scripts and in diagnostics.
    fn type_name(&self) -> &'static str;

    /// Called exactly once when the pair under `handle` is torn down from
    /// the script side (or at host teardown). The registry drops its `Arc`
    /// right after.
    fn on_release(&self, _handle: Handle) {}
}

/// Shared-ownership reference to a native object.
pub type NativeRef = Arc<dyn SharedObject>;

/// Identifier of a script runtime attached to a host.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeId(pub(crate) u64);

impl RuntimeId {
    #[inline]
    pub fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rt{}", self.0)
    }
}

/// Weak locator for the script half of a pair.
///
/// The strong reference keeping the proxy alive lives in the owning
/// runtime's proxy store, keyed by handle. This token only says which
/// runtime to notify, so it is `Send` and cheap to copy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ScriptRef {
    runtime: RuntimeId,
}

impl ScriptRef {
    pub fn new(runtime: RuntimeId) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> RuntimeId {
        self.runtime
    }
}
