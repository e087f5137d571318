//! Tether Core
//!
//! Shared-object registry linking native Rust objects to their script-side
//! proxies through opaque integer handles:
//! - Handle allocation (monotonic, never reused)
//! - Pair table and registry facade (thread-safe register/lookup/release)
//! - Lifecycle hook (exactly-once teardown across both domains)
//! - Process-wide host with per-runtime invalidation queues

mod allocator;
mod config;
mod error;
mod handle;
mod invalidation;
mod lifecycle;
mod pair;
mod registry;
mod shared_object;
mod table;

pub mod host;

pub use allocator::HandleAllocator;
pub use config::RegistryConfig;
pub use error::RegistryError;
pub use handle::{Handle, MAX_HANDLE};
pub use host::{Host, RuntimeAttachment, TeardownReport};
pub use invalidation::InvalidationQueue;
pub use lifecycle::{LifecycleHook, NativeDomain, ScriptDomain};
pub use pair::{ObjectPair, Side};
pub use registry::Registry;
pub use shared_object::{NativeRef, RuntimeId, ScriptRef, SharedObject};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
