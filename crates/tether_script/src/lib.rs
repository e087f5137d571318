//! Tether Scripting Bridge
//!
//! JavaScript execution via QuickJS with native objects mirrored as proxies.
//!
//! ## Architecture
//!
//! - **Proxies:** plain script objects carrying only the registry handle
//! - **Store:** the runtime records which handles it owns; proxies themselves are
//!   held weakly
//! - **Lifecycle:** `proxy.release()`, collection of an unreachable proxy or dropping
//!   the runtime releases the native side; native destruction queues an
//!   invalidation applied on the script thread

mod error;
mod proxy;

pub mod ffi;
pub mod runtime;

pub use error::ScriptError;
pub use rquickjs;
pub use runtime::ScriptRuntime;
