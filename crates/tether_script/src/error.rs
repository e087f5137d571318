use tether_core::{Handle, RegistryError, RuntimeId};
use thiserror::Error;

/// Errors raised by a script runtime.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("javascript error: {0}")]
    Js(#[from] rquickjs::Error),

    #[error("uncaught exception: {message}")]
    Exception { message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("handle {0} cannot be represented as a script number")]
    HandleNotRepresentable(Handle),

    #[error("pending job failed in runtime {0}")]
    Job(RuntimeId),
}
