use thiserror::Error;

/// Errors raised by the registry and the process-wide host.
///
/// A missing handle is not an error: lookups and releases report it as
/// `None`, since stale handles are routine when two domains tear down
/// independently.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("handle space exhausted: {ceiling} handles already issued")]
    HandleSpaceExhausted { ceiling: u64 },

    #[error("invalid registry config: {reason}")]
    InvalidConfig { reason: String },

    #[error("shared object host is already initialized")]
    AlreadyInitialized,

    #[error("shared object host is not initialized")]
    NotInitialized,

    #[error("shared object host has been shut down")]
    ShutDown,
}
