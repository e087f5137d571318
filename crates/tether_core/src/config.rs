//! Registry configuration

use crate::error::RegistryError;
use crate::handle::MAX_HANDLE;
use serde::{Deserialize, Serialize};

/// Sizing knobs for a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Highest handle the allocator may issue.
    pub handle_ceiling: u64,
    /// Number of lock shards in the pair table. Must be a power of two
    /// greater than one; `None` lets the map pick from the CPU count.
    pub shard_amount: Option<usize>,
    /// Pairs to reserve room for up front.
    pub initial_capacity: usize,
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.handle_ceiling == 0 || self.handle_ceiling > MAX_HANDLE {
            return Err(RegistryError::InvalidConfig {
                reason: format!(
                    "handle_ceiling must be in 1..={MAX_HANDLE}, got {}",
                    self.handle_ceiling
                ),
            });
        }
        if let Some(shards) = self.shard_amount {
            if shards < 2 || !shards.is_power_of_two() {
                return Err(RegistryError::InvalidConfig {
                    reason: format!("shard_amount must be a power of two > 1, got {shards}"),
                });
            }
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            handle_ceiling: MAX_HANDLE,
            shard_amount: None,
            initial_capacity: 0,
        }
    }
}
