//! Registry facade
//!
//! The only way to create, resolve or remove a pair. Combines the handle
//! allocator with the pair table and records diagnostics counters.
//!
//! ## Ordering
//!
//! - `register` inserts before returning the handle, so any thread that later
//!   sees the handle also sees the pair.
//! - `release` removes atomically. Of any number of racing releases for one
//!   handle, exactly one returns the pair; the rest (and every later
//!   `lookup`) return `None`.
//! - Releases of different handles only contend when they hash to the same
//!   shard.

use crate::allocator::HandleAllocator;
use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::handle::Handle;
use crate::pair::ObjectPair;
use crate::table::PairTable;
use std::fmt;
use tether_metrics::Counter;

/// Thread-safe table of native/script object pairs.
pub struct Registry<N, S> {
    allocator: HandleAllocator,
    table: PairTable<N, S>,
    counters: Counter,
}

impl<N, S> Registry<N, S> {
    /// Create a registry with the default configuration.
    pub fn new() -> Self {
        let config = RegistryConfig::default();
        Self {
            allocator: HandleAllocator::with_ceiling(config.handle_ceiling),
            table: PairTable::with_config(&config),
            counters: Counter::new(),
        }
    }

    /// Create a registry from a validated configuration.
    pub fn with_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        config.validate()?;
        Ok(Self {
            allocator: HandleAllocator::with_ceiling(config.handle_ceiling),
            table: PairTable::with_config(config),
            counters: Counter::new(),
        })
    }

    /// Store a new pair and return its handle.
    ///
    /// Fails only when the handle space is exhausted, in which case nothing
    /// is inserted.
    pub fn register(&self, native: N, script: S) -> Result<Handle, RegistryError> {
        let handle = self.allocator.next()?;
        self.table.insert(handle, ObjectPair::new(native, script));
        self.counters.increment("registered", 1);
        tracing::trace!(%handle, "registered pair");
        Ok(handle)
    }

    /// Resolve a handle to its pair, or `None` if unknown or already released.
    pub fn lookup(&self, handle: Handle) -> Option<ObjectPair<N, S>>
    where
        N: Clone,
        S: Clone,
    {
        let pair = self.table.get(handle);
        if pair.is_none() {
            self.counters.increment("lookup_not_found", 1);
        }
        pair
    }

    /// Remove a pair and hand it back for teardown.
    ///
    /// Returns `None` if the handle is unknown or was already released,
    /// including by a concurrent caller that won the race.
    pub fn release(&self, handle: Handle) -> Option<ObjectPair<N, S>> {
        match self.table.remove(handle) {
            Some(pair) => {
                self.counters.increment("released", 1);
                tracing::trace!(%handle, "released pair");
                Some(pair)
            }
            None => {
                self.counters.increment("release_not_found", 1);
                tracing::trace!(%handle, "release of unknown handle ignored");
                None
            }
        }
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.table.contains(handle)
    }

    /// Number of live pairs.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live handles in allocation order.
    pub fn handles(&self) -> Vec<Handle> {
        self.table.handles()
    }

    /// Release every live pair, oldest first.
    pub fn drain(&self) -> Vec<(Handle, ObjectPair<N, S>)> {
        let drained = self.table.drain();
        self.counters.increment("released", drained.len());
        drained
    }

    /// Total handles issued over the registry's lifetime.
    pub fn issued(&self) -> u64 {
        self.allocator.issued()
    }

    pub fn counters(&self) -> &Counter {
        &self.counters
    }
}

impl<N, S> Default for Registry<N, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, S> fmt::Debug for Registry<N, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("live", &self.len())
            .field("issued", &self.issued())
            .field("ceiling", &self.allocator.ceiling())
            .finish()
    }
}
