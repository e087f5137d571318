use crate::config::RegistryConfig;
use crate::handle::Handle;
use crate::pair::ObjectPair;
use dashmap::DashMap;

/// Handle → pair storage.
///
/// Only the registry facade touches this. Every access holds a shard lock for
/// the duration of a single map operation and never across a callback.
pub(crate) struct PairTable<N, S> {
    pairs: DashMap<Handle, ObjectPair<N, S>>,
}

impl<N, S> PairTable<N, S> {
    pub fn with_config(config: &RegistryConfig) -> Self {
        let pairs = match config.shard_amount {
            Some(shards) => DashMap::with_capacity_and_shard_amount(config.initial_capacity, shards),
            None => DashMap::with_capacity(config.initial_capacity),
        };
        Self { pairs }
    }

    pub fn insert(&self, handle: Handle, pair: ObjectPair<N, S>) {
        let previous = self.pairs.insert(handle, pair);
        debug_assert!(previous.is_none(), "handle {handle} inserted twice");
    }

    pub fn get(&self, handle: Handle) -> Option<ObjectPair<N, S>>
    where
        N: Clone,
        S: Clone,
    {
        // Clone out so the shard guard is dropped before returning
        self.pairs.get(&handle).map(|entry| entry.value().clone())
    }

    /// Atomic remove: of any number of racing callers, exactly one gets the pair.
    pub fn remove(&self, handle: Handle) -> Option<ObjectPair<N, S>> {
        self.pairs.remove(&handle).map(|(_, pair)| pair)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.pairs.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Live handles, oldest first.
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.pairs.iter().map(|entry| *entry.key()).collect();
        handles.sort_unstable();
        handles
    }

    /// Remove every pair, oldest first. Pairs released concurrently by
    /// someone else are skipped rather than reported twice.
    pub fn drain(&self) -> Vec<(Handle, ObjectPair<N, S>)> {
        self.handles()
            .into_iter()
            .filter_map(|handle| self.remove(handle).map(|pair| (handle, pair)))
            .collect()
    }
}
