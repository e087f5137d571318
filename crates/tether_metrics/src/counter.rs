//! Named counters for tracking events

use dashmap::DashMap;

/// Thread-safe named counters.
///
/// Counters are bumped from whichever thread triggers the event, so the map
/// is sharded rather than guarded by a single lock.
#[derive(Debug)]
pub struct Counter {
    counters: DashMap<&'static str, usize>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    pub fn increment(&self, name: &'static str, value: usize) {
        *self.counters.entry(name).or_insert(0) += value;
    }

    pub fn set(&self, name: &'static str, value: usize) {
        self.counters.insert(name, value);
    }

    pub fn get(&self, name: &str) -> usize {
        self.counters.get(name).map(|v| *v).unwrap_or(0)
    }

    pub fn reset(&self, name: &'static str) {
        self.counters.insert(name, 0);
    }

    pub fn reset_all(&self) {
        self.counters.clear();
    }

    /// Copy out every counter, sorted by name.
    pub fn snapshot(&self) -> Vec<(&'static str, usize)> {
        let mut entries: Vec<_> = self
            .counters
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        entries.sort_unstable_by_key(|(name, _)| *name);
        entries
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}
