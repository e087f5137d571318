//! Proxies owned by a script runtime
//!
//! The engine holds proxy objects only weakly. This store records which
//! handles this runtime still owns, so each pair is reported destroyed from
//! the script side at most once, and never by a runtime that does not own
//! it. Only ever touched from the runtime's own thread.

use std::collections::HashSet;
use tether_core::Handle;

#[derive(Debug, Default)]
pub(crate) struct ProxyStore {
    owned: HashSet<Handle>,
}

impl ProxyStore {
    pub fn insert(&mut self, handle: Handle) {
        let fresh = self.owned.insert(handle);
        debug_assert!(fresh, "proxy for {handle} stored twice");
    }

    /// Forget `handle`. Returns `false` if this runtime did not own it.
    pub fn remove(&mut self, handle: Handle) -> bool {
        self.owned.remove(&handle)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.owned.contains(&handle)
    }

    pub fn len(&self) -> usize {
        self.owned.len()
    }

    /// Every owned handle, oldest first.
    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.owned.iter().copied().collect();
        handles.sort_unstable();
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(raw: u64) -> Handle {
        Handle::from_raw(raw).unwrap()
    }

    #[test]
    fn test_remove_reports_ownership_once() {
        let mut store = ProxyStore::default();
        store.insert(handle(2));
        store.insert(handle(1));

        assert_eq!(store.handles(), vec![handle(1), handle(2)]);
        assert!(store.remove(handle(2)));
        assert!(!store.remove(handle(2)));
        assert!(!store.remove(handle(7)));
        assert_eq!(store.len(), 1);
    }
}
