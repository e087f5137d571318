//! Monotonic handle allocation

use crate::error::RegistryError;
use crate::handle::{Handle, MAX_HANDLE};
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues strictly increasing handles, starting at 1.
///
/// The counter is advanced with a compare-and-swap loop that refuses to step
/// past the ceiling, so an exhausted allocator keeps failing instead of
/// wrapping around onto handles that may still be live.
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicU64,
    ceiling: u64,
}

impl HandleAllocator {
    /// Allocator covering the full 63-bit handle space.
    pub fn new() -> Self {
        Self::with_ceiling(MAX_HANDLE)
    }

    /// Allocator that issues at most `ceiling` handles. Values above
    /// [`MAX_HANDLE`] are clamped.
    pub fn with_ceiling(ceiling: u64) -> Self {
        Self {
            next: AtomicU64::new(1),
            ceiling: ceiling.min(MAX_HANDLE),
        }
    }

    /// Issue the next handle.
    pub fn next(&self) -> Result<Handle, RegistryError> {
        let exhausted = RegistryError::HandleSpaceExhausted {
            ceiling: self.ceiling,
        };
        let raw = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                (n <= self.ceiling).then_some(n + 1)
            })
            .map_err(|_| exhausted.clone())?;
        Handle::from_raw(raw).ok_or(exhausted)
    }

    /// Number of handles issued so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_at_one_and_increases() {
        let allocator = HandleAllocator::new();
        let a = allocator.next().unwrap();
        let b = allocator.next().unwrap();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        assert_eq!(allocator.issued(), 2);
    }

    #[test]
    fn test_exhaustion_is_sticky() {
        let allocator = HandleAllocator::with_ceiling(2);
        assert!(allocator.next().is_ok());
        assert!(allocator.next().is_ok());

        let err = allocator.next().unwrap_err();
        assert_eq!(err, RegistryError::HandleSpaceExhausted { ceiling: 2 });
        // Never wraps back to a low handle
        assert!(allocator.next().is_err());
        assert_eq!(allocator.issued(), 2);
    }

    #[test]
    fn test_ceiling_is_clamped() {
        let allocator = HandleAllocator::with_ceiling(u64::MAX);
        assert_eq!(allocator.ceiling(), MAX_HANDLE);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let allocator = Arc::new(HandleAllocator::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                thread::spawn(move || {
                    (0..10_000)
                        .map(|_| allocator.next().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            let handles = worker.join().unwrap();
            // Each thread observes its own handles in increasing order
            assert!(handles.windows(2).all(|w| w[0] < w[1]));
            for handle in handles {
                assert!(seen.insert(handle), "duplicate handle {handle}");
            }
        }
        assert_eq!(seen.len(), 80_000);
    }
}
