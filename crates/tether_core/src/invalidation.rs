//! Per-runtime queue of proxies to invalidate.
//!
//! Native objects may be destroyed on any thread, but a script runtime may
//! only be touched from its own thread. When the native half of a pair goes
//! away, its handle is pushed here; the runtime drains the queue the next
//! time it is entered and drops the matching proxies.
//!
//! ## Usage
//!
//! ```ignore
//! let attachment = host.attach_runtime();
//!
//! // From any thread, via the lifecycle hook
//! attachment.queue().push(handle);
//!
//! // On the script thread
//! for handle in attachment.queue().take_all() {
//!     proxies.invalidate(handle);
//! }
//! ```

use crate::handle::Handle;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub struct InvalidationQueue {
    /// Handles whose proxies should be dropped
    queue: Mutex<VecDeque<Handle>>,

    /// Fast check for pending items (avoids lock acquisition on hot path)
    pending_count: AtomicU64,
}

impl Default for InvalidationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InvalidationQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(8)),
            pending_count: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Handle>> {
        // A panic while pushing cannot leave the deque half-written
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a proxy for invalidation. Safe from any thread.
    pub fn push(&self, handle: Handle) {
        {
            let mut queue = self.lock();
            queue.push_back(handle);
            self.pending_count.fetch_add(1, Ordering::Release);
        }

        tracing::trace!(%handle, pending = self.len(), "queued proxy invalidation");
    }

    /// Lock-free check for pending invalidations.
    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending_count.load(Ordering::Acquire) > 0
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.pending_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    /// Take every pending handle, oldest first.
    pub fn take_all(&self) -> Vec<Handle> {
        if !self.has_pending() {
            return Vec::new();
        }

        let mut queue = self.lock();
        let handles: Vec<Handle> = queue.drain(..).collect();
        // Counter only moves under the lock, so it never underflows
        self.pending_count
            .fetch_sub(handles.len() as u64, Ordering::Release);
        handles
    }
}

impl std::fmt::Debug for InvalidationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationQueue")
            .field("pending_count", &self.len())
            .finish()
    }
}
