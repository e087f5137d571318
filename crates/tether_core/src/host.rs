//! Process-wide shared object host
//!
//! One [`Host`] lives for the lifetime of the embedding application. It owns
//! the registry of native/script pairs, the lifecycle hook that cascades
//! destruction between domains, and one invalidation queue per attached
//! script runtime.
//!
//! ```ignore
//! let host = tether_core::host::init(&RegistryConfig::default())?;
//! let attachment = host.attach_runtime();
//! let handle = host.register(native, attachment.id())?;
//! // ...
//! let report = tether_core::host::teardown()?;
//! ```

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::handle::Handle;
use crate::invalidation::InvalidationQueue;
use crate::lifecycle::{LifecycleHook, NativeDomain, ScriptDomain};
use crate::pair::{ObjectPair, Side};
use crate::registry::Registry;
use crate::shared_object::{NativeRef, RuntimeId, ScriptRef};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub type SharedObjectRegistry = Registry<NativeRef, ScriptRef>;
pub type SharedObjectPair = ObjectPair<NativeRef, ScriptRef>;

/// The installed host, if any.
static HOST: Lazy<RwLock<Option<Arc<Host>>>> = Lazy::new(|| RwLock::new(None));

/// Install the process-wide host.
pub fn init(config: &RegistryConfig) -> Result<Arc<Host>, RegistryError> {
    let mut slot = HOST.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(RegistryError::AlreadyInitialized);
    }
    let host = Arc::new(Host::new(config)?);
    *slot = Some(Arc::clone(&host));
    tracing::debug!(ceiling = config.handle_ceiling, "shared object host initialized");
    Ok(host)
}

/// The process-wide host installed by [`init`].
pub fn current() -> Result<Arc<Host>, RegistryError> {
    HOST.read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(RegistryError::NotInitialized)
}

/// Uninstall the process-wide host and release every remaining pair.
///
/// Holders of an `Arc<Host>` obtained earlier keep a working host, but
/// `current()` fails from here on until `init` is called again.
pub fn teardown() -> Result<TeardownReport, RegistryError> {
    let host = HOST
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
        .ok_or(RegistryError::NotInitialized)?;
    // Lock is released: native teardown may call back into `current()`
    Ok(host.shutdown())
}

/// Outcome of releasing whatever was still live at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    /// Pairs released by the teardown itself.
    pub released: usize,
    /// Handles issued over the host's lifetime.
    pub issued: u64,
}

/// Frees native objects when their script half goes away.
struct SharedObjectDomain;

impl NativeDomain<NativeRef> for SharedObjectDomain {
    fn destroy(&self, handle: Handle, native: NativeRef) {
        tracing::trace!(%handle, type_name = native.type_name(), "releasing native object");
        native.on_release(handle);
    }
}

/// Routes proxy invalidations to the queue of the runtime that owns them.
#[derive(Default)]
struct RuntimeQueues {
    next_id: AtomicU64,
    queues: DashMap<RuntimeId, Arc<InvalidationQueue>>,
}

impl ScriptDomain<ScriptRef> for RuntimeQueues {
    fn invalidate(&self, handle: Handle, script: ScriptRef) {
        let runtime = script.runtime();
        // Clone out so the map shard is unlocked before touching the queue
        let queue = self.queues.get(&runtime).map(|q| Arc::clone(q.value()));
        match queue {
            Some(queue) => queue.push(handle),
            None => tracing::debug!(%handle, %runtime, "runtime already detached"),
        }
    }
}

/// A script runtime's link to the host.
#[derive(Debug, Clone)]
pub struct RuntimeAttachment {
    id: RuntimeId,
    queue: Arc<InvalidationQueue>,
}

impl RuntimeAttachment {
    pub fn id(&self) -> RuntimeId {
        self.id
    }

    pub fn queue(&self) -> &Arc<InvalidationQueue> {
        &self.queue
    }
}

/// Registry, lifecycle hook and runtime queues for one embedding.
pub struct Host {
    hook: LifecycleHook<NativeRef, ScriptRef>,
    runtimes: Arc<RuntimeQueues>,
    closed: AtomicBool,
}

impl Host {
    /// Build a host without installing it globally.
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let registry = Arc::new(Registry::with_config(config)?);
        let runtimes = Arc::new(RuntimeQueues::default());
        let hook = LifecycleHook::new(
            registry,
            Arc::new(SharedObjectDomain),
            Arc::clone(&runtimes) as Arc<dyn ScriptDomain<ScriptRef>>,
        );
        Ok(Self {
            hook,
            runtimes,
            closed: AtomicBool::new(false),
        })
    }

    pub fn registry(&self) -> &Arc<SharedObjectRegistry> {
        self.hook.registry()
    }

    /// Register a script runtime so it can receive invalidations.
    pub fn attach_runtime(&self) -> RuntimeAttachment {
        let id = RuntimeId(self.runtimes.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let queue = Arc::new(InvalidationQueue::new());
        self.runtimes.queues.insert(id, Arc::clone(&queue));
        tracing::debug!(runtime = %id, "script runtime attached");
        RuntimeAttachment { id, queue }
    }

    /// Stop routing invalidations to `runtime`. Returns handles that were
    /// queued but never drained.
    pub fn detach_runtime(&self, runtime: RuntimeId) -> Vec<Handle> {
        let pending = self
            .runtimes
            .queues
            .remove(&runtime)
            .map(|(_, queue)| queue.take_all())
            .unwrap_or_default();
        tracing::debug!(%runtime, pending = pending.len(), "script runtime detached");
        pending
    }

    /// Pair `native` with a proxy living in `runtime`.
    ///
    /// Fails with [`RegistryError::ShutDown`] once [`Host::shutdown`] ran.
    pub fn register(&self, native: NativeRef, runtime: RuntimeId) -> Result<Handle, RegistryError> {
        if self.is_closed() {
            return Err(RegistryError::ShutDown);
        }
        let handle = self.registry().register(native, ScriptRef::new(runtime))?;
        // Raced with shutdown: its drain may have missed this pair
        if self.is_closed() {
            self.registry().release(handle);
            return Err(RegistryError::ShutDown);
        }
        Ok(handle)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn lookup(&self, handle: Handle) -> Option<SharedObjectPair> {
        self.registry().lookup(handle)
    }

    /// Native half of a live pair.
    pub fn native(&self, handle: Handle) -> Option<NativeRef> {
        self.lookup(handle).map(|pair| pair.into_parts().0)
    }

    /// Remove a pair without running teardown on either side.
    pub fn release(&self, handle: Handle) -> Option<SharedObjectPair> {
        self.registry().release(handle)
    }

    /// Report destruction of one side; see [`LifecycleHook::on_side_destroyed`].
    pub fn on_side_destroyed(&self, handle: Handle, side: Side) -> bool {
        self.hook.on_side_destroyed(handle, side)
    }

    /// Close the host and release every remaining pair.
    ///
    /// Each leftover pair gets native teardown, and its proxy is queued for
    /// invalidation in the owning runtime. Runtimes keep their queues and
    /// apply those invalidations the next time they are entered, but no
    /// further invalidations are routed to them.
    pub fn shutdown(&self) -> TeardownReport {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("shared object host already shut down");
        }

        let drained = self.registry().drain();
        if !drained.is_empty() {
            tracing::warn!(live = drained.len(), "pairs still live at host teardown");
        }
        let released = drained.len();
        for (handle, pair) in drained {
            let (native, script) = pair.into_parts();
            self.runtimes.invalidate(handle, script);
            SharedObjectDomain.destroy(handle, native);
        }

        let runtimes = self.attached_runtimes();
        self.runtimes.queues.clear();
        tracing::debug!(runtimes = runtimes.len(), "script runtimes unrouted");
        TeardownReport {
            released,
            issued: self.registry().issued(),
        }
    }

    fn attached_runtimes(&self) -> Vec<RuntimeId> {
        self.runtimes.queues.iter().map(|entry| *entry.key()).collect()
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("registry", self.registry())
            .field("runtimes", &self.runtimes.queues.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_object::SharedObject;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[derive(Default)]
    struct Tracked {
        releases: AtomicUsize,
    }

    impl SharedObject for Tracked {
        fn type_name(&self) -> &'static str {
            "Tracked"
        }

        fn on_release(&self, _handle: Handle) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn host() -> Host {
        Host::new(&RegistryConfig::default()).unwrap()
    }

    #[test]
    fn test_script_release_frees_native_once() {
        let host = host();
        let rt = host.attach_runtime();
        let tracked = Arc::new(Tracked::default());
        let handle = host.register(tracked.clone(), rt.id()).unwrap();

        assert_eq!(host.native(handle).map(|n| n.type_name()), Some("Tracked"));
        assert!(host.on_side_destroyed(handle, Side::Script));
        assert!(!host.on_side_destroyed(handle, Side::Script));
        assert!(!host.on_side_destroyed(handle, Side::Native));

        assert_eq!(tracked.releases.load(Ordering::SeqCst), 1);
        assert!(rt.queue().is_empty());
        // Registry no longer holds the native object
        assert_eq!(Arc::strong_count(&tracked), 1);
    }

    #[test]
    fn test_native_destroy_queues_invalidation_for_owner() {
        let host = host();
        let rt_a = host.attach_runtime();
        let rt_b = host.attach_runtime();
        assert_ne!(rt_a.id(), rt_b.id());

        let tracked = Arc::new(Tracked::default());
        let handle = host.register(tracked.clone(), rt_b.id()).unwrap();

        assert!(host.on_side_destroyed(handle, Side::Native));
        assert!(rt_a.queue().is_empty());
        assert_eq!(rt_b.queue().take_all(), vec![handle]);
        // Native side destroyed itself; no release callback
        assert_eq!(tracked.releases.load(Ordering::SeqCst), 0);

        // Late finalizer from the script side
        assert!(!host.on_side_destroyed(handle, Side::Script));
        assert_eq!(tracked.releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalidation_after_detach_is_dropped() {
        let host = host();
        let rt = host.attach_runtime();
        let handle = host.register(Arc::new(Tracked::default()), rt.id()).unwrap();

        assert!(host.detach_runtime(rt.id()).is_empty());
        assert!(host.on_side_destroyed(handle, Side::Native));
        assert!(rt.queue().is_empty());
    }

    #[test]
    fn test_racing_sides_release_native_at_most_once() {
        for _ in 0..100 {
            let host = Arc::new(host());
            let rt = host.attach_runtime();
            let tracked = Arc::new(Tracked::default());
            let handle = host.register(tracked.clone(), rt.id()).unwrap();

            let native_side = {
                let host = Arc::clone(&host);
                thread::spawn(move || host.on_side_destroyed(handle, Side::Native))
            };
            let script_side = {
                let host = Arc::clone(&host);
                thread::spawn(move || host.on_side_destroyed(handle, Side::Script))
            };
            let native_won = native_side.join().unwrap();
            let script_won = script_side.join().unwrap();

            assert!(native_won ^ script_won);
            let released = tracked.releases.load(Ordering::SeqCst);
            let invalidated = rt.queue().take_all().len();
            assert_eq!(released + invalidated, 1);
        }
    }

    #[test]
    fn test_shutdown_releases_leftovers() {
        let host = host();
        let rt = host.attach_runtime();
        let tracked_set: Vec<_> = (0..3).map(|_| Arc::new(Tracked::default())).collect();
        let handles: Vec<_> = tracked_set
            .iter()
            .map(|p| host.register(p.clone(), rt.id()).unwrap())
            .collect();
        host.on_side_destroyed(handles[0], Side::Script);

        let report = host.shutdown();
        assert_eq!(report, TeardownReport { released: 2, issued: 3 });
        assert!(tracked_set
            .iter()
            .all(|p| p.releases.load(Ordering::SeqCst) == 1));
        assert!(host.registry().is_empty());
        assert!(host.attached_runtimes().is_empty());

        // Leftover proxies are still queued for their runtime
        assert_eq!(rt.queue().take_all(), handles[1..].to_vec());
    }

    #[test]
    fn test_shutdown_host_refuses_new_pairs() {
        let host = host();
        let rt = host.attach_runtime();
        assert!(!host.is_closed());

        host.shutdown();
        assert!(host.is_closed());
        assert_eq!(
            host.register(Arc::new(Tracked::default()), rt.id()).unwrap_err(),
            RegistryError::ShutDown
        );
        assert!(host.registry().is_empty());
        assert_eq!(host.registry().issued(), 0);

        // Second shutdown has nothing left to release
        assert_eq!(host.shutdown().released, 0);
    }

    #[test]
    fn test_global_lifecycle() {
        // The only test touching the process-wide slot
        assert_eq!(current().unwrap_err(), RegistryError::NotInitialized);
        assert_eq!(teardown().unwrap_err(), RegistryError::NotInitialized);

        let host = init(&RegistryConfig::default()).unwrap();
        assert_eq!(
            init(&RegistryConfig::default()).unwrap_err(),
            RegistryError::AlreadyInitialized
        );
        assert!(Arc::ptr_eq(&host, &current().unwrap()));

        let rt = host.attach_runtime();
        let tracked = Arc::new(Tracked::default());
        host.register(tracked.clone(), rt.id()).unwrap();

        let report = teardown().unwrap();
        assert_eq!(report.released, 1);
        assert_eq!(tracked.releases.load(Ordering::SeqCst), 1);
        assert!(current().is_err());

        // A fresh host starts a fresh handle space
        let again = init(&RegistryConfig::default()).unwrap();
        let rt = again.attach_runtime();
        let handle = again.register(Arc::new(Tracked::default()), rt.id()).unwrap();
        assert_eq!(handle.get(), 1);
        teardown().unwrap();
    }
}
