//! Lifecycle hook: cascade destruction from one side of a pair to the other
//!
//! Either domain may report that its half of a pair is going away, in any
//! order and from any thread. The first report removes the pair and tells the
//! opposite domain to drop its half; every later report for the same handle
//! is a no-op.
//!
//! ```text
//!  native drop ──┐                          ┌──▶ ScriptDomain::invalidate
//!                ├──▶ on_side_destroyed ──▶ release ─┤
//!  script release┘        (first wins)      └──▶ NativeDomain::destroy
//! ```

use crate::handle::Handle;
use crate::pair::Side;
use crate::registry::Registry;
use std::sync::Arc;

/// Native half of the teardown contract.
pub trait NativeDomain<N>: Send + Sync {
    /// The script half of `handle` is gone; free the native half.
    fn destroy(&self, handle: Handle, native: N);
}

/// Script half of the teardown contract.
pub trait ScriptDomain<S>: Send + Sync {
    /// The native half of `handle` is gone; drop the proxy.
    fn invalidate(&self, handle: Handle, script: S);
}

/// Routes destruction reports through the registry to the opposite domain.
pub struct LifecycleHook<N, S> {
    registry: Arc<Registry<N, S>>,
    native: Arc<dyn NativeDomain<N>>,
    script: Arc<dyn ScriptDomain<S>>,
}

impl<N, S> LifecycleHook<N, S> {
    pub fn new(
        registry: Arc<Registry<N, S>>,
        native: Arc<dyn NativeDomain<N>>,
        script: Arc<dyn ScriptDomain<S>>,
    ) -> Self {
        Self {
            registry,
            native,
            script,
        }
    }

    pub fn registry(&self) -> &Arc<Registry<N, S>> {
        &self.registry
    }

    /// Report that `side` of `handle` is being destroyed.
    ///
    /// Returns `true` if this call removed the pair and cascaded teardown to
    /// the other side, `false` if the pair was already gone. The teardown
    /// callback runs after the table lock is released, so it may re-enter
    /// the registry.
    pub fn on_side_destroyed(&self, handle: Handle, side: Side) -> bool {
        let Some(pair) = self.registry.release(handle) else {
            tracing::debug!(%handle, %side, "stale destruction report ignored");
            return false;
        };

        let (native, script) = pair.into_parts();
        match side {
            Side::Native => {
                // Owner is already destroying it; just drop our reference
                drop(native);
                self.script.invalidate(handle, script);
            }
            Side::Script => {
                drop(script);
                self.native.destroy(handle, native);
            }
        }
        tracing::debug!(%handle, %side, "pair torn down");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};
    use std::thread;

    #[derive(Default)]
    struct CountingNative {
        destroyed: Mutex<Vec<Handle>>,
    }

    impl NativeDomain<&'static str> for CountingNative {
        fn destroy(&self, handle: Handle, _native: &'static str) {
            self.destroyed.lock().unwrap().push(handle);
        }
    }

    #[derive(Default)]
    struct CountingScript {
        invalidated: AtomicUsize,
    }

    impl ScriptDomain<&'static str> for CountingScript {
        fn invalidate(&self, _handle: Handle, _script: &'static str) {
            self.invalidated.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fixture() -> (
        LifecycleHook<&'static str, &'static str>,
        Arc<CountingNative>,
        Arc<CountingScript>,
    ) {
        let native = Arc::new(CountingNative::default());
        let script = Arc::new(CountingScript::default());
        let hook = LifecycleHook::new(
            Arc::new(Registry::new()),
            native.clone(),
            script.clone(),
        );
        (hook, native, script)
    }

    #[test]
    fn test_script_side_destroys_native() {
        let (hook, native, script) = fixture();
        let handle = hook.registry().register("native", "proxy").unwrap();

        assert!(hook.on_side_destroyed(handle, Side::Script));
        assert_eq!(*native.destroyed.lock().unwrap(), vec![handle]);
        assert_eq!(script.invalidated.load(Ordering::SeqCst), 0);
        assert!(hook.registry().lookup(handle).is_none());
    }

    #[test]
    fn test_late_script_finalizer_after_native_release() {
        let (hook, native, script) = fixture();
        let handle = hook.registry().register("native", "proxy").unwrap();

        assert!(hook.on_side_destroyed(handle, Side::Native));
        assert_eq!(script.invalidated.load(Ordering::SeqCst), 1);

        // Finalizer runs late on the script side
        assert!(!hook.on_side_destroyed(handle, Side::Script));
        assert!(native.destroyed.lock().unwrap().is_empty());
        assert_eq!(script.invalidated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_racing_dual_release_tears_down_once() {
        for _ in 0..200 {
            let (hook, native, script) = fixture();
            let hook = Arc::new(hook);
            let handle = hook.registry().register("native", "proxy").unwrap();
            let barrier = Arc::new(Barrier::new(2));

            let racers: Vec<_> = [Side::Native, Side::Script]
                .into_iter()
                .map(|side| {
                    let hook = Arc::clone(&hook);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        hook.on_side_destroyed(handle, side)
                    })
                })
                .collect();
            let wins = racers
                .into_iter()
                .map(|racer| racer.join().unwrap())
                .filter(|won| *won)
                .count();

            assert_eq!(wins, 1);
            let teardowns = native.destroyed.lock().unwrap().len()
                + script.invalidated.load(Ordering::SeqCst);
            assert_eq!(teardowns, 1);
        }
    }

    #[test]
    fn test_teardown_may_reenter_registry() {
        struct Reentrant {
            registry: Arc<Registry<&'static str, &'static str>>,
            seen_live: AtomicUsize,
        }

        impl NativeDomain<&'static str> for Reentrant {
            fn destroy(&self, _handle: Handle, _native: &'static str) {
                // Would deadlock if a shard lock were still held
                self.seen_live.store(self.registry.len(), Ordering::SeqCst);
                self.registry.register("replacement", "proxy").unwrap();
            }
        }

        let registry = Arc::new(Registry::new());
        let native = Arc::new(Reentrant {
            registry: registry.clone(),
            seen_live: AtomicUsize::new(usize::MAX),
        });
        let hook = LifecycleHook::new(
            registry.clone(),
            native.clone(),
            Arc::new(CountingScript::default()),
        );

        let handle = registry.register("native", "proxy").unwrap();
        assert!(hook.on_side_destroyed(handle, Side::Script));
        assert_eq!(native.seen_live.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);
    }
}
