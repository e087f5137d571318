//! Script runtime management
//!
//! Wraps a QuickJS runtime attached to a shared object host. Native objects
//! are mirrored into script code as proxy objects:
//!
//! ```js
//! proxy.handle     // registry handle, 0 once invalidated
//! proxy.typeName   // SharedObject::type_name()
//! proxy.isAlive()  // pair still registered
//! proxy.release()  // script side lets go; native side is released
//! ```
//!
//! Proxies are held weakly. When the collector frees one, a
//! `FinalizationRegistry` callback reports script-side destruction.
//!
//! Native-side destruction may happen on any thread. It queues an
//! invalidation that is applied the next time this runtime is entered
//! (`pump`, `execute`, `eval`, `call_function`, `wrap`).

use crate::error::ScriptError;
use crate::ffi::ScriptHandle;
use crate::proxy::ProxyStore;
use rquickjs::{Context, Ctx, FromJs, Function, Object, Runtime};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tether_core::{Handle, Host, NativeRef, RuntimeAttachment, RuntimeId, Side};

const RELEASE_FN: &str = "__tether_release";
const FINALIZE_FN: &str = "__tether_finalize";
const IS_ALIVE_FN: &str = "__tether_is_alive";
const MAKE_PROXY_FN: &str = "__tether_make_proxy";
const INVALIDATE_FN: &str = "__tether_invalidate";

const PRELUDE: &str = r#"
(() => {
    const release = globalThis.__tether_release;
    const finalize = globalThis.__tether_finalize;
    const isAlive = globalThis.__tether_is_alive;
    const live = new Map();
    const finalizers = new FinalizationRegistry((handle) => {
        live.delete(handle);
        finalize(handle);
    });
    const forget = (proxy, handle) => {
        proxy.handle = 0;
        live.delete(handle);
        finalizers.unregister(proxy);
    };
    globalThis.__tether_make_proxy = (handle, typeName) => {
        const proxy = {
            handle,
            typeName,
            isAlive() {
                return this.handle !== 0 && isAlive(this.handle);
            },
            release() {
                if (this.handle === 0) {
                    return false;
                }
                const handle = this.handle;
                forget(this, handle);
                return release(handle);
            },
        };
        live.set(handle, new WeakRef(proxy));
        finalizers.register(proxy, handle, proxy);
        return proxy;
    };
    globalThis.__tether_invalidate = (handle) => {
        const ref = live.get(handle);
        const proxy = ref && ref.deref();
        if (proxy) {
            forget(proxy, handle);
        } else {
            live.delete(handle);
        }
    };
})();
"#;

/// Script execution context
pub struct ScriptRuntime {
    host: Arc<Host>,
    attachment: RuntimeAttachment,
    proxies: Rc<RefCell<ProxyStore>>,
    pub context: Context,
    runtime: Runtime,
}

impl ScriptRuntime {
    pub fn new(host: Arc<Host>) -> Result<Self, ScriptError> {
        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;
        let attachment = host.attach_runtime();

        let script = Self {
            host,
            attachment,
            proxies: Rc::new(RefCell::new(ProxyStore::default())),
            context,
            runtime,
        };
        script.install_bindings()?;

        tracing::debug!(runtime = %script.id(), "script runtime created");
        Ok(script)
    }

    fn install_bindings(&self) -> Result<(), ScriptError> {
        let registry = Arc::clone(self.host.registry());
        // Weak: the store must be emptied by `Drop`, not by the engine
        // freeing these closures.
        let store = Rc::downgrade(&self.proxies);

        self.context.with(|ctx| -> Result<(), ScriptError> {
            let release =
                Function::new(ctx.clone(), self.script_side_reporter(store.clone(), "release"))?;
            let finalize =
                Function::new(ctx.clone(), self.script_side_reporter(store, "finalizer"))?;
            let is_alive = Function::new(ctx.clone(), move |raw: f64| -> bool {
                ScriptHandle(raw)
                    .to_handle()
                    .is_some_and(|handle| registry.contains(handle))
            })?;

            let globals = ctx.globals();
            globals.set(RELEASE_FN, release)?;
            globals.set(FINALIZE_FN, finalize)?;
            globals.set(IS_ALIVE_FN, is_alive)?;
            ctx.eval::<(), _>(PRELUDE).map_err(|err| describe(&ctx, err))?;
            Ok(())
        })
    }

    /// Binding that reports script-side destruction of a proxy this runtime
    /// owns. Handles owned by other runtimes, or already gone, are ignored.
    fn script_side_reporter(
        &self,
        store: Weak<RefCell<ProxyStore>>,
        source: &'static str,
    ) -> impl Fn(f64) -> bool + 'static {
        let host = Arc::clone(&self.host);
        let runtime = self.id();
        move |raw: f64| -> bool {
            let Some(handle) = ScriptHandle(raw).to_handle() else {
                return false;
            };
            let owned = store
                .upgrade()
                .is_some_and(|store| store.borrow_mut().remove(handle));
            if !owned {
                tracing::debug!(%handle, %runtime, source, "proxy not owned by this runtime");
                return false;
            }
            host.on_side_destroyed(handle, Side::Script)
        }
    }

    pub fn id(&self) -> RuntimeId {
        self.attachment.id()
    }

    /// Number of proxies this runtime still owns.
    pub fn live_proxies(&self) -> usize {
        self.proxies.borrow().len()
    }

    pub fn has_proxy(&self, handle: Handle) -> bool {
        self.proxies.borrow().contains(handle)
    }

    /// Register `native` and create its proxy. Unless script code gets hold
    /// of the proxy, the next collection finalizes it and releases `native`.
    pub fn wrap(&self, native: NativeRef) -> Result<Handle, ScriptError> {
        self.create_proxy(native, None)
    }

    /// Register `native` and expose its proxy as the global `name`.
    pub fn wrap_global(&self, name: &str, native: NativeRef) -> Result<Handle, ScriptError> {
        self.create_proxy(native, Some(name))
    }

    fn create_proxy(&self, native: NativeRef, global: Option<&str>) -> Result<Handle, ScriptError> {
        self.pump()?;

        let type_name = native.type_name();
        let handle = self.host.register(native, self.id())?;
        self.proxies.borrow_mut().insert(handle);

        let created = self.context.with(|ctx| -> Result<(), ScriptError> {
            let script_handle =
                ScriptHandle::try_from(handle).map_err(ScriptError::HandleNotRepresentable)?;
            let make: Function = ctx.globals().get(MAKE_PROXY_FN)?;
            let proxy: Object = make
                .call((script_handle.0, type_name))
                .map_err(|err| describe(&ctx, err))?;
            if let Some(name) = global {
                ctx.globals().set(name, proxy)?;
            }
            Ok(())
        });

        if let Err(err) = created {
            // Caller still owns the native object; only forget the pair
            self.proxies.borrow_mut().remove(handle);
            self.host.release(handle);
            return Err(err);
        }

        tracing::trace!(%handle, type_name, runtime = %self.id(), "proxy created");
        Ok(handle)
    }

    /// Run pending finalizers, then apply invalidations queued by
    /// native-side destruction. Returns the number of proxies invalidated.
    pub fn pump(&self) -> Result<usize, ScriptError> {
        self.run_pending_jobs()?;

        let pending = self.attachment.queue().take_all();
        if pending.is_empty() {
            return Ok(0);
        }

        let owned: Vec<Handle> = {
            let mut store = self.proxies.borrow_mut();
            pending
                .into_iter()
                .filter(|handle| store.remove(*handle))
                .collect()
        };
        let count = owned.len();

        self.context.with(|ctx| -> Result<(), ScriptError> {
            let invalidate: Function = ctx.globals().get(INVALIDATE_FN)?;
            for handle in owned {
                let script_handle =
                    ScriptHandle::try_from(handle).map_err(ScriptError::HandleNotRepresentable)?;
                invalidate
                    .call::<_, ()>((script_handle.0,))
                    .map_err(|err| describe(&ctx, err))?;
            }
            Ok(())
        })?;

        tracing::debug!(runtime = %self.id(), invalidated = count, "applied proxy invalidations");
        Ok(count)
    }

    /// Force a collection and report every proxy it finalized.
    pub fn collect_garbage(&self) -> Result<usize, ScriptError> {
        let before = self.live_proxies();
        self.runtime.run_gc();
        self.pump()?;
        Ok(before.saturating_sub(self.live_proxies()))
    }

    fn run_pending_jobs(&self) -> Result<(), ScriptError> {
        while self.runtime.is_job_pending() {
            if self.runtime.execute_pending_job().is_err() {
                return Err(ScriptError::Job(self.id()));
            }
        }
        Ok(())
    }

    pub fn execute(&self, source: &str) -> Result<(), ScriptError> {
        self.eval::<()>(source)
    }

    /// Evaluate `source` and convert the completion value.
    pub fn eval<T>(&self, source: &str) -> Result<T, ScriptError>
    where
        T: for<'js> FromJs<'js>,
    {
        self.pump()?;
        self.context
            .with(|ctx| ctx.eval::<T, _>(source).map_err(|err| describe(&ctx, err)))
    }

    /// Call a JavaScript function by name with no arguments.
    pub fn call_function(&self, name: &str) -> Result<(), ScriptError> {
        self.pump()?;
        self.context.with(|ctx| -> Result<(), ScriptError> {
            let func: Function = ctx.globals().get(name)?;
            func.call::<_, ()>(()).map_err(|err| describe(&ctx, err))?;
            Ok(())
        })
    }
}

impl Drop for ScriptRuntime {
    fn drop(&mut self) {
        // The engine is going away, which finalizes every proxy it still
        // owns. Finalizer jobs queued from here on are never run.
        let store = std::mem::take(&mut *self.proxies.borrow_mut());
        let mut released = 0;
        for handle in store.handles() {
            if self.host.on_side_destroyed(handle, Side::Script) {
                released += 1;
            }
        }

        let pending = self.host.detach_runtime(self.id());
        tracing::debug!(
            runtime = %self.id(),
            released,
            discarded = pending.len(),
            "script runtime dropped"
        );
    }
}

/// Turn a pending exception into a readable error.
fn describe(ctx: &Ctx<'_>, err: rquickjs::Error) -> ScriptError {
    if !matches!(err, rquickjs::Error::Exception) {
        return ScriptError::Js(err);
    }
    let caught = ctx.catch();
    let message = caught
        .as_exception()
        .and_then(|exception| exception.message())
        .or_else(|| caught.as_string().and_then(|s| s.to_string().ok()))
        .unwrap_or_else(|| "non-error value thrown".to_string());
    ScriptError::Exception { message }
}
