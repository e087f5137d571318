//! Tether Host Runtime
//!
//! Boots the process-wide shared object host, mirrors a few native objects
//! into a QuickJS runtime, exercises both teardown directions and shuts the
//! host down again.
//!
//! Usage: `tether [settings.json]` (defaults to `tether.json`, optional)

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tether_core::{Handle, Host, SharedObject, Side};
use tether_script::{rquickjs, ScriptRuntime};
use tether_services::Settings;

/// Stand-in for a native resource owned by the host application.
struct Resource {
    name: &'static str,
}

impl SharedObject for Resource {
    fn type_name(&self) -> &'static str {
        "Resource"
    }

    fn on_release(&self, handle: Handle) {
        tracing::info!(%handle, name = self.name, "native resource released by script side");
    }
}

fn main() -> Result<()> {
    let settings_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tether.json"));
    let settings = Settings::load_or_default(&settings_path)?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(settings.logging.max_level()?)
        .init();

    tracing::info!("Tether v{}", tether_core::VERSION);
    let host = tether_core::host::init(&settings.registry)?;

    run_script(&host)?;

    for (name, value) in host.registry().counters().snapshot() {
        tracing::info!(name, value, "registry counter");
    }
    let report = tether_core::host::teardown()?;
    tracing::info!(
        released = report.released,
        issued = report.issued,
        "shared object host torn down"
    );
    Ok(())
}

fn run_script(host: &Arc<Host>) -> Result<()> {
    let runtime = ScriptRuntime::new(Arc::clone(host))?;

    // Inject print() so scripts can log
    runtime.context.with(|ctx| {
        let print_fn = rquickjs::Function::new(ctx.clone(), |msg: String| {
            tracing::info!("[JS] {}", msg);
        })?;
        ctx.globals().set("print", print_fn)?;
        Ok::<_, rquickjs::Error>(())
    })?;

    runtime.wrap_global("config", Arc::new(Resource { name: "config" }))?;
    let socket = runtime.wrap_global("socket", Arc::new(Resource { name: "socket" }))?;
    runtime.wrap_global("cache", Arc::new(Resource { name: "cache" }))?;
    tracing::info!(live = host.registry().len(), "native objects mirrored");

    // Script side lets go of one object
    runtime.execute(
        r#"
        print(config.typeName + " handle " + config.handle);
        print("released config: " + config.release());
        print("released config again: " + config.release());
        "#,
    )?;

    // Native side destroys another, e.g. from an I/O completion thread
    let native_side = {
        let host = Arc::clone(host);
        thread::spawn(move || host.on_side_destroyed(socket, Side::Native))
    };
    let destroyed = native_side.join().unwrap_or(false);
    tracing::info!(%socket, destroyed, "native side destroyed socket");

    runtime.execute(
        r#"
        print("socket alive: " + socket.isAlive() + ", handle " + socket.handle);
        print("released socket: " + socket.release());
        "#,
    )?;

    // Script drops its last reference; the collector finalizes the proxy
    runtime.wrap_global("scratch", Arc::new(Resource { name: "scratch" }))?;
    runtime.execute("delete globalThis.scratch; undefined")?;
    let collected = runtime.collect_garbage()?;
    tracing::info!(collected, "collected unreachable proxies");

    // `cache` is still live; dropping the runtime releases it
    tracing::info!(live = host.registry().len(), "dropping script runtime");
    drop(runtime);
    tracing::info!(live = host.registry().len(), "script runtime dropped");
    Ok(())
}
