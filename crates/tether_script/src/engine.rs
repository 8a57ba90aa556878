//! Script runtime lifecycle
//!
//! A single QuickJS runtime per [`ScriptEngine`]. Every entry into the
//! runtime goes through [`EngineCore::with`], which refuses use after stop.
//! Entries made from host code the runtime is already running share the
//! outermost entry's context.

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::helpers::{Helpers, LOG_HOOK, PRELUDE};
use crate::module::ModuleLoader;
use rquickjs::{qjs, Context, Ctx, Exception, Function, Object, Persistent, Runtime, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::PathBuf;
use std::ptr::NonNull;
use std::rc::{Rc, Weak};
use tether_host::ObjectDb;
use tether_services::ScriptSettings;

/// Log target for script output (`print`, `console.*`).
pub const SCRIPT_LOG_TARGET: &str = "tether::script";

/// Shared state of a running engine.
///
/// Field order is drop order: script values go before the context and the
/// runtime that owns them.
pub struct EngineCore {
    helpers: Persistent<Object<'static>>,
    loader: RefCell<ModuleLoader>,
    settings: ScriptSettings,
    live: Cell<usize>,
    busy: Cell<bool>,
    /// Context of the outermost entry, set while `busy`.
    active: Cell<Option<NonNull<qjs::JSContext>>>,
    stopped: Cell<bool>,
    context: Context,
    runtime: Runtime,
}

struct BusyGuard<'a> {
    busy: &'a Cell<bool>,
    active: &'a Cell<Option<NonNull<qjs::JSContext>>>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.active.set(None);
        self.busy.set(false);
    }
}

impl EngineCore {
    fn boot(settings: &ScriptSettings) -> BridgeResult<Rc<Self>> {
        let runtime = Runtime::new()?;
        if let Some(limit) = settings.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = settings.max_stack_size {
            runtime.set_max_stack_size(size);
        }
        if let Some(threshold) = settings.gc_threshold {
            runtime.set_gc_threshold(threshold);
        }
        let context = Context::full(&runtime)?;

        let helpers = context.with(|ctx| -> BridgeResult<_> {
            ctx.globals().set(LOG_HOOK, log_function(&ctx)?)?;
            let table: Object = match ctx.eval(PRELUDE) {
                Ok(table) => table,
                Err(rquickjs::Error::Exception) => {
                    let thrown = ctx.catch();
                    let message = thrown
                        .as_exception()
                        .and_then(|e| e.message())
                        .unwrap_or_else(|| "prelude failed".to_string());
                    return Err(BridgeError::Exception { message });
                }
                Err(err) => return Err(err.into()),
            };
            Ok(Persistent::save(&ctx, table))
        })?;

        let core = Rc::new(Self {
            helpers,
            loader: RefCell::new(ModuleLoader::new(settings.module_paths.clone())),
            settings: settings.clone(),
            live: Cell::new(0),
            busy: Cell::new(false),
            active: Cell::new(None),
            stopped: Cell::new(false),
            context,
            runtime,
        });

        let weak = Rc::downgrade(&core);
        core.with(|ctx, _| {
            ctx.globals().set("require", require_function(ctx, weak)?)?;
            Ok(())
        })?;
        Ok(core)
    }

    /// Run `f` inside the runtime.
    ///
    /// Host code called from a script (callbacks, `require`) is already
    /// inside the runtime; nested entries from it run on the active context.
    pub fn with<R>(&self, f: impl for<'js> FnOnce(&Ctx<'js>, &Helpers<'js>) -> BridgeResult<R>) -> BridgeResult<R> {
        if self.stopped.get() {
            return Err(BridgeError::Stopped);
        }
        if self.busy.get() {
            let Some(raw) = self.active.get() else {
                return Err(BridgeError::Reentrant);
            };
            tracing::trace!("Nested runtime entry");
            // SAFETY: `active` is only set while the outermost entry holds the
            // runtime lock, and the core is `!Send`, so this is that same thread
            // and the context is alive for the whole nested call.
            let ctx = unsafe { Ctx::from_raw(raw) };
            let helpers = self.helpers(&ctx)?;
            return f(&ctx, &helpers);
        }

        self.busy.set(true);
        let _guard = BusyGuard {
            busy: &self.busy,
            active: &self.active,
        };
        self.context.with(|ctx| {
            self.active.set(Some(ctx.as_raw()));
            let helpers = self.helpers(&ctx)?;
            f(&ctx, &helpers)
        })
    }

    pub(crate) fn helpers<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Helpers<'js>> {
        Ok(Helpers::new(ctx.clone(), self.helpers.clone().restore(ctx)?))
    }

    pub fn settings(&self) -> &ScriptSettings {
        &self.settings
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    pub fn live_handles(&self) -> usize {
        self.live.get()
    }

    pub(crate) fn retain(&self) -> usize {
        let live = self.live.get() + 1;
        self.live.set(live);
        live
    }

    pub(crate) fn release(&self) -> usize {
        let live = self.live.get().saturating_sub(1);
        self.live.set(live);
        live
    }

    pub fn register_module(&self, name: &str, source: impl Into<String>) -> BridgeResult<()> {
        self.loader.borrow_mut().register(name, source)
    }

    pub fn add_module_path(&self, path: impl Into<PathBuf>) {
        self.loader.borrow_mut().add_path(path);
    }

    /// Namespace of `name`, loading it on first use.
    pub(crate) fn import<'js>(&self, helpers: &Helpers<'js>, name: &str) -> BridgeResult<Value<'js>> {
        let cached = helpers.cached(name).map_err(|e| helpers.caught(e))?;
        if !cached.is_undefined() {
            return Ok(cached);
        }
        self.load(helpers, name)
    }

    /// Evaluate the current source of `name`, replacing any cached namespace.
    pub(crate) fn load<'js>(&self, helpers: &Helpers<'js>, name: &str) -> BridgeResult<Value<'js>> {
        let source = self.loader.borrow().resolve(name)?;
        tracing::debug!(module = %source.name, origin = %source.origin, "Loading module");
        helpers
            .define_module(&source.name, &source.text)
            .map_err(|e| helpers.caught(e))
    }

    pub fn run_gc(&self) -> BridgeResult<()> {
        self.idle()?;
        self.runtime.run_gc();
        Ok(())
    }

    /// Number of objects allocated in the runtime heap.
    pub fn object_count(&self) -> BridgeResult<i64> {
        self.idle()?;
        Ok(self.runtime.memory_usage().obj_count as i64)
    }

    fn idle(&self) -> BridgeResult<()> {
        if self.stopped.get() {
            Err(BridgeError::Stopped)
        } else if self.busy.get() {
            Err(BridgeError::Reentrant)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for EngineCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCore")
            .field("live", &self.live.get())
            .field("busy", &self.busy.get())
            .field("stopped", &self.stopped.get())
            .finish_non_exhaustive()
    }
}

fn log_function<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Function<'js>> {
    Function::new(ctx.clone(), |level: String, message: String| match level.as_str() {
        "error" => tracing::error!(target: SCRIPT_LOG_TARGET, "{message}"),
        "warn" => tracing::warn!(target: SCRIPT_LOG_TARGET, "{message}"),
        "debug" => tracing::debug!(target: SCRIPT_LOG_TARGET, "{message}"),
        _ => tracing::info!(target: SCRIPT_LOG_TARGET, "{message}"),
    })
}

fn require_function<'js>(ctx: &Ctx<'js>, core: Weak<EngineCore>) -> rquickjs::Result<Function<'js>> {
    Function::new(ctx.clone(), move |ctx: Ctx<'js>, name: String| -> rquickjs::Result<Value<'js>> {
        let Some(core) = core.upgrade() else {
            return Err(Exception::throw_message(&ctx, "script engine is gone"));
        };
        let helpers = core.helpers(&ctx)?;
        core.import(&helpers, &name)
            .map_err(|err| Exception::throw_message(&ctx, &err.script_message()))
    })
}

/// Process-wide script engine with explicit start and stop.
pub struct ScriptEngine {
    settings: ScriptSettings,
    objects: Rc<ObjectDb>,
    core: RefCell<Option<Rc<EngineCore>>>,
}

impl ScriptEngine {
    pub fn new(settings: ScriptSettings) -> Self {
        Self::with_objects(settings, Rc::new(ObjectDb::new()))
    }

    /// Engine sharing an existing host object registry.
    pub fn with_objects(settings: ScriptSettings, objects: Rc<ObjectDb>) -> Self {
        Self {
            settings,
            objects,
            core: RefCell::new(None),
        }
    }

    pub fn settings(&self) -> &ScriptSettings {
        &self.settings
    }

    pub fn objects(&self) -> &Rc<ObjectDb> {
        &self.objects
    }

    /// Boot the runtime. Starting a running engine hands out another bridge.
    pub fn start(&self) -> BridgeResult<Bridge> {
        if let Ok(bridge) = self.bridge() {
            return Ok(bridge);
        }
        let core = EngineCore::boot(&self.settings)?;
        tracing::info!("Script engine started");
        *self.core.borrow_mut() = Some(Rc::clone(&core));
        Ok(Bridge::new(core, Rc::clone(&self.objects)))
    }

    /// Shut the runtime down. Refused while script values are still held;
    /// stopping a stopped engine is a no-op.
    pub fn stop(&self) -> BridgeResult<()> {
        let mut slot = self.core.borrow_mut();
        let Some(core) = slot.as_ref() else {
            return Ok(());
        };
        let count = core.live_handles();
        if count > 0 {
            return Err(BridgeError::LiveHandles { count });
        }
        if core.busy.get() {
            return Err(BridgeError::Reentrant);
        }
        core.stopped.set(true);
        *slot = None;
        tracing::info!("Script engine stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.core.borrow().is_some()
    }

    pub fn bridge(&self) -> BridgeResult<Bridge> {
        self.core
            .borrow()
            .as_ref()
            .map(|core| Bridge::new(Rc::clone(core), Rc::clone(&self.objects)))
            .ok_or(BridgeError::NotStarted)
    }

    pub fn live_handles(&self) -> usize {
        self.core.borrow().as_ref().map_or(0, |core| core.live_handles())
    }

    pub fn run_gc(&self) -> BridgeResult<()> {
        self.bridge()?.core().run_gc()
    }

    pub fn object_count(&self) -> BridgeResult<i64> {
        self.bridge()?.core().object_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::boot;

    #[test]
    fn start_is_idempotent() {
        let engine = ScriptEngine::new(ScriptSettings::default());
        assert!(!engine.is_running());
        assert!(matches!(engine.bridge(), Err(BridgeError::NotStarted)));

        let first = engine.start().unwrap();
        let second = engine.start().unwrap();
        assert!(Rc::ptr_eq(first.core(), second.core()));
        assert!(engine.is_running());
    }

    #[test]
    fn stop_refuses_while_values_are_held() {
        let (engine, bridge) = boot();
        let held = bridge.evaluate("({})").unwrap();
        assert!(matches!(engine.stop(), Err(BridgeError::LiveHandles { count }) if count > 0));
        assert!(engine.is_running());

        drop(held);
        engine.stop().unwrap();
        assert!(!engine.is_running());
        engine.stop().unwrap();
    }

    #[test]
    fn stopped_bridges_report_stopped() {
        let (engine, bridge) = boot();
        engine.stop().unwrap();
        assert!(matches!(bridge.evaluate("1"), Err(BridgeError::Stopped)));

        let fresh = engine.start().unwrap();
        assert_eq!(fresh.evaluate("1 + 1").unwrap(), tether_host::Variant::Int(2));
    }

    #[test]
    fn nested_entry_runs_on_the_active_context() {
        let (engine, bridge) = boot();
        let inner = bridge
            .with(|scope| {
                scope.ctx.globals().set("outer", 20)?;
                Ok(bridge.evaluate("outer + 1"))
            })
            .unwrap();
        assert_eq!(inner.unwrap(), tether_host::Variant::Int(21));

        // Heap-wide operations still wait for the outermost entry to finish.
        let gc = bridge.with(|_scope| Ok(engine.run_gc())).unwrap();
        assert!(matches!(gc, Err(BridgeError::Reentrant)));
        let stop = bridge.with(|_scope| Ok(engine.stop())).unwrap();
        assert!(matches!(stop, Err(BridgeError::Reentrant)));

        // The guard is released afterwards.
        engine.run_gc().unwrap();
        assert!(bridge.evaluate("1").is_ok());
    }

    #[test]
    fn memory_limit_is_enforced() {
        let settings = ScriptSettings {
            memory_limit: Some(4 * 1024 * 1024),
            ..ScriptSettings::default()
        };
        let engine = ScriptEngine::new(settings);
        let bridge = engine.start().unwrap();
        let outcome =
            bridge.evaluate("(() => { const big = []; while (true) big.push(new Array(1024).fill(1)); })()");
        assert!(outcome.is_err());
    }

    #[test]
    fn console_output_does_not_throw() {
        let (_engine, bridge) = boot();
        let value = bridge
            .evaluate("print('hello', 1, [2]); console.warn('careful'); console.error(new Error('x')); 7")
            .unwrap();
        assert_eq!(value, tether_host::Variant::Int(7));
    }
}
