//! Handles into a running engine and the scope of one runtime entry

use crate::engine::EngineCore;
use crate::error::BridgeResult;
use crate::handle::ForeignRef;
use crate::helpers::Helpers;
use crate::instance::ForeignInstance;
use crate::script::ForeignScript;
use rquickjs::{Ctx, Value};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;
use tether_host::{Object, ObjectDb, ObjectRef, ScriptedObject, Variant};
use tether_services::ScriptSettings;

/// Cheap, clonable access to a started [`ScriptEngine`](crate::ScriptEngine).
#[derive(Clone)]
pub struct Bridge {
    core: Rc<EngineCore>,
    objects: Rc<ObjectDb>,
}

impl Bridge {
    pub(crate) fn new(core: Rc<EngineCore>, objects: Rc<ObjectDb>) -> Self {
        Self { core, objects }
    }

    pub(crate) fn core(&self) -> &Rc<EngineCore> {
        &self.core
    }

    pub fn objects(&self) -> &Rc<ObjectDb> {
        &self.objects
    }

    pub fn settings(&self) -> &ScriptSettings {
        self.core.settings()
    }

    pub fn is_stopped(&self) -> bool {
        self.core.is_stopped()
    }

    /// Enter the runtime.
    pub fn with<R>(&self, f: impl for<'js> FnOnce(&Scope<'js>) -> BridgeResult<R>) -> BridgeResult<R> {
        self.core.with(|ctx, helpers| {
            let scope = Scope::new(self.clone(), ctx.clone(), helpers.clone());
            f(&scope)
        })
    }

    pub fn register_module(&self, name: &str, source: impl Into<String>) -> BridgeResult<()> {
        self.core.register_module(name, source)
    }

    pub fn add_module_path(&self, path: impl Into<PathBuf>) {
        self.core.add_module_path(path);
    }

    /// Import a module by dotted name and wrap it as a script.
    pub fn load_script(&self, name: &str) -> BridgeResult<Rc<ForeignScript>> {
        self.with(|scope| {
            let namespace = scope.import(name)?;
            scope.wrap_script(namespace)
        })
    }

    /// Evaluate source at top level and convert the completion value.
    pub fn evaluate(&self, source: &str) -> BridgeResult<Variant> {
        self.with(|scope| {
            let value: Value = scope.check(scope.ctx.eval(source))?;
            Ok(scope.to_host(value))
        })
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("core", &self.core)
            .field("objects", &self.objects)
            .finish()
    }
}

/// One entry into the runtime. Values borrowed from it cannot escape.
pub struct Scope<'js> {
    pub ctx: Ctx<'js>,
    pub helpers: Helpers<'js>,
    bridge: Bridge,
}

impl<'js> Scope<'js> {
    pub(crate) fn new(bridge: Bridge, ctx: Ctx<'js>, helpers: Helpers<'js>) -> Self {
        Self { ctx, helpers, bridge }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Take a strong hold that outlives this scope.
    pub fn hold(&self, value: Value<'js>) -> ForeignRef {
        ForeignRef::hold(&self.bridge.core, &self.ctx, value)
    }

    /// Convert a runtime failure, consuming the pending exception.
    pub fn check<T>(&self, result: rquickjs::Result<T>) -> BridgeResult<T> {
        result.map_err(|err| self.helpers.caught(err))
    }

    pub fn import(&self, name: &str) -> BridgeResult<Value<'js>> {
        self.bridge.core.import(&self.helpers, name)
    }

    /// Wrap a module or type as a new script resource.
    pub fn wrap_script(&self, value: Value<'js>) -> BridgeResult<Rc<ForeignScript>> {
        let script = self
            .bridge
            .objects
            .register_with(|id| ForeignScript::new(id, self.bridge.clone()));
        script.set_module_in(self, value)?;
        Ok(script)
    }

    /// Bind an object to a new host owner, typed by its constructor.
    pub fn wrap_instance(&self, value: Value<'js>) -> BridgeResult<ObjectRef> {
        let ty = self.check(self.helpers.type_of(&value))?;
        let script = if ty.is_function() {
            self.wrap_script(ty)?
        } else {
            self.bridge
                .objects
                .register_with(|id| ForeignScript::new(id, self.bridge.clone()))
        };

        let handle = self.hold(value);
        let bridge = self.bridge.clone();
        let owner = self.bridge.objects.register_with(move |id| {
            let instance = ForeignInstance::new(handle, script, id, bridge);
            ScriptedObject::new(id, Some(Box::new(instance)))
        });
        tracing::debug!(owner = %owner.instance_id(), "Bound script object to host owner");
        Ok(owner)
    }
}
