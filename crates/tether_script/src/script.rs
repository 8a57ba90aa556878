//! Script modules and types as host script resources

use crate::bridge::{Bridge, Scope};
use crate::dispatch::dispatch;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::ForeignRef;
use crate::instance::ForeignInstance;
use crate::marshal::ForeignKind;
use crate::signature::Signature;
use rquickjs::Value;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use tether_host::{
    CallError, CallResult, MethodInfo, Object, ObjectId, ObjectRef, PropertyInfo, Script, ScriptFailure, Variant,
};

/// What a [`ForeignScript`] wraps.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ScriptKind {
    #[default]
    Empty,
    Module,
    Type,
}

#[derive(Debug, Default)]
struct ScriptState {
    name: String,
    kind: ScriptKind,
    module: Option<ForeignRef>,
}

/// A script module or type visible to the host.
#[derive(Debug)]
pub struct ForeignScript {
    id: ObjectId,
    bridge: Bridge,
    state: RefCell<ScriptState>,
}

/// Method descriptor for a callable attribute.
pub(crate) fn method_info<'js>(scope: &Scope<'js>, name: &str, function: &Value<'js>) -> BridgeResult<MethodInfo> {
    let source = scope.check(scope.helpers.describe_function(function))?;
    let argument_count = Signature::of(&source).map_or(0, |signature| signature.params);
    Ok(MethodInfo {
        name: name.to_string(),
        argument_count,
    })
}

impl ForeignScript {
    pub(crate) fn new(id: ObjectId, bridge: Bridge) -> Self {
        Self {
            id,
            bridge,
            state: RefCell::new(ScriptState::default()),
        }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// A new hold on the wrapped module or type.
    pub fn module(&self) -> Option<ForeignRef> {
        self.state.borrow().module.clone()
    }

    pub fn kind(&self) -> ScriptKind {
        self.state.borrow().kind
    }

    /// Replace the wrapped value, releasing the previous one.
    pub fn set_module(&self, module: Option<ForeignRef>) -> BridgeResult<()> {
        let Some(module) = module else {
            self.clear();
            return Ok(());
        };
        let (name, kind) = self.bridge.with(|scope| {
            let value = module.restore(&scope.ctx)?;
            describe(scope, &value)
        })?;
        self.replace(name, kind, module);
        Ok(())
    }

    pub(crate) fn set_module_in<'js>(&self, scope: &Scope<'js>, value: Value<'js>) -> BridgeResult<()> {
        let (name, kind) = describe(scope, &value)?;
        self.replace(name, kind, scope.hold(value));
        Ok(())
    }

    fn replace(&self, name: String, kind: ScriptKind, module: ForeignRef) {
        tracing::debug!(script = %self.id, %name, ?kind, "Script bound");
        let previous = {
            let mut state = self.state.borrow_mut();
            state.name = name;
            state.kind = kind;
            state.module.replace(module)
        };
        drop(previous);
    }

    fn clear(&self) {
        let previous = std::mem::take(&mut *self.state.borrow_mut());
        drop(previous);
    }

    /// Run `f` against the wrapped value.
    fn with_module<R>(
        &self,
        f: impl for<'js> FnOnce(&Scope<'js>, Value<'js>) -> BridgeResult<R>,
    ) -> BridgeResult<R> {
        let module = self.module().ok_or(BridgeError::EmptyScript)?;
        self.bridge.with(|scope| {
            let value = module.restore(&scope.ctx)?;
            f(scope, value)
        })
    }

    /// Own attributes of the wrapped value with their kinds.
    fn attributes(&self) -> Vec<(String, ForeignKind)> {
        self.inspect("attributes", |scope, module| {
            let members = scope.check(scope.helpers.members(&module, false))?;
            members
                .into_iter()
                .map(|(name, value)| {
                    let kind = scope.check(ForeignKind::classify(&scope.helpers, &value))?;
                    Ok((name, kind))
                })
                .collect()
        })
        .unwrap_or_default()
    }

    /// Like [`Self::with_module`], but failures are logged and dropped.
    fn inspect<R>(
        &self,
        what: &str,
        f: impl for<'js> FnOnce(&Scope<'js>, Value<'js>) -> BridgeResult<R>,
    ) -> Option<R> {
        match self.with_module(f) {
            Ok(result) => Some(result),
            Err(BridgeError::EmptyScript) => None,
            Err(err) => {
                tracing::warn!(script = %self.id, %err, "Script {what} unavailable");
                None
            }
        }
    }
}

/// Display name and kind of a module or type.
fn describe<'js>(scope: &Scope<'js>, value: &Value<'js>) -> BridgeResult<(String, ScriptKind)> {
    let name = scope.check(scope.helpers.name_of(value))?;
    let kind = match scope.check(ForeignKind::classify(&scope.helpers, value))? {
        ForeignKind::Module => ScriptKind::Module,
        // Constructors without a populated prototype still type their instances.
        ForeignKind::Type | ForeignKind::Callable => ScriptKind::Type,
        _ => return Err(BridgeError::NotAModule { name }),
    };
    Ok((name, kind))
}

impl Object for ForeignScript {
    fn instance_id(&self) -> ObjectId {
        self.id
    }

    fn class_name(&self) -> &str {
        "ForeignScript"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn call(&self, method: &str, args: &[Variant]) -> CallResult {
        match self.module() {
            Some(module) => dispatch(&self.bridge, &module, method, args),
            None => Err(CallError::InstanceIsNull),
        }
    }
}

impl Script for ForeignScript {
    fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    fn is_valid(&self) -> bool {
        self.state.borrow().module.is_some()
    }

    /// Evaluate the module source again and rebind to the new namespace.
    fn reload(&self) -> Result<(), ScriptFailure> {
        let (name, kind) = {
            let state = self.state.borrow();
            (state.name.clone(), state.kind)
        };
        match kind {
            ScriptKind::Empty => return Err(ScriptFailure::Empty),
            ScriptKind::Type => return Err(ScriptFailure::NotReloadable { name }),
            ScriptKind::Module => {}
        }

        // The old namespace is released whether or not the reload succeeds.
        let previous = self.state.borrow_mut().module.take();
        drop(previous);

        let outcome = self.bridge.with(|scope| {
            let namespace = self.bridge.core().load(&scope.helpers, &name)?;
            self.set_module_in(scope, namespace)
        });
        match outcome {
            Ok(()) => {
                tracing::info!(script = %name, "Script reloaded");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(script = %name, %err, "Script reload failed");
                self.clear();
                Err(ScriptFailure::Failed { name })
            }
        }
    }

    fn has_method(&self, name: &str) -> bool {
        self.attributes()
            .iter()
            .any(|(attribute, kind)| kind.is_callable() && attribute == name)
    }

    fn method_info(&self, name: &str) -> Option<MethodInfo> {
        self.inspect("method", |scope, module| {
            if !scope.check(scope.helpers.has(&module, name))? {
                return Ok(None);
            }
            let attribute = scope.check(scope.helpers.get(&module, name))?;
            if !scope.check(ForeignKind::classify(&scope.helpers, &attribute))?.is_callable() {
                return Ok(None);
            }
            method_info(scope, name, &attribute).map(Some)
        })
        .flatten()
    }

    fn method_list(&self) -> Vec<MethodInfo> {
        self.inspect("methods", |scope, module| {
            let members = scope.check(scope.helpers.members(&module, false))?;
            let mut methods = Vec::new();
            for (name, value) in members {
                if scope.check(ForeignKind::classify(&scope.helpers, &value))?.is_callable() {
                    methods.push(method_info(scope, &name, &value)?);
                }
            }
            Ok(methods)
        })
        .unwrap_or_default()
    }

    fn property_list(&self) -> Vec<PropertyInfo> {
        self.members().into_iter().map(PropertyInfo::untyped).collect()
    }

    fn get_property(&self, name: &str) -> Option<Variant> {
        self.inspect("property", |scope, module| {
            if !scope.check(scope.helpers.has(&module, name))? {
                return Ok(None);
            }
            let value = scope.check(scope.helpers.get(&module, name))?;
            if scope.check(ForeignKind::classify(&scope.helpers, &value))? == ForeignKind::Callable {
                return Ok(None);
            }
            Ok(Some(scope.to_host(value)))
        })
        .flatten()
    }

    fn set_property(&self, name: &str, value: &Variant) -> bool {
        self.inspect("property", |scope, module| {
            if scope.check(scope.helpers.has(&module, name))? {
                let current = scope.check(scope.helpers.get(&module, name))?;
                if scope.check(ForeignKind::classify(&scope.helpers, &current))? == ForeignKind::Callable {
                    return Ok(false);
                }
            }
            let converted = scope.to_foreign(value, false);
            scope.check(scope.helpers.set(&module, name, converted))
        })
        .unwrap_or(false)
    }

    fn members(&self) -> Vec<String> {
        self.attributes()
            .into_iter()
            // Types are both methods and properties.
            .filter(|(_, kind)| *kind != ForeignKind::Callable)
            .map(|(name, _)| name)
            .collect()
    }

    fn instance_has(&self, object: &ObjectRef) -> bool {
        let Some(instance) = object
            .script_instance()
            .and_then(|instance| instance.as_any().downcast_ref::<ForeignInstance>())
        else {
            return false;
        };
        let name = self.name();
        !name.is_empty() && instance.foreign_script().name() == name
    }
}
