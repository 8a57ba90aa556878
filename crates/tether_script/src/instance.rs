//! Script objects as dynamic instances of host owners

use crate::bridge::{Bridge, Scope};
use crate::dispatch::{dispatch, CALL_WITH_KWARG, GET_NEXT};
use crate::error::BridgeResult;
use crate::handle::ForeignRef;
use crate::marshal::ForeignKind;
use crate::script::{method_info, ForeignScript};
use rquickjs::Value;
use std::any::Any;
use std::rc::Rc;
use tether_host::{CallResult, MethodInfo, ObjectId, PropertyInfo, Script, ScriptInstance, Variant};

/// One script object bound to the host object that owns it.
///
/// Holds a single strong reference to the object for as long as the owner
/// lives.
#[derive(Debug)]
pub struct ForeignInstance {
    handle: ForeignRef,
    script: Rc<ForeignScript>,
    owner: ObjectId,
    bridge: Bridge,
}

impl ForeignInstance {
    pub(crate) fn new(handle: ForeignRef, script: Rc<ForeignScript>, owner: ObjectId, bridge: Bridge) -> Self {
        Self {
            handle,
            script,
            owner,
            bridge,
        }
    }

    pub fn handle(&self) -> &ForeignRef {
        &self.handle
    }

    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Script for the object's constructor.
    pub fn foreign_script(&self) -> &Rc<ForeignScript> {
        &self.script
    }

    fn inspect<R>(&self, f: impl for<'js> FnOnce(&Scope<'js>, Value<'js>) -> BridgeResult<R>) -> Option<R> {
        let outcome = self.bridge.with(|scope| {
            let value = self.handle.restore(&scope.ctx)?;
            f(scope, value)
        });
        match outcome {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::warn!(owner = %self.owner, %err, "Script object unavailable");
                None
            }
        }
    }
}

/// Attribute `name` when present, with its kind.
fn attribute<'js>(scope: &Scope<'js>, target: &Value<'js>, name: &str) -> BridgeResult<Option<(Value<'js>, ForeignKind)>> {
    if !scope.check(scope.helpers.has(target, name))? {
        return Ok(None);
    }
    let value = scope.check(scope.helpers.get(target, name))?;
    let kind = scope.check(ForeignKind::classify(&scope.helpers, &value))?;
    Ok(Some((value, kind)))
}

impl ScriptInstance for ForeignInstance {
    fn get(&self, name: &str) -> Option<Variant> {
        self.inspect(|scope, target| {
            Ok(match attribute(scope, &target, name)? {
                Some((_, ForeignKind::Callable)) | None => None,
                Some((value, _)) => Some(scope.to_host(value)),
            })
        })
        .flatten()
    }

    fn set(&self, name: &str, value: &Variant) -> bool {
        self.inspect(|scope, target| {
            if let Some((_, ForeignKind::Callable)) = attribute(scope, &target, name)? {
                return Ok(false);
            }
            let converted = scope.to_foreign(value, false);
            scope.check(scope.helpers.set(&target, name, converted))
        })
        .unwrap_or(false)
    }

    fn property_list(&self) -> Vec<PropertyInfo> {
        self.inspect(|scope, target| {
            let mut properties = Vec::new();
            for (name, value) in scope.check(scope.helpers.members(&target, false))? {
                if scope.check(ForeignKind::classify(&scope.helpers, &value))? != ForeignKind::Callable {
                    properties.push(PropertyInfo::untyped(name));
                }
            }
            Ok(properties)
        })
        .unwrap_or_default()
    }

    fn method_list(&self) -> Vec<MethodInfo> {
        self.inspect(|scope, target| {
            let mut methods = Vec::new();
            for (name, value) in scope.check(scope.helpers.members(&target, true))? {
                if scope.check(ForeignKind::classify(&scope.helpers, &value))?.is_callable() {
                    methods.push(method_info(scope, &name, &value)?);
                }
            }
            methods.push(MethodInfo {
                name: CALL_WITH_KWARG.to_string(),
                argument_count: 0,
            });
            if scope.check(ForeignKind::classify(&scope.helpers, &target))? == ForeignKind::Iterator {
                methods.push(MethodInfo {
                    name: GET_NEXT.to_string(),
                    argument_count: 0,
                });
            }
            Ok(methods)
        })
        .unwrap_or_default()
    }

    fn has_method(&self, name: &str) -> bool {
        if name == CALL_WITH_KWARG {
            return true;
        }
        self.inspect(|scope, target| {
            if let Some((_, kind)) = attribute(scope, &target, name)? {
                if kind.is_callable() {
                    return Ok(true);
                }
            }
            let iterator = scope.check(ForeignKind::classify(&scope.helpers, &target))? == ForeignKind::Iterator;
            Ok(name == GET_NEXT && iterator)
        })
        .unwrap_or(false)
    }

    fn call(&self, method: &str, args: &[Variant]) -> CallResult {
        dispatch(&self.bridge, &self.handle, method, args)
    }

    fn display_string(&self) -> String {
        let text = self
            .inspect(|scope, target| scope.check(scope.helpers.str(&target)))
            .unwrap_or_default();
        format!("[ForeignInstance({text}):{}]", self.owner)
    }

    fn script(&self) -> Option<Rc<dyn Script>> {
        Some(Rc::clone(&self.script) as Rc<dyn Script>)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::boot;
    use pretty_assertions::assert_eq;
    use tether_host::{Object, ObjectRef, RpcMode};

    const SHIP: &str = r#"
        globalThis.Ship = class Ship {
            constructor() { this.speed = 2; }
            boost(by, times = 1) { this.speed += by * times; return this.speed; }
        };
        new Ship()
    "#;

    fn owner(bridge: &Bridge, source: &str) -> ObjectRef {
        bridge.evaluate(source).unwrap().as_object().unwrap().clone()
    }

    fn adapter(owner: &ObjectRef) -> &ForeignInstance {
        owner
            .script_instance()
            .and_then(|instance| instance.as_any().downcast_ref::<ForeignInstance>())
            .unwrap()
    }

    #[test]
    fn reads_and_writes_properties() {
        let (_engine, bridge) = boot();
        let ship = owner(&bridge, SHIP);
        let instance = ship.script_instance().unwrap();

        assert_eq!(instance.get("speed"), Some(Variant::Int(2)));
        assert_eq!(instance.get("boost"), None);
        assert_eq!(instance.get("missing"), None);
        assert!(instance.set("speed", &Variant::Int(5)));
        assert_eq!(instance.get("speed"), Some(Variant::Int(5)));
        assert_eq!(instance.property_type("speed"), None);

        let frozen = owner(&bridge, "Object.freeze({ hull: 1 })");
        assert!(!frozen.script_instance().unwrap().set("hull", &Variant::Int(2)));
    }

    #[test]
    fn methods_cannot_be_overwritten_as_properties() {
        let (_engine, bridge) = boot();
        let ship = owner(&bridge, SHIP);
        let instance = ship.script_instance().unwrap();

        assert!(!instance.set("boost", &Variant::Int(9)));
        assert_eq!(ship.call("boost", &[Variant::Int(1)]), Ok(Variant::Int(3)));

        let rover = owner(&bridge, "({ speed: 1, boost(x) { return x; } })");
        let instance = rover.script_instance().unwrap();
        assert!(!instance.set("boost", &Variant::Int(9)));
        assert!(instance.set("speed", &Variant::Int(4)));
        assert_eq!(rover.call("boost", &[Variant::Int(1)]), Ok(Variant::Int(1)));
    }

    #[test]
    fn lists_own_properties_and_inherited_methods() {
        let (_engine, bridge) = boot();
        let ship = owner(&bridge, SHIP);
        let instance = ship.script_instance().unwrap();

        assert_eq!(instance.property_list(), vec![PropertyInfo::untyped("speed")]);
        assert_eq!(
            instance.method_list(),
            vec![
                MethodInfo {
                    name: "boost".into(),
                    argument_count: 2
                },
                MethodInfo {
                    name: CALL_WITH_KWARG.into(),
                    argument_count: 0
                },
            ]
        );
        assert!(instance.has_method("boost"));
        assert!(instance.has_method(CALL_WITH_KWARG));
        assert!(!instance.has_method("speed"));
        assert!(!instance.has_method(GET_NEXT));
    }

    #[test]
    fn calls_dispatch_to_the_object() {
        let (_engine, bridge) = boot();
        let ship = owner(&bridge, SHIP);
        assert_eq!(ship.call("boost", &[Variant::Int(3)]), Ok(Variant::Int(5)));
        assert_eq!(
            ship.call("boost", &[Variant::Int(1), Variant::Int(4)]),
            Ok(Variant::Int(9))
        );
        assert_eq!(ship.script_instance().unwrap().rpc_mode("boost"), RpcMode::Disabled);
        assert_eq!(ship.script_instance().unwrap().rset_mode("speed"), RpcMode::Disabled);
    }

    #[test]
    fn knows_its_script_and_owner() {
        let (_engine, bridge) = boot();
        let ship = owner(&bridge, SHIP);
        let instance = adapter(&ship);
        assert_eq!(instance.owner(), ship.instance_id());
        assert_eq!(instance.script().unwrap().name(), "Ship");
        assert!(instance.foreign_script().instance_has(&ship));

        let crate_box = owner(&bridge, "({ toString() { return 'crate'; } })");
        assert_eq!(
            crate_box.script_instance().unwrap().display_string(),
            format!("[ForeignInstance(crate):{}]", crate_box.instance_id())
        );
    }

    #[test]
    fn iterators_match_direct_iteration() {
        let (_engine, bridge) = boot();
        let source = "(function* () { yield 1; yield 'two'; yield [3]; })";
        let direct = bridge.evaluate(&format!("[...{source}()]")).unwrap();

        let iterator = owner(&bridge, &format!("{source}()"));
        assert!(iterator.script_instance().unwrap().has_method(GET_NEXT));

        let mut stepped = Vec::new();
        loop {
            let next = iterator.call(GET_NEXT, &[]).unwrap();
            if next.is_nil() {
                break;
            }
            stepped.push(next);
        }
        assert_eq!(Variant::Array(stepped), direct);
        assert_eq!(iterator.call(GET_NEXT, &[]), Ok(Variant::Nil));
    }

    #[test]
    fn dropping_the_owner_releases_the_object() {
        let (engine, bridge) = boot();
        let live = engine.live_handles();

        let payload = owner(&bridge, "({ payload: new Array(256).fill(0).map((_, i) => ({ i })) })");
        assert!(engine.live_handles() > live);
        engine.run_gc().unwrap();
        let objects = engine.object_count().unwrap();

        drop(payload);
        assert_eq!(engine.live_handles(), live);
        engine.run_gc().unwrap();
        assert!(engine.object_count().unwrap() < objects);
    }
}
