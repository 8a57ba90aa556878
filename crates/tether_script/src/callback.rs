//! Host callables exposed as script functions

use crate::bridge::{Bridge, Scope};
use crate::engine::EngineCore;
use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Value};
use std::rc::{Rc, Weak};
use tether_host::{cast, FuncRef, ObjectDb, ObjectId, Variant};

/// Script function that calls the [`FuncRef`] registered under `id`.
///
/// The id is resolved on every call, so a callable that has since been
/// dropped turns the function into a no-op returning `undefined`.
pub(crate) fn host_function<'js>(scope: &Scope<'js>, id: ObjectId) -> rquickjs::Result<Value<'js>> {
    // Weak: the function lives in the runtime the core owns.
    let core = Rc::downgrade(scope.bridge().core());
    let objects = Rc::clone(scope.bridge().objects());
    let function = Function::new(
        scope.ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            invoke(&ctx, &core, &objects, id, args.0)
        },
    )?;
    Ok(function.into_value())
}

fn invoke<'js>(
    ctx: &Ctx<'js>,
    core: &Weak<EngineCore>,
    objects: &Rc<ObjectDb>,
    id: ObjectId,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<Value<'js>> {
    let undefined = Value::new_undefined(ctx.clone());
    let Some(core) = core.upgrade() else {
        return Ok(undefined);
    };
    let Some(func) = objects.get_instance(id).and_then(|object| cast::<FuncRef>(&object)) else {
        tracing::trace!(%id, "Host callable is gone");
        return Ok(undefined);
    };

    let helpers = core.helpers(ctx)?;
    let scope = Scope::new(Bridge::new(core, Rc::clone(objects)), ctx.clone(), helpers);
    let args: Vec<Variant> = args.into_iter().map(|arg| scope.to_host(arg)).collect();

    match func.call_func(&args) {
        Ok(result) => Ok(scope.to_foreign(&result, false)),
        Err(err) => {
            tracing::warn!(callable = func.name(), %err, "Host callable failed");
            Ok(undefined)
        }
    }
}
