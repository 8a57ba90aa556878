//! Name-based method dispatch against script values
//!
//! Resolution order for a call on a receiver:
//! 1. an attribute of that name (prototype chain included): callables are
//!    applied with the receiver as `this`, types are constructed;
//! 2. `new` on a type, `call_self` on a type or callable;
//! 3. `get_next` on an iterator;
//! 4. otherwise [`CallError::InvalidMethod`].

use crate::bridge::{Bridge, Scope};
use crate::error::{BridgeError, BridgeResult, MarshalError};
use crate::handle::ForeignRef;
use crate::marshal::ForeignKind;
use crate::signature::Signature;
use rquickjs::Value;
use tether_host::{CallError, CallResult, Dictionary, Variant, VariantType};
use tether_services::ScriptSettings;

/// Calls `method` with keyword arguments: `(method, args..., kwargs)`.
pub const CALL_WITH_KWARG: &str = "call_with_kwarg";
/// Constructs a wrapped type.
pub const NEW: &str = "new";
/// Invokes the wrapped value itself.
pub const CALL_SELF: &str = "call_self";
/// Advances a wrapped iterator.
pub const GET_NEXT: &str = "get_next";

/// A method call with `call_with_kwarg` unpacked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallRequest<'a> {
    pub method: &'a str,
    pub args: &'a [Variant],
    pub kwargs: Option<&'a Dictionary>,
}

impl<'a> CallRequest<'a> {
    pub fn parse(method: &'a str, args: &'a [Variant]) -> Result<Self, CallError> {
        if method != CALL_WITH_KWARG {
            return Ok(Self {
                method,
                args,
                kwargs: None,
            });
        }

        match args {
            [first, rest @ .., last] => {
                let kwargs = last.as_dictionary().ok_or(CallError::InvalidArgument {
                    index: args.len() - 1,
                    expected: VariantType::Dictionary,
                })?;
                let method = first.as_str().ok_or(CallError::InvalidArgument {
                    index: 0,
                    expected: VariantType::String,
                })?;
                Ok(Self {
                    method,
                    args: rest,
                    kwargs: Some(kwargs),
                })
            }
            _ => Err(CallError::TooFewArguments { expected: 2 }),
        }
    }

    /// Arguments counted against the callee's arity; the keyword mapping
    /// counts as one.
    pub fn supplied(&self) -> usize {
        self.args.len() + usize::from(self.kwargs.is_some())
    }
}

enum Invocation<'js> {
    Apply { this: Value<'js> },
    Construct,
}

/// Call `method` on the value held by `receiver`.
pub fn dispatch(bridge: &Bridge, receiver: &ForeignRef, method: &str, args: &[Variant]) -> CallResult {
    let request = CallRequest::parse(method, args)?;
    let outcome = bridge.with(|scope| {
        let target = receiver.restore(&scope.ctx)?;
        resolve(scope, target, &request)
    });
    match outcome {
        Ok(result) => result,
        Err(err) => surface(bridge.settings(), request.method, err),
    }
}

fn resolve<'js>(scope: &Scope<'js>, target: Value<'js>, request: &CallRequest<'_>) -> BridgeResult<CallResult> {
    let helpers = &scope.helpers;

    if scope.check(helpers.has(&target, request.method))? {
        let attribute = scope.check(helpers.get(&target, request.method))?;
        match scope.check(ForeignKind::classify(helpers, &attribute))? {
            ForeignKind::Type => return invoke(scope, Invocation::Construct, attribute, request),
            ForeignKind::Callable => {
                return invoke(scope, Invocation::Apply { this: target }, attribute, request)
            }
            _ => {}
        }
    }

    let kind = scope.check(ForeignKind::classify(helpers, &target))?;
    match (request.method, kind) {
        (NEW | CALL_SELF, ForeignKind::Type) => invoke(scope, Invocation::Construct, target, request),
        (CALL_SELF, ForeignKind::Callable) => {
            let this = scope.undefined();
            invoke(scope, Invocation::Apply { this }, target, request)
        }
        (GET_NEXT, ForeignKind::Iterator) => {
            if request.supplied() > 0 {
                return Ok(Err(CallError::TooManyArguments { expected: 0 }));
            }
            Ok(Ok(match scope.check(helpers.step(&target))? {
                Some(value) => scope.try_to_host(value)?,
                None => Variant::Nil,
            }))
        }
        _ => {
            tracing::trace!(method = request.method, ?kind, "No such method");
            Ok(Err(CallError::InvalidMethod))
        }
    }
}

fn invoke<'js>(
    scope: &Scope<'js>,
    how: Invocation<'js>,
    function: Value<'js>,
    request: &CallRequest<'_>,
) -> BridgeResult<CallResult> {
    let source = scope.check(scope.helpers.describe_function(&function))?;
    if let Some(signature) = Signature::of(&source) {
        if request.supplied() < signature.required() {
            tracing::debug!(
                method = request.method,
                supplied = request.supplied(),
                required = signature.required(),
                "Too few arguments"
            );
            return Ok(Err(CallError::TooFewArguments {
                expected: signature.params,
            }));
        }
    }

    let mut args: Vec<Value<'js>> = request.args.iter().map(|arg| scope.to_foreign(arg, false)).collect();
    if let Some(kwargs) = request.kwargs {
        args.push(scope.options(kwargs));
    }

    let result = match how {
        Invocation::Apply { this } => scope.check(scope.helpers.apply(function, this, args))?,
        Invocation::Construct => scope.check(scope.helpers.construct(function, args))?,
    };
    Ok(Ok(scope.try_to_host(result)?))
}

/// Map a bridge failure onto the host call taxonomy.
fn surface(settings: &ScriptSettings, method: &str, err: BridgeError) -> CallResult {
    match err {
        BridgeError::Exception { message } if !settings.exceptions_as_errors => {
            tracing::error!(method, %message, "Unhandled script exception");
            Ok(Variant::Nil)
        }
        BridgeError::Exception { message } => Err(CallError::Exception { message }),
        BridgeError::Marshal(MarshalError::DepthExceeded { limit }) => {
            tracing::error!(method, limit, "Call result exceeds the conversion depth");
            Err(CallError::RecursionLimit { limit })
        }
        BridgeError::NotStarted | BridgeError::Stopped => Err(CallError::InstanceIsNull),
        other => Err(CallError::Exception {
            message: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{boot, boot_with};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tether_host::{Object, ObjectRef};

    fn object(bridge: &Bridge, source: &str) -> ObjectRef {
        bridge.evaluate(source).unwrap().as_object().unwrap().clone()
    }

    #[test]
    fn parses_call_with_kwarg() {
        let kwargs: Dictionary = [("scale", 2)].into_iter().collect();
        let args = [Variant::from("move"), Variant::from(1), Variant::Dictionary(kwargs.clone())];
        let request = CallRequest::parse(CALL_WITH_KWARG, &args).unwrap();
        assert_eq!(request.method, "move");
        assert_eq!(request.args, &[Variant::from(1)]);
        assert_eq!(request.kwargs, Some(&kwargs));
        assert_eq!(request.supplied(), 2);

        let plain = CallRequest::parse("move", &args).unwrap();
        assert_eq!(plain.args.len(), 3);
        assert_eq!(plain.kwargs, None);
    }

    #[test]
    fn rejects_malformed_call_with_kwarg() {
        assert_eq!(
            CallRequest::parse(CALL_WITH_KWARG, &[Variant::from("f")]),
            Err(CallError::TooFewArguments { expected: 2 })
        );
        assert_eq!(
            CallRequest::parse(CALL_WITH_KWARG, &[Variant::from("f"), Variant::from(1), Variant::from(2)]),
            Err(CallError::InvalidArgument {
                index: 2,
                expected: VariantType::Dictionary
            })
        );
        assert_eq!(
            CallRequest::parse(CALL_WITH_KWARG, &[Variant::from(1), Variant::Dictionary(Dictionary::new())]),
            Err(CallError::InvalidArgument {
                index: 0,
                expected: VariantType::String
            })
        );
    }

    #[test]
    fn arity_counts_required_parameters() {
        let (_engine, bridge) = boot();
        let target = object(&bridge, "({ f(a, b, c, d = 1) { return a + b + c + d; } })");

        assert_eq!(
            target.call("f", &[Variant::from(1), Variant::from(2)]),
            Err(CallError::TooFewArguments { expected: 4 })
        );
        assert_eq!(
            target.call("f", &[Variant::from(1), Variant::from(2), Variant::from(3)]),
            Ok(Variant::Int(7))
        );
        assert_eq!(
            target.call("f", &[Variant::from(1), Variant::from(2), Variant::from(3), Variant::from(4)]),
            Ok(Variant::Int(10))
        );
        // Extra arguments are passed through.
        let many: Vec<Variant> = (0..6).map(Variant::from).collect();
        assert_eq!(target.call("f", &many), Ok(Variant::Int(6)));
    }

    #[test]
    fn methods_see_their_receiver() {
        let (_engine, bridge) = boot();
        let target = object(&bridge, "({ base: 10, add(x) { return this.base + x; } })");
        assert_eq!(target.call("add", &[Variant::from(5)]), Ok(Variant::Int(15)));
    }

    #[test]
    fn kwargs_arrive_as_trailing_options() {
        let (_engine, bridge) = boot();
        let target = object(
            &bridge,
            "({ scaled(x, options = {}) { return x * (options.factor ?? 1); } })",
        );
        let kwargs: Dictionary = [("factor", 3)].into_iter().collect();
        let result = target.call(
            CALL_WITH_KWARG,
            &[Variant::from("scaled"), Variant::from(5), Variant::Dictionary(kwargs)],
        );
        assert_eq!(result, Ok(Variant::Int(15)));
    }

    #[test]
    fn kwargs_count_toward_arity() {
        let (_engine, bridge) = boot();
        let target = object(&bridge, "({ pair(a, b) { return [a, b]; } })");
        let result = target.call(
            CALL_WITH_KWARG,
            &[Variant::from("pair"), Variant::from(1), Variant::Dictionary(Dictionary::new())],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn unknown_methods_are_invalid() {
        let (_engine, bridge) = boot();
        let target = object(&bridge, "({ value: 1 })");
        assert_eq!(target.call("missing", &[]), Err(CallError::InvalidMethod));
        // Data attributes are not callable.
        assert_eq!(target.call("value", &[]), Err(CallError::InvalidMethod));
        assert_eq!(target.call(NEW, &[]), Err(CallError::InvalidMethod));
    }

    #[test]
    fn types_construct_and_callables_call_themselves() {
        let (_engine, bridge) = boot();
        let point = object(
            &bridge,
            "(class Point { constructor(x, y = 0) { this.x = x; this.y = y; } sum() { return this.x + this.y; } })",
        );

        assert_eq!(point.call(NEW, &[]), Err(CallError::TooFewArguments { expected: 2 }));
        let made = point.call(NEW, &[Variant::from(2), Variant::from(3)]).unwrap();
        assert_eq!(made.as_object().unwrap().call("sum", &[]), Ok(Variant::Int(5)));

        let also = point.call(CALL_SELF, &[Variant::from(4)]).unwrap();
        assert_eq!(also.as_object().unwrap().call("sum", &[]), Ok(Variant::Int(4)));

        let square = object(&bridge, "(x) => x * x");
        assert_eq!(square.call(CALL_SELF, &[Variant::from(9)]), Ok(Variant::Int(81)));
        assert_eq!(square.call(NEW, &[Variant::from(9)]), Err(CallError::InvalidMethod));
    }

    #[test]
    fn type_attributes_are_constructed() {
        let (_engine, bridge) = boot();
        let holder = object(&bridge, "({ Tag: class Tag { constructor(n) { this.n = n; } } })");
        let tag = holder.call("Tag", &[Variant::from(7)]).unwrap();
        let instance = tag.as_object().unwrap().script_instance().unwrap();
        assert_eq!(instance.get("n"), Some(Variant::Int(7)));
    }

    #[test]
    fn iterators_step_through_get_next() {
        let (_engine, bridge) = boot();
        let iterator = object(&bridge, "[10, 20][Symbol.iterator]()");
        assert_eq!(
            iterator.call(GET_NEXT, &[Variant::from(1)]),
            Err(CallError::TooManyArguments { expected: 0 })
        );
        assert_eq!(iterator.call(GET_NEXT, &[]), Ok(Variant::Int(10)));
        assert_eq!(iterator.call(GET_NEXT, &[]), Ok(Variant::Int(20)));
        assert_eq!(iterator.call(GET_NEXT, &[]), Ok(Variant::Nil));
    }

    #[test]
    fn exceptions_become_call_errors() {
        let (_engine, bridge) = boot();
        let target = object(&bridge, "({ fail() { throw new RangeError('out of range'); } })");
        assert_eq!(
            target.call("fail", &[]),
            Err(CallError::Exception {
                message: "RangeError: out of range".into()
            })
        );
        // The runtime is usable afterwards.
        assert_eq!(bridge.evaluate("1 + 1").unwrap(), Variant::Int(2));
    }

    #[test]
    fn legacy_mode_swallows_exceptions() {
        let settings = ScriptSettings {
            exceptions_as_errors: false,
            ..ScriptSettings::default()
        };
        let (_engine, bridge) = boot_with(settings);
        let target = object(&bridge, "({ fail() { throw new Error('boom'); } })");
        assert_eq!(target.call("fail", &[]), Ok(Variant::Nil));
    }

    #[test]
    fn deep_results_hit_the_recursion_limit() {
        let settings = ScriptSettings {
            max_conversion_depth: 4,
            ..ScriptSettings::default()
        };
        let (_engine, bridge) = boot_with(settings);
        let target = object(&bridge, "({ loop() { const a = []; a.push(a); return a; } })");
        assert_eq!(target.call("loop", &[]), Err(CallError::RecursionLimit { limit: 4 }));
    }

    #[test]
    fn host_callbacks_can_call_back_into_the_receiver() {
        let (engine, bridge) = boot();
        let target = object(&bridge, "({ f() { return 1; }, g(cb) { return cb() + 1; } })");

        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        let inner = Rc::clone(&target);
        let reenter = engine.objects().create_func_ref("reenter", move |_| {
            let result = inner.call("f", &[]);
            *sink.borrow_mut() = Some(result.clone());
            result
        });

        assert_eq!(target.call("g", &[Variant::Object(reenter)]), Ok(Variant::Int(2)));
        assert_eq!(*seen.borrow(), Some(Ok(Variant::Int(1))));
    }
}
