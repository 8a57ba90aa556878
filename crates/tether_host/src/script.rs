//! Capability contracts implemented by scripting backends

use crate::call::CallResult;
use crate::object::{Object, ObjectRef};
use crate::variant::{Variant, VariantType};
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: String,
    /// Positional parameters, defaults included.
    pub argument_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: String,
    pub kind: VariantType,
}

impl PropertyInfo {
    /// A property whose type is not known ahead of time.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VariantType::Nil,
        }
    }
}

/// Network replication policy for a method or property.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RpcMode {
    #[default]
    Disabled,
    Remote,
    Master,
    Puppet,
}

/// Resource-level failure of a script operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptFailure {
    #[error("script is empty")]
    Empty,

    #[error("script `{name}` cannot be reloaded")]
    NotReloadable { name: String },

    #[error("script `{name}` failed to load")]
    Failed { name: String },
}

/// A script resource: the type or module side of a scripting backend.
///
/// Calls go through [`Object::call`].
pub trait Script: Object {
    fn name(&self) -> String;

    fn is_valid(&self) -> bool;

    fn reload(&self) -> Result<(), ScriptFailure>;

    fn has_method(&self, name: &str) -> bool;

    fn method_info(&self, name: &str) -> Option<MethodInfo>;

    fn method_list(&self) -> Vec<MethodInfo>;

    fn property_list(&self) -> Vec<PropertyInfo>;

    fn get_property(&self, name: &str) -> Option<Variant>;

    /// Returns `false` when the property cannot be written.
    fn set_property(&self, name: &str, value: &Variant) -> bool;

    /// Names of the data attributes, the same set as [`Self::property_list`].
    fn members(&self) -> Vec<String>;

    /// Whether `object` carries an instance of this script.
    fn instance_has(&self, object: &ObjectRef) -> bool;

    fn property_default_value(&self, _name: &str) -> Option<Variant> {
        None
    }

    fn can_instance(&self) -> bool {
        false
    }

    fn has_source_code(&self) -> bool {
        false
    }

    fn is_tool(&self) -> bool {
        false
    }
}

/// Per-object dynamic behavior attached to a host object.
pub trait ScriptInstance: fmt::Debug {
    fn get(&self, name: &str) -> Option<Variant>;

    /// Returns `false` when the property cannot be written.
    fn set(&self, name: &str, value: &Variant) -> bool;

    fn property_list(&self) -> Vec<PropertyInfo>;

    fn property_type(&self, _name: &str) -> Option<VariantType> {
        None
    }

    fn method_list(&self) -> Vec<MethodInfo>;

    fn has_method(&self, name: &str) -> bool;

    fn call(&self, method: &str, args: &[Variant]) -> CallResult;

    fn display_string(&self) -> String;

    fn script(&self) -> Option<Rc<dyn Script>>;

    fn rpc_mode(&self, _method: &str) -> RpcMode {
        RpcMode::Disabled
    }

    fn rset_mode(&self, _property: &str) -> RpcMode {
        RpcMode::Disabled
    }

    fn notification(&self, _what: i32) {}

    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::CallError;
    use crate::object::{ObjectDb, ScriptedObject};
    use std::cell::RefCell;

    #[derive(Debug, Default)]
    struct Counter {
        value: RefCell<i64>,
    }

    impl ScriptInstance for Counter {
        fn get(&self, name: &str) -> Option<Variant> {
            (name == "value").then(|| Variant::Int(*self.value.borrow()))
        }

        fn set(&self, name: &str, value: &Variant) -> bool {
            match (name, value) {
                ("value", Variant::Int(v)) => {
                    *self.value.borrow_mut() = *v;
                    true
                }
                _ => false,
            }
        }

        fn property_list(&self) -> Vec<PropertyInfo> {
            vec![PropertyInfo::untyped("value")]
        }

        fn method_list(&self) -> Vec<MethodInfo> {
            vec![MethodInfo {
                name: "bump".into(),
                argument_count: 0,
            }]
        }

        fn has_method(&self, name: &str) -> bool {
            name == "bump"
        }

        fn call(&self, method: &str, _args: &[Variant]) -> CallResult {
            if method != "bump" {
                return Err(CallError::InvalidMethod);
            }
            *self.value.borrow_mut() += 1;
            Ok(Variant::Int(*self.value.borrow()))
        }

        fn display_string(&self) -> String {
            format!("Counter({})", self.value.borrow())
        }

        fn script(&self) -> Option<Rc<dyn Script>> {
            None
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn owner_routes_calls_to_its_instance() {
        let db = ObjectDb::new();
        let owner = db.register_with(|id| ScriptedObject::new(id, Some(Box::new(Counter::default()))));

        assert_eq!(owner.call("bump", &[]), Ok(Variant::Int(1)));
        assert_eq!(owner.call("missing", &[]), Err(CallError::InvalidMethod));

        let instance = owner.script_instance().unwrap();
        assert!(instance.set("value", &Variant::Int(10)));
        assert!(!instance.set("value", &Variant::from("ten")));
        assert_eq!(instance.get("value"), Some(Variant::Int(10)));
        assert_eq!(instance.rpc_mode("bump"), RpcMode::Disabled);
        assert_eq!(instance.property_type("value"), None);
        assert!(instance.as_any().downcast_ref::<Counter>().is_some());
    }
}
