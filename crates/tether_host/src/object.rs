//! Reference-counted host objects and the registry that resolves them by id

use crate::call::{CallError, CallResult};
use crate::script::ScriptInstance;
use crate::variant::Variant;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Numeric identity of a host object, stable for the object's lifetime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A host object.
pub trait Object: Any + fmt::Debug {
    fn instance_id(&self) -> ObjectId;

    fn class_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;

    /// The dynamic instance attached to this object, if any.
    fn script_instance(&self) -> Option<&dyn ScriptInstance> {
        None
    }

    fn call(&self, method: &str, args: &[Variant]) -> CallResult {
        match self.script_instance() {
            Some(instance) => instance.call(method, args),
            None => Err(CallError::InvalidMethod),
        }
    }
}

pub type ObjectRef = Rc<dyn Object>;

/// Downcast a shared object to its concrete type.
pub fn cast<T: Object>(object: &ObjectRef) -> Option<Rc<T>> {
    Rc::clone(object).into_any().downcast::<T>().ok()
}

/// Registry of live host objects.
///
/// Holds weak references only: an object's lifetime is governed by its
/// strong `Rc`s, and a lookup after the last one is gone yields `None`.
#[derive(Default)]
pub struct ObjectDb {
    next_id: Cell<u64>,
    objects: RefCell<HashMap<ObjectId, Weak<dyn Object>>>,
}

impl ObjectDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id, build the object with it and register the result.
    ///
    /// `build` may itself register further objects.
    pub fn register_with<T: Object>(&self, build: impl FnOnce(ObjectId) -> T) -> Rc<T> {
        let id = ObjectId(self.next_id.get() + 1);
        self.next_id.set(id.0);

        let object = Rc::new(build(id));
        let weak: Weak<dyn Object> = Rc::downgrade(&object) as Weak<dyn Object>;

        let mut objects = self.objects.borrow_mut();
        objects.retain(|_, entry| entry.strong_count() > 0);
        objects.insert(id, weak);
        object
    }

    pub fn get_instance(&self, id: ObjectId) -> Option<ObjectRef> {
        self.objects.borrow().get(&id).and_then(Weak::upgrade)
    }

    pub fn instance_validate(&self, id: ObjectId) -> bool {
        self.objects
            .borrow()
            .get(&id)
            .is_some_and(|entry| entry.strong_count() > 0)
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects
            .borrow()
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a host callable.
    pub fn create_func_ref(
        &self,
        name: impl Into<String>,
        target: impl Fn(&[Variant]) -> CallResult + 'static,
    ) -> Rc<FuncRef> {
        let name = name.into();
        self.register_with(|id| FuncRef {
            id,
            name,
            target: Box::new(target),
        })
    }
}

impl fmt::Debug for ObjectDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDb").field("live", &self.len()).finish()
    }
}

/// A plain host object that may carry a dynamic script instance.
#[derive(Debug)]
pub struct ScriptedObject {
    id: ObjectId,
    instance: Option<Box<dyn ScriptInstance>>,
}

impl ScriptedObject {
    pub fn new(id: ObjectId, instance: Option<Box<dyn ScriptInstance>>) -> Self {
        Self { id, instance }
    }
}

impl Object for ScriptedObject {
    fn instance_id(&self) -> ObjectId {
        self.id
    }

    fn class_name(&self) -> &str {
        "ScriptedObject"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn script_instance(&self) -> Option<&dyn ScriptInstance> {
        self.instance.as_deref()
    }
}

/// A host callable addressable by object id.
pub struct FuncRef {
    id: ObjectId,
    name: String,
    target: Box<dyn Fn(&[Variant]) -> CallResult>,
}

impl FuncRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call_func(&self, args: &[Variant]) -> CallResult {
        (self.target)(args)
    }
}

impl fmt::Debug for FuncRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncRef")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Object for FuncRef {
    fn instance_id(&self) -> ObjectId {
        self.id
    }

    fn class_name(&self) -> &str {
        "FuncRef"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn call(&self, method: &str, args: &[Variant]) -> CallResult {
        match method {
            "call_func" => self.call_func(args),
            _ => Err(CallError::InvalidMethod),
        }
    }
}
