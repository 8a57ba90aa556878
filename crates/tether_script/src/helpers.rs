//! Typed access to the helper table installed by the prelude

use crate::error::BridgeError;
use crate::marshal::ForeignKind;
use rquickjs::function::IntoArgs;
use rquickjs::{Array, Ctx, FromJs, Function, Object, Value};

/// Source of the helper table. Evaluates to a frozen object.
pub(crate) const PRELUDE: &str = include_str!("prelude.js");

/// Name of the native logging hook the prelude consumes at startup.
pub(crate) const LOG_HOOK: &str = "__tether_log";

/// Introspection data of a script function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSource {
    pub source: String,
    pub name: String,
    pub length: usize,
}

#[derive(Clone)]
pub struct Helpers<'js> {
    ctx: Ctx<'js>,
    table: Object<'js>,
}

impl<'js> Helpers<'js> {
    pub(crate) fn new(ctx: Ctx<'js>, table: Object<'js>) -> Self {
        Self { ctx, table }
    }

    fn call<A, R>(&self, name: &str, args: A) -> rquickjs::Result<R>
    where
        A: IntoArgs<'js>,
        R: FromJs<'js>,
    {
        let function: Function<'js> = self.table.get(name)?;
        function.call(args)
    }

    /// Turn a failed call into a bridge error, consuming any pending
    /// exception so the runtime is left clean.
    pub fn caught(&self, err: rquickjs::Error) -> BridgeError {
        match err {
            rquickjs::Error::Exception => {
                let thrown = self.ctx.catch();
                BridgeError::Exception {
                    message: self.describe(thrown),
                }
            }
            other => BridgeError::Js(other),
        }
    }

    pub fn describe(&self, thrown: Value<'js>) -> String {
        match self.call::<_, String>("describe", (thrown,)) {
            Ok(message) => message,
            Err(_) => {
                // The description itself threw; drop that exception too.
                let _ = self.ctx.catch();
                "unprintable exception".to_string()
            }
        }
    }

    pub fn kind(&self, value: &Value<'js>) -> rquickjs::Result<ForeignKind> {
        let tag: String = self.call("kind", (value.clone(),))?;
        Ok(ForeignKind::from_tag(&tag))
    }

    pub fn describe_function(&self, function: &Value<'js>) -> rquickjs::Result<FunctionSource> {
        let parts: Array<'js> = self.call("describeFunction", (function.clone(),))?;
        let length: i32 = parts.get(2)?;
        Ok(FunctionSource {
            source: parts.get(0)?,
            name: parts.get(1)?,
            length: usize::try_from(length).unwrap_or(0),
        })
    }

    pub fn name_of(&self, value: &Value<'js>) -> rquickjs::Result<String> {
        self.call("nameOf", (value.clone(),))
    }

    /// Constructor of `value`, or null.
    pub fn type_of(&self, value: &Value<'js>) -> rquickjs::Result<Value<'js>> {
        self.call("typeOf", (value.clone(),))
    }

    pub fn members(&self, target: &Value<'js>, walk: bool) -> rquickjs::Result<Vec<(String, Value<'js>)>> {
        let entries: Vec<Array<'js>> = self.call("members", (target.clone(), walk))?;
        entries
            .into_iter()
            .map(|entry| Ok((entry.get(0)?, entry.get(1)?)))
            .collect()
    }

    pub fn dir(&self, value: &Value<'js>) -> rquickjs::Result<Value<'js>> {
        self.call("dir", (value.clone(),))
    }

    pub fn bytes(&self, value: &Value<'js>) -> rquickjs::Result<Vec<u8>> {
        let values: Vec<i32> = self.call("bytes", (value.clone(),))?;
        Ok(values.into_iter().map(|b| b as u8).collect())
    }

    pub fn to_bytes(&self, bytes: &[u8]) -> rquickjs::Result<Value<'js>> {
        let values: Vec<i32> = bytes.iter().map(|&b| i32::from(b)).collect();
        self.call("toBytes", (values,))
    }

    /// Elements of an iterable, in iteration order.
    pub fn items(&self, value: &Value<'js>) -> rquickjs::Result<Vec<Value<'js>>> {
        self.call("items", (value.clone(),))
    }

    /// Entries of a `Map`, flattened as key, value, key, value...
    pub fn pairs(&self, value: &Value<'js>) -> rquickjs::Result<Vec<Value<'js>>> {
        self.call("pairs", (value.clone(),))
    }

    pub fn to_map(&self, keys: Vec<Value<'js>>, values: Vec<Value<'js>>) -> rquickjs::Result<Value<'js>> {
        self.call("toMap", (keys, values))
    }

    /// Plain object with the given string keys.
    pub fn record(&self, keys: Vec<String>, values: Vec<Value<'js>>) -> rquickjs::Result<Value<'js>> {
        self.call("record", (keys, values))
    }

    pub fn freeze(&self, values: Vec<Value<'js>>) -> rquickjs::Result<Value<'js>> {
        self.call("freeze", (values,))
    }

    pub fn big_int(&self, value: i64) -> rquickjs::Result<Value<'js>> {
        self.call("bigInt", (value.to_string(),))
    }

    pub fn big_int_text(&self, value: &Value<'js>) -> rquickjs::Result<String> {
        self.call("bigIntText", (value.clone(),))
    }

    pub fn iter(&self, value: &Value<'js>) -> rquickjs::Result<Value<'js>> {
        self.call("iter", (value.clone(),))
    }

    /// Advance an iterator. `None` once it is exhausted.
    pub fn step(&self, iterator: &Value<'js>) -> rquickjs::Result<Option<Value<'js>>> {
        let mut produced: Vec<Value<'js>> = self.call("step", (iterator.clone(),))?;
        Ok(produced.pop())
    }

    pub fn apply(
        &self,
        function: Value<'js>,
        this: Value<'js>,
        args: Vec<Value<'js>>,
    ) -> rquickjs::Result<Value<'js>> {
        self.call("apply", (function, this, args))
    }

    pub fn construct(&self, ty: Value<'js>, args: Vec<Value<'js>>) -> rquickjs::Result<Value<'js>> {
        self.call("construct", (ty, args))
    }

    pub fn str(&self, value: &Value<'js>) -> rquickjs::Result<String> {
        self.call("str", (value.clone(),))
    }

    pub fn has(&self, target: &Value<'js>, name: &str) -> rquickjs::Result<bool> {
        self.call("has", (target.clone(), name))
    }

    pub fn get(&self, target: &Value<'js>, name: &str) -> rquickjs::Result<Value<'js>> {
        self.call("get", (target.clone(), name))
    }

    pub fn set(&self, target: &Value<'js>, name: &str, value: Value<'js>) -> rquickjs::Result<bool> {
        self.call("set", (target.clone(), name, value))
    }

    /// Run a module body and cache its namespace under `name`.
    pub fn define_module(&self, name: &str, body: &str) -> rquickjs::Result<Value<'js>> {
        self.call("defineModule", (name, body))
    }

    /// Cached namespace of `name`, or undefined.
    pub fn cached(&self, name: &str) -> rquickjs::Result<Value<'js>> {
        self.call("cached", (name,))
    }

    pub fn set_args(&self, args: Vec<String>) -> rquickjs::Result<()> {
        self.call("setArgs", (args,))
    }
}
