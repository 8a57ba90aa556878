//! Value conversion between host variants and script values

use crate::bridge::Scope;
use crate::callback;
use crate::error::MarshalError;
use crate::helpers::Helpers;
use crate::instance::ForeignInstance;
use crate::script::ForeignScript;
use rquickjs::{IntoJs, Value};
use tether_host::{cast, Dictionary, FuncRef, Object, ObjectRef, ScriptInstance, Variant};

/// Classification of a script value at conversion time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ForeignKind {
    None,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    /// Frozen array
    Tuple,
    List,
    /// `Map`
    Dict,
    Set,
    Iterator,
    Type,
    Module,
    Callable,
    Object,
}

impl ForeignKind {
    pub(crate) fn from_tag(tag: &str) -> Self {
        match tag {
            "none" => ForeignKind::None,
            "bool" => ForeignKind::Bool,
            "int" => ForeignKind::Int,
            "float" => ForeignKind::Float,
            "string" => ForeignKind::String,
            "bytes" => ForeignKind::Bytes,
            "tuple" => ForeignKind::Tuple,
            "list" => ForeignKind::List,
            "dict" => ForeignKind::Dict,
            "set" => ForeignKind::Set,
            "iterator" => ForeignKind::Iterator,
            "type" => ForeignKind::Type,
            "module" => ForeignKind::Module,
            "callable" => ForeignKind::Callable,
            _ => ForeignKind::Object,
        }
    }

    pub fn classify<'js>(helpers: &Helpers<'js>, value: &Value<'js>) -> rquickjs::Result<Self> {
        if value.is_undefined() || value.is_null() {
            Ok(ForeignKind::None)
        } else if value.as_bool().is_some() {
            Ok(ForeignKind::Bool)
        } else if value.as_int().is_some() {
            Ok(ForeignKind::Int)
        } else if value.as_float().is_some() {
            Ok(ForeignKind::Float)
        } else if value.is_string() {
            Ok(ForeignKind::String)
        } else {
            helpers.kind(value)
        }
    }

    /// Types and plain callables.
    pub fn is_callable(self) -> bool {
        matches!(self, ForeignKind::Type | ForeignKind::Callable)
    }
}

/// Parse the decimal form of a `BigInt`, saturating outside the `i64` range.
fn saturating_i64(text: &str) -> i64 {
    match text.trim().parse::<i64>() {
        Ok(value) => value,
        Err(_) if text.trim_start().starts_with('-') => i64::MIN,
        Err(_) => i64::MAX,
    }
}

impl<'js> Scope<'js> {
    /// Convert a host value. Never fails: anything without a script
    /// counterpart becomes `null`.
    ///
    /// With `priority`, sequences become frozen arrays (tuples), and so do
    /// the sequences nested in them.
    pub fn to_foreign(&self, value: &Variant, priority: bool) -> Value<'js> {
        match self.foreign_value(value, priority) {
            Ok(converted) => converted,
            Err(err) => {
                let err = self.helpers.caught(err);
                tracing::warn!(%err, kind = %value.get_type(), "Host value has no script form, using null");
                self.null()
            }
        }
    }

    pub(crate) fn null(&self) -> Value<'js> {
        Value::new_null(self.ctx.clone())
    }

    pub(crate) fn undefined(&self) -> Value<'js> {
        Value::new_undefined(self.ctx.clone())
    }

    fn foreign_value(&self, value: &Variant, priority: bool) -> rquickjs::Result<Value<'js>> {
        let ctx = &self.ctx;
        Ok(match value {
            Variant::Nil => self.null(),
            Variant::Bool(v) => Value::new_bool(ctx.clone(), *v),
            Variant::Int(v) => self.int(*v)?,
            Variant::Float(v) => Value::new_float(ctx.clone(), *v),
            Variant::String(v) => rquickjs::String::from_str(ctx.clone(), v)?.into_value(),
            Variant::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.foreign_value(item, priority))
                    .collect::<rquickjs::Result<Vec<_>>>()?;
                self.sequence(items, priority)?
            }
            Variant::IntArray(items) => {
                let items = items.iter().map(|&v| self.int(v)).collect::<rquickjs::Result<Vec<_>>>()?;
                self.sequence(items, priority)?
            }
            Variant::FloatArray(items) => {
                let items = items.iter().map(|&v| Value::new_float(ctx.clone(), v)).collect();
                self.sequence(items, priority)?
            }
            Variant::StringArray(items) => {
                let items = items
                    .iter()
                    .map(|v| Ok(rquickjs::String::from_str(ctx.clone(), v)?.into_value()))
                    .collect::<rquickjs::Result<Vec<_>>>()?;
                self.sequence(items, priority)?
            }
            Variant::ByteArray(bytes) => self.helpers.to_bytes(bytes)?,
            Variant::Dictionary(dict) => self.dictionary(dict)?,
            Variant::Object(object) => self.object(object)?,
            Variant::Vector2(_)
            | Variant::Vector3(_)
            | Variant::Quat(_)
            | Variant::Color(_)
            | Variant::NodePath(_)
            | Variant::Rid(_)
            | Variant::Vector2Array(_)
            | Variant::Vector3Array(_)
            | Variant::ColorArray(_) => {
                tracing::trace!(kind = %value.get_type(), "No script form for host value");
                self.null()
            }
        })
    }

    fn int(&self, value: i64) -> rquickjs::Result<Value<'js>> {
        match i32::try_from(value) {
            Ok(small) => Ok(Value::new_int(self.ctx.clone(), small)),
            Err(_) => self.helpers.big_int(value),
        }
    }

    fn sequence(&self, items: Vec<Value<'js>>, priority: bool) -> rquickjs::Result<Value<'js>> {
        if priority {
            self.helpers.freeze(items)
        } else {
            items.into_js(&self.ctx)
        }
    }

    fn dictionary(&self, dict: &Dictionary) -> rquickjs::Result<Value<'js>> {
        let mut keys = Vec::with_capacity(dict.len());
        let mut values = Vec::with_capacity(dict.len());
        for (key, value) in dict {
            keys.push(self.foreign_value(key, true)?);
            values.push(self.foreign_value(value, false)?);
        }
        self.helpers.to_map(keys, values)
    }

    /// Keyword arguments as a trailing options object. Non-string keys use
    /// their display form.
    pub(crate) fn options(&self, kwargs: &Dictionary) -> Value<'js> {
        let (keys, values): (Vec<String>, Vec<Value<'js>>) = kwargs
            .iter()
            .map(|(key, value)| {
                let key = key.as_str().map_or_else(|| key.to_string(), str::to_string);
                (key, self.to_foreign(value, false))
            })
            .unzip();
        match self.helpers.record(keys, values) {
            Ok(record) => record,
            Err(err) => {
                let err = self.helpers.caught(err);
                tracing::warn!(%err, "Keyword arguments could not be converted");
                self.undefined()
            }
        }
    }

    fn object(&self, object: &ObjectRef) -> rquickjs::Result<Value<'js>> {
        if let Some(script) = cast::<ForeignScript>(object) {
            return match script.module() {
                Some(handle) => handle.restore(&self.ctx),
                None => Ok(self.null()),
            };
        }
        if cast::<FuncRef>(object).is_some() {
            return callback::host_function(self, object.instance_id());
        }
        let adapter = object
            .script_instance()
            .and_then(|instance| instance.as_any().downcast_ref::<ForeignInstance>());
        match adapter {
            Some(instance) => instance.handle().restore(&self.ctx),
            None => Ok(self.null()),
        }
    }

    /// Convert a script value. Never fails: values nested deeper than the
    /// configured limit (and unreadable values) become nil.
    pub fn to_host(&self, value: Value<'js>) -> Variant {
        match self.try_to_host(value) {
            Ok(converted) => converted,
            Err(err @ MarshalError::DepthExceeded { .. }) => {
                tracing::error!(%err, "Script value too deep, using nil");
                Variant::Nil
            }
            Err(err) => {
                tracing::warn!(%err, "Script value unreadable, using nil");
                Variant::Nil
            }
        }
    }

    pub fn try_to_host(&self, value: Value<'js>) -> Result<Variant, MarshalError> {
        self.host_value(value, 0)
    }

    fn unreadable(&self, err: rquickjs::Error) -> MarshalError {
        MarshalError::Unreadable {
            message: self.helpers.caught(err).to_string(),
        }
    }

    /// Containers at `depth` nest `depth + 1` levels deep.
    fn enter_container(&self, depth: usize) -> Result<(), MarshalError> {
        let limit = self.bridge().settings().max_conversion_depth;
        if depth >= limit {
            return Err(MarshalError::DepthExceeded { limit });
        }
        Ok(())
    }

    fn host_value(&self, value: Value<'js>, depth: usize) -> Result<Variant, MarshalError> {
        let kind = ForeignKind::classify(&self.helpers, &value).map_err(|e| self.unreadable(e))?;
        Ok(match kind {
            ForeignKind::None => Variant::Nil,
            ForeignKind::Bool => Variant::Bool(value.as_bool().unwrap_or_default()),
            ForeignKind::Int => match value.as_int() {
                Some(small) => Variant::Int(i64::from(small)),
                None => {
                    let text = self.helpers.big_int_text(&value).map_err(|e| self.unreadable(e))?;
                    Variant::Int(saturating_i64(&text))
                }
            },
            ForeignKind::Float => Variant::Float(value.as_float().unwrap_or_default()),
            ForeignKind::String => {
                let text = value
                    .as_string()
                    .map(|s| s.to_string())
                    .transpose()
                    .map_err(|e| self.unreadable(e))?
                    .unwrap_or_default();
                Variant::String(text)
            }
            ForeignKind::Bytes => {
                Variant::ByteArray(self.helpers.bytes(&value).map_err(|e| self.unreadable(e))?)
            }
            ForeignKind::Tuple | ForeignKind::List | ForeignKind::Set => {
                self.enter_container(depth)?;
                let items = self.helpers.items(&value).map_err(|e| self.unreadable(e))?;
                Variant::Array(
                    items
                        .into_iter()
                        .map(|item| self.host_value(item, depth + 1))
                        .collect::<Result<_, _>>()?,
                )
            }
            ForeignKind::Dict => {
                self.enter_container(depth)?;
                let flat = self.helpers.pairs(&value).map_err(|e| self.unreadable(e))?;
                let mut dict = Dictionary::new();
                let mut entries = flat.into_iter();
                while let (Some(key), Some(item)) = (entries.next(), entries.next()) {
                    let key = self.host_value(key, depth + 1)?;
                    if key.is_nil() {
                        tracing::debug!("Dropping map entry with unsupported key");
                        continue;
                    }
                    dict.insert(key, self.host_value(item, depth + 1)?);
                }
                Variant::Dictionary(dict)
            }
            ForeignKind::Module | ForeignKind::Type => {
                let script = self.wrap_script(value).map_err(|e| MarshalError::Unreadable {
                    message: e.to_string(),
                })?;
                Variant::Object(script)
            }
            ForeignKind::Iterator | ForeignKind::Callable | ForeignKind::Object => {
                let owner = self.wrap_instance(value).map_err(|e| MarshalError::Unreadable {
                    message: e.to_string(),
                })?;
                Variant::Object(owner)
            }
        })
    }
}
