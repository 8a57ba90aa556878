//! Ad-hoc access to script values from host code

use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::ForeignRef;
use crate::instance::ForeignInstance;
use crate::marshal::ForeignKind;
use crate::script::ForeignScript;
use std::path::Path;
use std::rc::Rc;
use tether_host::{cast, ObjectRef, Variant};

#[derive(Debug, Clone)]
pub struct Interop {
    bridge: Bridge,
}

/// The script value behind a wrapper or adapter owner.
fn foreign_ref(value: &Variant) -> Option<ForeignRef> {
    let object = value.as_object()?;
    if let Some(script) = cast::<ForeignScript>(object) {
        return script.module();
    }
    object
        .script_instance()
        .and_then(|instance| instance.as_any().downcast_ref::<ForeignInstance>())
        .map(|instance| instance.handle().clone())
}

impl Interop {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Import a module by dotted name.
    pub fn load(&self, name: &str) -> BridgeResult<Rc<ForeignScript>> {
        self.bridge.load_script(name)
    }

    pub fn register_module(&self, name: &str, source: impl Into<String>) -> BridgeResult<()> {
        self.bridge.register_module(name, source)
    }

    pub fn evaluate(&self, source: &str) -> BridgeResult<Variant> {
        self.bridge.evaluate(source)
    }

    /// Sorted attribute names, inherited ones included. Nil for values that
    /// are not script objects.
    pub fn dir(&self, object: &Variant) -> BridgeResult<Variant> {
        let Some(handle) = foreign_ref(object) else {
            return Ok(Variant::Nil);
        };
        self.bridge.with(|scope| {
            let value = handle.restore(&scope.ctx)?;
            let names = scope.check(scope.helpers.dir(&value))?;
            Ok(scope.to_host(names))
        })
    }

    /// Script string form, falling back to the host form when it is empty.
    pub fn str(&self, object: &Variant) -> BridgeResult<String> {
        let text = self.bridge.with(|scope| {
            let value = scope.to_foreign(object, false);
            scope.check(scope.helpers.str(&value))
        })?;
        if text.is_empty() {
            Ok(object.to_string())
        } else {
            Ok(text)
        }
    }

    /// A fresh iterator over a script object, bound to a new owner.
    pub fn iter(&self, object: &Variant) -> BridgeResult<Option<ObjectRef>> {
        let Some(handle) = foreign_ref(object) else {
            return Ok(None);
        };
        self.bridge
            .with(|scope| {
                let value = handle.restore(&scope.ctx)?;
                let iterator = scope.check(scope.helpers.iter(&value))?;
                scope.wrap_instance(iterator)
            })
            .map(Some)
    }

    /// Advance a script iterator; `default` once it is exhausted or when
    /// `iterator` is not one.
    pub fn next(&self, iterator: &Variant, default: Variant) -> BridgeResult<Variant> {
        let Some(handle) = foreign_ref(iterator) else {
            return Ok(default);
        };
        let produced = self.bridge.with(|scope| {
            let value = handle.restore(&scope.ctx)?;
            if scope.check(ForeignKind::classify(&scope.helpers, &value))? != ForeignKind::Iterator {
                return Ok(None);
            }
            Ok(scope.check(scope.helpers.step(&value))?.map(|item| scope.to_host(item)))
        })?;
        Ok(produced.unwrap_or(default))
    }

    /// Execute a file at top level with `scriptArgs` set to `[path, ...argv]`.
    pub fn run_file(&self, path: impl AsRef<Path>, argv: &[String]) -> BridgeResult<()> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| BridgeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if source.is_empty() {
            return Err(BridgeError::EmptySource {
                path: path.to_path_buf(),
            });
        }

        let args: Vec<String> = std::iter::once(path.display().to_string())
            .chain(argv.iter().cloned())
            .collect();
        tracing::info!(path = %path.display(), args = argv.len(), "Running script file");

        self.bridge.with(|scope| {
            scope.check(scope.helpers.set_args(args))?;
            scope.check(scope.ctx.eval::<(), _>(source))
        })
    }
}
