//! Tether Script Bridge
//!
//! Embeds a QuickJS runtime behind the host object model:
//!
//! - **Marshaling:** `Variant` to script values and back (`marshal`)
//! - **Lifetime:** one [`ScriptEngine`] per runtime; every held script value
//!   is a [`ForeignRef`]
//! - **Proxies:** modules and types become [`ForeignScript`]s, other objects
//!   become [`ForeignInstance`]s attached to a host owner
//! - **Dispatch:** name lookup plus arity checks recovered from function
//!   source (`dispatch`, `signature`)
//! - **Callbacks:** host `FuncRef`s callable from scripts (`callback`)
//!
//! ```no_run
//! use tether_script::{Interop, ScriptEngine};
//! use tether_services::ScriptSettings;
//!
//! let engine = ScriptEngine::new(ScriptSettings::default());
//! let interop = Interop::new(engine.start()?);
//! interop.register_module("greet", "exports.hello = (name) => `hello ${name}`;")?;
//! let greet = interop.load("greet")?;
//! assert!(tether_host::Script::is_valid(&*greet));
//! # Ok::<(), tether_script::BridgeError>(())
//! ```

pub mod bridge;
pub mod callback;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod handle;
pub mod helpers;
pub mod instance;
pub mod interop;
pub mod marshal;
pub mod module;
pub mod script;
pub mod signature;

#[cfg(test)]
mod test_support;

pub use bridge::{Bridge, Scope};
pub use dispatch::{dispatch, CallRequest};
pub use engine::{EngineCore, ScriptEngine, SCRIPT_LOG_TARGET};
pub use error::{BridgeError, BridgeResult, MarshalError};
pub use handle::ForeignRef;
pub use helpers::{FunctionSource, Helpers};
pub use instance::ForeignInstance;
pub use interop::Interop;
pub use marshal::ForeignKind;
pub use module::{ModuleLoader, ModuleSource};
pub use script::{ForeignScript, ScriptKind};
pub use signature::Signature;

pub use rquickjs;
