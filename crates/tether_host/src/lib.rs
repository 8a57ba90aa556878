//! Tether Host Object Model
//!
//! The statically-typed side of the bridge:
//! - `Variant`: the tagged host value
//! - `Dictionary`: unordered host mapping
//! - `Object` / `ObjectDb`: reference-counted host objects and their registry
//! - `Script` / `ScriptInstance`: the capability contracts a scripting
//!   backend implements
//! - `CallError`: the host's call-outcome taxonomy

pub mod call;
pub mod dictionary;
pub mod object;
pub mod script;
pub mod variant;

pub use call::{CallError, CallResult};
pub use dictionary::Dictionary;
pub use object::{cast, FuncRef, Object, ObjectDb, ObjectId, ObjectRef, ScriptedObject};
pub use script::{MethodInfo, PropertyInfo, RpcMode, Script, ScriptFailure, ScriptInstance};
pub use variant::{Variant, VariantType};

/// Host model version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
