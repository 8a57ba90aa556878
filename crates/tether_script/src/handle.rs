//! Strong holds on script values from host space

use crate::engine::EngineCore;
use rquickjs::{Ctx, Persistent, Value};
use std::fmt;
use std::rc::Rc;

/// One strong reference to a script value.
///
/// Taken on construction and released exactly once on drop. The engine
/// core (and so the runtime) outlives every handle.
pub struct ForeignRef {
    // Declared before `core`: the value must be freed while the runtime is alive.
    value: Persistent<Value<'static>>,
    core: Rc<EngineCore>,
}

impl ForeignRef {
    pub(crate) fn hold<'js>(core: &Rc<EngineCore>, ctx: &Ctx<'js>, value: Value<'js>) -> Self {
        let live = core.retain();
        tracing::trace!(live, "Holding script value");
        Self {
            value: Persistent::save(ctx, value),
            core: Rc::clone(core),
        }
    }

    /// Borrow the held value inside an engine scope.
    pub fn restore<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        self.value.clone().restore(ctx)
    }
}

impl Clone for ForeignRef {
    fn clone(&self) -> Self {
        let live = self.core.retain();
        tracing::trace!(live, "Holding script value");
        Self {
            value: self.value.clone(),
            core: Rc::clone(&self.core),
        }
    }
}

impl Drop for ForeignRef {
    fn drop(&mut self) {
        let live = self.core.release();
        tracing::trace!(live, "Released script value");
    }
}

impl fmt::Debug for ForeignRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignRef").finish_non_exhaustive()
    }
}
