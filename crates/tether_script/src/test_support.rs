//! Fresh engines for unit tests

use crate::bridge::Bridge;
use crate::engine::ScriptEngine;
use tether_services::ScriptSettings;

pub(crate) fn boot() -> (ScriptEngine, Bridge) {
    boot_with(ScriptSettings::default())
}

pub(crate) fn boot_with(settings: ScriptSettings) -> (ScriptEngine, Bridge) {
    let engine = ScriptEngine::new(settings);
    let bridge = engine.start().unwrap();
    (engine, bridge)
}
