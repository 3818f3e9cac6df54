//! Fixed IoT registry that records invoked commands.

use std::sync::Mutex;

use serde_json::{json, Value};

use crate::iot::ThingRegistry;
use crate::scheduler::lock;

/// One lamp with an on/off power state.
pub struct StaticThings {
    states: Mutex<Value>,
    invoked: Mutex<Vec<Value>>,
}

impl StaticThings {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(json!([{"name": "Lamp", "state": {"power": false}}])),
            invoked: Mutex::new(Vec::new()),
        }
    }

    pub fn invoked(&self) -> Vec<Value> {
        lock(&self.invoked).clone()
    }

    pub fn set_power(&self, on: bool) {
        *lock(&self.states) = json!([{"name": "Lamp", "state": {"power": on}}]);
    }
}

impl Default for StaticThings {
    fn default() -> Self {
        Self::new()
    }
}

impl ThingRegistry for StaticThings {
    fn descriptors_json(&self) -> String {
        json!([{
            "name": "Lamp",
            "description": "A switchable lamp",
            "properties": {"power": {"type": "boolean"}},
            "methods": {"TurnOn": {}, "TurnOff": {}}
        }])
        .to_string()
    }

    fn states_json(&self) -> String {
        lock(&self.states).to_string()
    }

    fn invoke(&self, command: &Value) {
        match command.get("method").and_then(Value::as_str) {
            Some("TurnOn") => self.set_power(true),
            Some("TurnOff") => self.set_power(false),
            _ => log::warn!("things: unsupported command {command}"),
        }
        lock(&self.invoked).push(command.clone());
    }
}
