//! IoT thing registry seam and state-change tracking.
//!
//! The registry describes the device's controllable things and executes
//! commands sent by the remote session.  [`StateTracker`] remembers the last
//! snapshot that was pushed so unchanged state is never sent twice.

use std::sync::Mutex;

use serde_json::Value;

use crate::scheduler::lock;

/// Controllable things exposed to the remote session.
pub trait ThingRegistry: Send + Sync {
    /// JSON array describing every thing and its methods.
    fn descriptors_json(&self) -> String;

    /// JSON snapshot of every thing's current state.
    fn states_json(&self) -> String;

    /// Execute one command object from an `iot` message.
    fn invoke(&self, command: &Value);
}

/// Last pushed IoT state snapshot.
#[derive(Debug, Default)]
pub struct StateTracker {
    last: Mutex<Option<String>>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `snapshot` and return it if it differs from the last recorded
    /// one.
    pub fn changed(&self, snapshot: String) -> Option<String> {
        let mut last = lock(&self.last);
        if last.as_deref() == Some(snapshot.as_str()) {
            return None;
        }
        *last = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Forget the last snapshot so the next one is always reported.  Used
    /// when a new session starts.
    pub fn forget(&self) {
        *lock(&self.last) = None;
    }
}
