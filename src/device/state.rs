//! Device state enum and its lock-free cell.
//!
//! [`DeviceState`] is the visible state of the device.  The orchestrator
//! owns the only [`StateCell`]; the main scheduler is the only writer, while
//! the upgrade checker and protocol callbacks read it from other threads.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

// ---------------------------------------------------------------------------
// DeviceState
// ---------------------------------------------------------------------------

/// States of the voice device.
///
/// ```text
/// Unknown ─▶ Starting ─▶ Idle ─toggle─▶ Connecting ─open ok─▶ Listening
///                          ▲                 │ open failed        │ tts:start
///                          └─────────────────┘                    ▼
///                          ◀──────── tts:stop / channel closed ── Speaking
/// Idle ──new firmware──▶ Upgrading ──▶ (restart)
/// any ──fatal init failure──▶ FatalError   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DeviceState {
    #[default]
    Unknown = 0,
    Starting = 1,
    Configuring = 2,
    Idle = 3,
    Connecting = 4,
    Listening = 5,
    Speaking = 6,
    Upgrading = 7,
    FatalError = 8,
}

impl DeviceState {
    pub const ALL: [DeviceState; 9] = [
        DeviceState::Unknown,
        DeviceState::Starting,
        DeviceState::Configuring,
        DeviceState::Idle,
        DeviceState::Connecting,
        DeviceState::Listening,
        DeviceState::Speaking,
        DeviceState::Upgrading,
        DeviceState::FatalError,
    ];

    /// Stable lowercase name used in logs.
    ///
    /// ```
    /// use voice_device_core::device::DeviceState;
    ///
    /// assert_eq!(DeviceState::Idle.name(), "idle");
    /// assert_eq!(DeviceState::FatalError.name(), "fatal_error");
    /// ```
    pub fn name(self) -> &'static str {
        match self {
            DeviceState::Unknown => "unknown",
            DeviceState::Starting => "starting",
            DeviceState::Configuring => "configuring",
            DeviceState::Idle => "idle",
            DeviceState::Connecting => "connecting",
            DeviceState::Listening => "listening",
            DeviceState::Speaking => "speaking",
            DeviceState::Upgrading => "upgrading",
            DeviceState::FatalError => "fatal_error",
        }
    }

    /// `true` while a conversation is in progress.
    pub fn is_interacting(self) -> bool {
        matches!(
            self,
            DeviceState::Connecting | DeviceState::Listening | DeviceState::Speaking
        )
    }

    fn from_u8(raw: u8) -> Self {
        Self::ALL
            .get(usize::from(raw))
            .copied()
            .unwrap_or(DeviceState::Unknown)
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// StateCell
// ---------------------------------------------------------------------------

/// Atomic holder for a [`DeviceState`].
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: DeviceState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn get(&self) -> DeviceState {
        DeviceState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store `state` and return the previous one.
    pub fn replace(&self, state: DeviceState) -> DeviceState {
        DeviceState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unknown() {
        assert_eq!(DeviceState::default(), DeviceState::Unknown);
        assert_eq!(StateCell::default().get(), DeviceState::Unknown);
    }

    #[test]
    fn every_state_survives_the_cell() {
        let cell = StateCell::default();
        for state in DeviceState::ALL {
            cell.replace(state);
            assert_eq!(cell.get(), state);
        }
    }

    #[test]
    fn replace_returns_previous() {
        let cell = StateCell::new(DeviceState::Idle);
        assert_eq!(cell.replace(DeviceState::Connecting), DeviceState::Idle);
        assert_eq!(cell.get(), DeviceState::Connecting);
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = DeviceState::ALL.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DeviceState::ALL.len());
    }

    #[test]
    fn interacting_states() {
        assert!(DeviceState::Listening.is_interacting());
        assert!(DeviceState::Speaking.is_interacting());
        assert!(!DeviceState::Idle.is_interacting());
        assert!(!DeviceState::Upgrading.is_interacting());
    }
}
