//! Transition rules and the per-state entry side-effect table.
//!
//! The machine itself only decides *whether* a transition happens.  The
//! orchestrator runs the barrier and then applies [`entry_effects`] through
//! its collaborators, so the policy stays declarative and testable here.

use super::{DeviceState, StateCell};

/// Outcome of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Requested state equals the current one; nothing happens.
    Unchanged,
    /// The machine is in a terminal state and stays there.
    Refused { current: DeviceState },
    /// The state was changed.
    Changed { from: DeviceState, to: DeviceState },
}

/// A side effect applied on entering a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryEffect {
    ShowStatus(&'static str),
    ShowEmotion(&'static str),
    /// Start the AEC / audio processor.
    StartAudioProcessor,
    /// Stop the AEC / audio processor.
    StopAudioProcessor,
    /// Clear the decode queue, reset the decoder, re-enable codec output.
    ResetDecoder,
    ResetEncoder,
    /// Send the IoT state snapshot if it changed since the last push.
    PushIotStates,
}

pub const STATUS_STANDBY: &str = "Standby";
pub const STATUS_CONNECTING: &str = "Connecting...";
pub const STATUS_LISTENING: &str = "Listening...";
pub const STATUS_SPEAKING: &str = "Speaking...";
pub const EMOTION_NEUTRAL: &str = "neutral";

/// Side effects for entering `state`, in the order they are applied.
pub fn entry_effects(state: DeviceState) -> &'static [EntryEffect] {
    use EntryEffect::*;

    match state {
        DeviceState::Unknown | DeviceState::Idle => &[
            ShowStatus(STATUS_STANDBY),
            ShowEmotion(EMOTION_NEUTRAL),
            StopAudioProcessor,
        ],
        DeviceState::Connecting => &[ShowStatus(STATUS_CONNECTING)],
        DeviceState::Listening => &[
            ShowStatus(STATUS_LISTENING),
            ShowEmotion(EMOTION_NEUTRAL),
            ResetDecoder,
            ResetEncoder,
            StartAudioProcessor,
            PushIotStates,
        ],
        DeviceState::Speaking => &[
            ShowStatus(STATUS_SPEAKING),
            ResetDecoder,
            StopAudioProcessor,
        ],
        // Upgrading is driven by the upgrade sequence; the rest have no
        // visible entry behaviour.
        DeviceState::Starting
        | DeviceState::Configuring
        | DeviceState::Upgrading
        | DeviceState::FatalError => &[],
    }
}

/// Holder of the current [`DeviceState`].
#[derive(Debug, Default)]
pub struct DeviceStateMachine {
    state: StateCell,
}

impl DeviceStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> DeviceState {
        self.state.get()
    }

    /// Move to `next` unless it is the current state or the machine sits in
    /// `FatalError`.
    pub fn transition(&self, next: DeviceState) -> Transition {
        let current = self.state.get();
        if current == next {
            return Transition::Unchanged;
        }
        if current == DeviceState::FatalError {
            return Transition::Refused { current };
        }
        let from = self.state.replace(next);
        Transition::Changed { from, to: next }
    }
}
