//! Device state machine.
//!
//! * [`DeviceState`] / [`StateCell`]: the visible device state.
//! * [`DeviceStateMachine`]: idempotent transitions with a terminal
//!   `FatalError`.
//! * [`entry_effects`]: declarative side effects per entered state.

pub mod state;
pub mod state_machine;

pub use state::{DeviceState, StateCell};
pub use state_machine::{entry_effects, DeviceStateMachine, EntryEffect, Transition};
