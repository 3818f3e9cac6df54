//! Board hardware seams: codec, display, LED, power and time.
//!
//! Every trait is `Send + Sync` so the orchestrator can share one
//! `Arc<dyn Trait>` between the main loop, the background queue and the
//! upgrade checker.

pub mod codec;

use std::time::Instant;

use crate::device::DeviceState;

pub use codec::{AudioCodec, ReadyCallback};

/// Status line, emotion indicator, chat transcript and pop-up
/// notifications.
pub trait Display: Send + Sync {
    fn set_status(&self, status: &str);

    fn set_emotion(&self, emotion: &str);

    /// `role` is `"user"`, `"assistant"`, or empty together with `content`
    /// to clear the transcript.
    fn set_chat_message(&self, role: &str, content: &str);

    fn show_notification(&self, message: &str);
}

/// Status LED.  Repainted on every state change and on voice-activity edges
/// while listening.
pub trait Led: Send + Sync {
    fn on_state_changed(&self, state: DeviceState, voice_detected: bool);
}

/// Power management and reset.
pub trait Board: Send + Sync {
    fn set_power_save_mode(&self, enabled: bool);

    /// Reboot the device.  On hardware this never returns.
    fn restart(&self);
}

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
