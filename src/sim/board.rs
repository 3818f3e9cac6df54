//! Recording display, LED and board, plus a hand-driven clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::board::{Board, Clock, Display, Led};
use crate::device::DeviceState;
use crate::scheduler::lock;

/// Hook invoked with each status text before it is recorded.
pub type StatusHook = Box<dyn Fn(&str) + Send + Sync + 'static>;

/// One display update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    Status(String),
    Emotion(String),
    Chat { role: String, content: String },
    Notification(String),
}

/// Display that logs and records every update.
#[derive(Default)]
pub struct RecordingDisplay {
    shown: Mutex<Vec<Shown>>,
    status_hook: Mutex<Option<StatusHook>>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<Shown> {
        lock(&self.shown).clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.filter(|s| match s {
            Shown::Status(text) => Some(text.clone()),
            _ => None,
        })
    }

    pub fn notifications(&self) -> Vec<String> {
        self.filter(|s| match s {
            Shown::Notification(text) => Some(text.clone()),
            _ => None,
        })
    }

    pub fn chat_messages(&self) -> Vec<(String, String)> {
        self.filter(|s| match s {
            Shown::Chat { role, content } => Some((role.clone(), content.clone())),
            _ => None,
        })
    }

    pub fn last_emotion(&self) -> Option<String> {
        self.filter(|s| match s {
            Shown::Emotion(text) => Some(text.clone()),
            _ => None,
        })
        .pop()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        lock(&self.shown).clear();
    }

    pub fn set_status_hook(&self, hook: StatusHook) {
        *lock(&self.status_hook) = Some(hook);
    }

    fn filter<T>(&self, pick: impl Fn(&Shown) -> Option<T>) -> Vec<T> {
        lock(&self.shown).iter().filter_map(pick).collect()
    }

    fn record(&self, shown: Shown) {
        lock(&self.shown).push(shown);
    }
}

impl Display for RecordingDisplay {
    fn set_status(&self, status: &str) {
        if let Some(hook) = lock(&self.status_hook).as_ref() {
            hook(status);
        }
        log::info!("display: status {status:?}");
        self.record(Shown::Status(status.to_string()));
    }

    fn set_emotion(&self, emotion: &str) {
        log::debug!("display: emotion {emotion:?}");
        self.record(Shown::Emotion(emotion.to_string()));
    }

    fn set_chat_message(&self, role: &str, content: &str) {
        if !content.is_empty() {
            log::info!("display: {role}: {content}");
        }
        self.record(Shown::Chat {
            role: role.to_string(),
            content: content.to_string(),
        });
    }

    fn show_notification(&self, message: &str) {
        log::info!("display: notification {message:?}");
        self.record(Shown::Notification(message.to_string()));
    }
}

/// LED that records every repaint.
#[derive(Default)]
pub struct RecordingLed {
    repaints: Mutex<Vec<(DeviceState, bool)>>,
}

impl RecordingLed {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(state, voice_detected)` for every repaint, oldest first.
    pub fn repaints(&self) -> Vec<(DeviceState, bool)> {
        lock(&self.repaints).clone()
    }
}

impl Led for RecordingLed {
    fn on_state_changed(&self, state: DeviceState, voice_detected: bool) {
        lock(&self.repaints).push((state, voice_detected));
    }
}

/// Board that records power-save switches and restart requests.
#[derive(Default)]
pub struct SimBoard {
    power_save: Mutex<Vec<bool>>,
    restarts: AtomicUsize,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power_save_calls(&self) -> Vec<bool> {
        lock(&self.power_save).clone()
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::Acquire)
    }
}

impl Board for SimBoard {
    fn set_power_save_mode(&self, enabled: bool) {
        lock(&self.power_save).push(enabled);
    }

    fn restart(&self) {
        log::warn!("board: restart requested");
        self.restarts.fetch_add(1, Ordering::AcqRel);
    }
}

/// Clock that only moves when [`advance`](Self::advance)d.
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *lock(&self.offset) += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *lock(&self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_on_advance() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);
        clock.advance(Duration::from_secs(11));
        assert_eq!(clock.now() - start, Duration::from_secs(11));
    }

    #[test]
    fn display_filters_by_kind() {
        let display = RecordingDisplay::new();
        display.set_status("a");
        display.show_notification("b");
        display.set_chat_message("user", "c");
        display.set_emotion("happy");

        assert_eq!(display.statuses(), vec!["a"]);
        assert_eq!(display.notifications(), vec!["b"]);
        assert_eq!(display.chat_messages(), vec![("user".into(), "c".into())]);
        assert_eq!(display.last_emotion().as_deref(), Some("happy"));
    }
}
