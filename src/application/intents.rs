//! User-facing intents and wake-word reactions.  All run on the main loop.

use std::sync::atomic::Ordering;
use std::thread;

use crate::device::DeviceState;
use crate::protocol::{AbortReason, ListeningMode};

use super::Inner;

impl Inner {
    pub(super) fn toggle_chat_state(&self) {
        let Some(transport) = self.transport() else {
            log::error!("app: session transport not initialized");
            return;
        };

        match self.device_state() {
            DeviceState::Idle => {
                self.set_device_state(DeviceState::Connecting);
                if !transport.open_audio_channel() {
                    self.alert("Error", "Failed to open audio channel");
                    self.set_device_state(DeviceState::Idle);
                    return;
                }
                self.keep_listening.store(true, Ordering::Release);
                transport.send_start_listening(ListeningMode::AutoStop);
                self.set_device_state(DeviceState::Listening);
            }
            DeviceState::Speaking => self.abort_speaking(AbortReason::None),
            // Idle follows from the channel-closed callback.
            DeviceState::Listening => transport.close_audio_channel(),
            _ => {}
        }
    }

    pub(super) fn start_listening(&self) {
        let Some(transport) = self.transport() else {
            log::error!("app: session transport not initialized");
            return;
        };

        self.keep_listening.store(false, Ordering::Release);
        match self.device_state() {
            DeviceState::Idle => {
                if !transport.is_audio_channel_opened() {
                    self.set_device_state(DeviceState::Connecting);
                    if !transport.open_audio_channel() {
                        self.set_device_state(DeviceState::Idle);
                        self.alert("Error", "Failed to open audio channel");
                        return;
                    }
                }
                transport.send_start_listening(ListeningMode::ManualStop);
                self.set_device_state(DeviceState::Listening);
            }
            DeviceState::Speaking => {
                self.abort_speaking(AbortReason::None);
                transport.send_start_listening(ListeningMode::ManualStop);
                // Give the speaker time to drain what it already holds.
                thread::sleep(self.config.audio.speaker_drain());
                self.set_device_state(DeviceState::Listening);
            }
            _ => {}
        }
    }

    pub(super) fn stop_listening(&self) {
        if self.device_state() != DeviceState::Listening {
            return;
        }
        if let Some(transport) = self.transport() {
            transport.send_stop_listening();
        }
        self.set_device_state(DeviceState::Idle);
    }

    /// Cancel playback of the current utterance and tell the session why.
    pub(super) fn abort_speaking(&self, reason: AbortReason) {
        log::info!("app: abort speaking ({reason:?})");
        self.abort.abort();
        if let Some(transport) = self.transport() {
            transport.send_abort_speaking(reason);
        }
    }

    pub(super) fn alert(&self, title: &str, message: &str) {
        log::warn!("app: alert {title}: {message}");
        self.ctx.display.show_notification(message);
        if let Some(asset) = self.ctx.alert_sounds.get(message) {
            self.play_local_file(&asset);
        }
    }

    pub(super) fn update_iot_states(&self) {
        let Some(transport) = self.transport() else {
            return;
        };
        if let Some(states) = self.iot_states.changed(self.ctx.things.states_json()) {
            transport.send_iot_states(&states);
        }
    }

    pub(super) fn on_wake_word_detected(&self, word: &str) {
        let Some(detector) = self.ctx.wake_word.clone() else {
            return;
        };
        log::info!("app: wake word {word:?} detected");

        match self.device_state() {
            DeviceState::Idle => {
                self.set_device_state(DeviceState::Connecting);
                detector.encode_wake_word_data();

                let opened = match self.transport() {
                    Some(transport) if transport.open_audio_channel() => Some(transport),
                    Some(_) => None,
                    None => {
                        log::error!("app: session transport not initialized");
                        None
                    }
                };
                let Some(transport) = opened else {
                    self.set_device_state(DeviceState::Idle);
                    detector.start_detection();
                    return;
                };

                while let Some(frame) = detector.take_wake_word_frame() {
                    transport.send_audio(&frame);
                }
                transport.send_wake_word_detected(word);
                self.keep_listening.store(true, Ordering::Release);
                self.set_device_state(DeviceState::Listening);
            }
            DeviceState::Speaking => self.abort_speaking(AbortReason::WakeWordDetected),
            _ => {}
        }

        detector.start_detection();
    }
}
