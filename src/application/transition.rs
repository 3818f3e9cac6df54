//! State changes and their entry side effects.

use std::sync::atomic::Ordering;

use crate::device::{entry_effects, DeviceState, EntryEffect, Transition};
use crate::scheduler::lock;

use super::Inner;

impl Inner {
    /// Move to `next`.  Main loop only.
    ///
    /// Requesting the current state does nothing.  Otherwise the new state is
    /// stored, the background queue is drained, and only then are the LED
    /// and the entry effects of `next` applied.
    pub(super) fn set_device_state(&self, next: DeviceState) {
        let transition = {
            let _playback = lock(&self.playback);
            self.machine.transition(next)
        };
        match transition {
            Transition::Unchanged => return,
            Transition::Refused { current } => {
                log::warn!("app: refusing transition {current} -> {next}");
                return;
            }
            Transition::Changed { .. } => {}
        }

        log::info!("app: STATE: {next}");
        self.wait_background();

        self.ctx.led.on_state_changed(next, self.is_voice_detected());
        for &effect in entry_effects(next) {
            self.apply_entry_effect(effect);
        }
    }

    fn apply_entry_effect(&self, effect: EntryEffect) {
        match effect {
            EntryEffect::ShowStatus(status) => self.ctx.display.set_status(status),
            EntryEffect::ShowEmotion(emotion) => self.ctx.display.set_emotion(emotion),
            EntryEffect::StartAudioProcessor => {
                if let Some(processor) = &self.ctx.audio_processor {
                    processor.start();
                }
            }
            EntryEffect::StopAudioProcessor => {
                if let Some(processor) = &self.ctx.audio_processor {
                    processor.stop();
                }
            }
            EntryEffect::ResetDecoder => self.reset_decoder(),
            EntryEffect::ResetEncoder => {
                if let Some(encoder) = lock(&self.encoder).as_mut() {
                    encoder.reset_state();
                }
            }
            EntryEffect::PushIotStates => self.update_iot_states(),
        }
    }

    /// VAD edge from the wake-word engine.  Only tracked while listening.
    pub(super) fn on_voice_activity(&self, speaking: bool) {
        let state = self.device_state();
        if state != DeviceState::Listening {
            return;
        }
        self.voice_detected.store(speaking, Ordering::Release);
        self.ctx.led.on_state_changed(state, speaking);
    }
}
