//! Wiring of transport and voice-analysis callbacks, and handling of
//! incoming control messages.
//!
//! Callbacks hold only a weak reference to the application and re-post
//! anything that touches device state onto the main loop.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::Value;

use crate::device::DeviceState;
use crate::protocol::{ListeningMode, ServerMessage, SessionTransport, TtsEvent};

use super::Inner;

impl Inner {
    pub(super) fn wire_transport(self: &Arc<Self>, transport: &dyn SessionTransport) {
        let weak = Arc::downgrade(self);
        transport.on_network_error(Box::new(move |message: &str| {
            let message = message.to_string();
            if let Some(inner) = weak.upgrade() {
                inner.schedule(move |inner| inner.alert("Error", &message));
            }
        }));

        let weak = Arc::downgrade(self);
        transport.on_incoming_audio(Box::new(move |frame| {
            if let Some(inner) = weak.upgrade() {
                inner.queue_incoming_audio(frame);
            }
        }));

        let weak = Arc::downgrade(self);
        transport.on_audio_channel_opened(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.ctx.board.set_power_save_mode(false);
                // Opening is driven from main-queue tasks; the channel must be
                // set up before that task goes on to start listening.
                if inner.on_main_thread() {
                    inner.on_audio_channel_opened();
                } else {
                    inner.schedule(|inner| inner.on_audio_channel_opened());
                }
            }
        }));

        let weak = Arc::downgrade(self);
        transport.on_audio_channel_closed(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.ctx.board.set_power_save_mode(true);
                inner.schedule(|inner| {
                    inner.ctx.display.set_chat_message("", "");
                    inner.set_device_state(DeviceState::Idle);
                });
            }
        }));

        let weak = Arc::downgrade(self);
        transport.on_incoming_json(Box::new(move |message: &Value| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_message(message);
            }
        }));
    }

    pub(super) fn wire_voice_analysis(self: &Arc<Self>) {
        if let Some(processor) = &self.ctx.audio_processor {
            let weak = Arc::downgrade(self);
            processor.on_output(Box::new(move |pcm| {
                if let Some(inner) = weak.upgrade() {
                    inner.encode_and_send(pcm);
                }
            }));
        }

        if let Some(detector) = &self.ctx.wake_word {
            let weak = Arc::downgrade(self);
            detector.on_vad_state_change(Box::new(move |speaking| {
                if let Some(inner) = weak.upgrade() {
                    inner.schedule(move |inner| inner.on_voice_activity(speaking));
                }
            }));

            let weak = Arc::downgrade(self);
            detector.on_wake_word_detected(Box::new(move |word: &str| {
                let word = word.to_string();
                if let Some(inner) = weak.upgrade() {
                    inner.schedule(move |inner| inner.on_wake_word_detected(&word));
                }
            }));

            detector.start_detection();
        }
    }

    fn on_audio_channel_opened(&self) {
        let Some(transport) = self.transport() else {
            return;
        };

        let server_rate = transport.server_sample_rate();
        let output_rate = self.ctx.codec.output_sample_rate();
        if server_rate != output_rate {
            log::warn!(
                "app: server sample rate {server_rate} Hz differs from codec output {output_rate} Hz, \
                 playback will be resampled"
            );
        }
        self.set_decode_sample_rate(server_rate);

        self.iot_states.forget();
        transport.send_iot_descriptors(&self.ctx.things.descriptors_json());
    }

    /// Dispatch one control message.  Called on the transport's thread.
    fn handle_message(self: &Arc<Self>, value: &Value) {
        let message = match ServerMessage::parse(value) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("app: dropping control message: {err}");
                return;
            }
        };

        match message {
            ServerMessage::Tts(TtsEvent::Start) => self.schedule(|inner| {
                inner.abort.renew();
                if matches!(
                    inner.device_state(),
                    DeviceState::Idle | DeviceState::Listening
                ) {
                    inner.set_device_state(DeviceState::Speaking);
                }
            }),
            ServerMessage::Tts(TtsEvent::Stop) => self.schedule(|inner| inner.on_tts_stop()),
            ServerMessage::Tts(TtsEvent::SentenceStart { text: Some(text) }) => {
                log::info!("app: << {text}");
                self.ctx.display.set_chat_message("assistant", &text);
            }
            ServerMessage::Tts(TtsEvent::SentenceStart { text: None }) => {}
            ServerMessage::Tts(TtsEvent::Other(state)) => {
                log::debug!("app: ignoring tts state {state:?}");
            }
            ServerMessage::Stt { text: Some(text) } => {
                log::info!("app: >> {text}");
                self.ctx.display.set_chat_message("user", &text);
            }
            ServerMessage::Stt { text: None } => {}
            ServerMessage::Llm {
                emotion: Some(emotion),
            } => self.ctx.display.set_emotion(&emotion),
            ServerMessage::Llm { emotion: None } => {}
            ServerMessage::Iot { commands } => {
                for command in &commands {
                    self.ctx.things.invoke(command);
                }
            }
        }
    }

    fn on_tts_stop(&self) {
        if self.device_state() != DeviceState::Speaking {
            return;
        }
        // Let queued playback finish before switching.
        self.wait_background();

        if self.keep_listening.load(Ordering::Acquire) {
            if let Some(transport) = self.transport() {
                transport.send_start_listening(ListeningMode::AutoStop);
            }
            self.set_device_state(DeviceState::Listening);
        } else {
            self.set_device_state(DeviceState::Idle);
        }
    }
}
