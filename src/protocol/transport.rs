//! Session transport seam.
//!
//! A [`SessionTransport`] carries one conversation with the remote voice
//! service: an audio channel (binary frames in both directions) plus JSON
//! control messages.  Callbacks are invoked on the transport's own threads;
//! the orchestrator re-posts anything stateful onto its main scheduler.

use serde_json::Value;

/// Fired on connection or send failures with a human readable message.
pub type ErrorCallback = Box<dyn Fn(&str) + Send + Sync + 'static>;
/// Fired for each incoming encoded audio frame.
pub type AudioCallback = Box<dyn Fn(Vec<u8>) + Send + Sync + 'static>;
/// Fired for each incoming JSON control message.
pub type JsonCallback = Box<dyn Fn(&Value) + Send + Sync + 'static>;
/// Fired when the audio channel opens or closes.
pub type ChannelCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// How the remote session ends a listening turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListeningMode {
    /// Remote voice-activity detection ends the turn.
    AutoStop,
    /// The device ends the turn with an explicit stop.
    ManualStop,
}

impl ListeningMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ListeningMode::AutoStop => "auto",
            ListeningMode::ManualStop => "manual",
        }
    }
}

/// Why the device interrupted remote speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AbortReason {
    #[default]
    None,
    WakeWordDetected,
}

impl AbortReason {
    /// Wire value, `None` for [`AbortReason::None`].
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            AbortReason::None => None,
            AbortReason::WakeWordDetected => Some("wake_word_detected"),
        }
    }
}

/// Connection to the remote voice service.
pub trait SessionTransport: Send + Sync {
    /// Open the audio channel, blocking until it is open or has failed.
    fn open_audio_channel(&self) -> bool;

    fn close_audio_channel(&self);

    fn is_audio_channel_opened(&self) -> bool;

    fn send_start_listening(&self, mode: ListeningMode);

    fn send_stop_listening(&self);

    fn send_audio(&self, frame: &[u8]);

    fn send_abort_speaking(&self, reason: AbortReason);

    fn send_wake_word_detected(&self, wake_word: &str);

    fn send_iot_descriptors(&self, descriptors: &str);

    fn send_iot_states(&self, states: &str);

    /// Sample rate of the audio the server sends.
    fn server_sample_rate(&self) -> u32;

    fn on_network_error(&self, callback: ErrorCallback);

    fn on_incoming_audio(&self, callback: AudioCallback);

    fn on_incoming_json(&self, callback: JsonCallback);

    fn on_audio_channel_opened(&self, callback: ChannelCallback);

    fn on_audio_channel_closed(&self, callback: ChannelCallback);
}
