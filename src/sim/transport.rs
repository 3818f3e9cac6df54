//! Loopback session transport that records what the device sends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use crate::protocol::{
    AbortReason, AudioCallback, ChannelCallback, ErrorCallback, JsonCallback, ListeningMode,
    SessionTransport,
};
use crate::scheduler::lock;

/// One outgoing call recorded by [`SimTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    OpenChannel,
    CloseChannel,
    StartListening(ListeningMode),
    StopListening,
    Audio(Vec<u8>),
    AbortSpeaking(AbortReason),
    WakeWordDetected(String),
    IotDescriptors(String),
    IotStates(String),
}

#[derive(Default)]
struct Callbacks {
    network_error: Option<ErrorCallback>,
    incoming_audio: Option<AudioCallback>,
    incoming_json: Option<JsonCallback>,
    channel_opened: Option<ChannelCallback>,
    channel_closed: Option<ChannelCallback>,
}

/// Transport whose channel opens (or fails to) on command and whose
/// incoming traffic is injected by the caller.
///
/// Opening and closing the channel fire the opened / closed callbacks
/// synchronously, like a transport that completes its handshake inline.
pub struct SimTransport {
    server_sample_rate: u32,
    open_succeeds: AtomicBool,
    opened: AtomicBool,
    sent: Mutex<Vec<Sent>>,
    callbacks: Mutex<Callbacks>,
}

impl SimTransport {
    pub fn new(server_sample_rate: u32) -> Self {
        Self {
            server_sample_rate,
            open_succeeds: AtomicBool::new(true),
            opened: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Callbacks::default()),
        }
    }

    /// Decide whether the next `open_audio_channel` calls succeed.
    pub fn set_open_succeeds(&self, succeeds: bool) {
        self.open_succeeds.store(succeeds, Ordering::Release);
    }

    /// Everything the device sent so far.
    pub fn sent(&self) -> Vec<Sent> {
        lock(&self.sent).clone()
    }

    /// Number of audio frames the device sent.
    pub fn audio_frames_sent(&self) -> usize {
        lock(&self.sent)
            .iter()
            .filter(|s| matches!(s, Sent::Audio(_)))
            .count()
    }

    pub fn deliver_json(&self, message: &Value) {
        if let Some(callback) = lock(&self.callbacks).incoming_json.as_ref() {
            callback(message);
        }
    }

    pub fn deliver_audio(&self, frame: Vec<u8>) {
        if let Some(callback) = lock(&self.callbacks).incoming_audio.as_ref() {
            callback(frame);
        }
    }

    pub fn raise_network_error(&self, message: &str) {
        if let Some(callback) = lock(&self.callbacks).network_error.as_ref() {
            callback(message);
        }
    }

    /// Close the channel from the remote side.
    pub fn remote_close(&self) {
        self.opened.store(false, Ordering::Release);
        self.fire_closed();
    }

    fn record(&self, sent: Sent) {
        lock(&self.sent).push(sent);
    }

    fn fire_closed(&self) {
        if let Some(callback) = lock(&self.callbacks).channel_closed.as_ref() {
            callback();
        }
    }
}

impl SessionTransport for SimTransport {
    fn open_audio_channel(&self) -> bool {
        self.record(Sent::OpenChannel);
        if !self.open_succeeds.load(Ordering::Acquire) {
            return false;
        }
        self.opened.store(true, Ordering::Release);
        if let Some(callback) = lock(&self.callbacks).channel_opened.as_ref() {
            callback();
        }
        true
    }

    fn close_audio_channel(&self) {
        self.record(Sent::CloseChannel);
        self.opened.store(false, Ordering::Release);
        self.fire_closed();
    }

    fn is_audio_channel_opened(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    fn send_start_listening(&self, mode: ListeningMode) {
        self.record(Sent::StartListening(mode));
    }

    fn send_stop_listening(&self) {
        self.record(Sent::StopListening);
    }

    fn send_audio(&self, frame: &[u8]) {
        self.record(Sent::Audio(frame.to_vec()));
    }

    fn send_abort_speaking(&self, reason: AbortReason) {
        self.record(Sent::AbortSpeaking(reason));
    }

    fn send_wake_word_detected(&self, wake_word: &str) {
        self.record(Sent::WakeWordDetected(wake_word.to_string()));
    }

    fn send_iot_descriptors(&self, descriptors: &str) {
        self.record(Sent::IotDescriptors(descriptors.to_string()));
    }

    fn send_iot_states(&self, states: &str) {
        self.record(Sent::IotStates(states.to_string()));
    }

    fn server_sample_rate(&self) -> u32 {
        self.server_sample_rate
    }

    fn on_network_error(&self, callback: ErrorCallback) {
        lock(&self.callbacks).network_error = Some(callback);
    }

    fn on_incoming_audio(&self, callback: AudioCallback) {
        lock(&self.callbacks).incoming_audio = Some(callback);
    }

    fn on_incoming_json(&self, callback: JsonCallback) {
        lock(&self.callbacks).incoming_json = Some(callback);
    }

    fn on_audio_channel_opened(&self, callback: ChannelCallback) {
        lock(&self.callbacks).channel_opened = Some(callback);
    }

    fn on_audio_channel_closed(&self, callback: ChannelCallback) {
        lock(&self.callbacks).channel_closed = Some(callback);
    }
}
