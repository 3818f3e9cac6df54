//! Wake-word engine and audio processor driven by the caller.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::scheduler::lock;
use crate::voice::{AudioProcessor, PcmCallback, VadCallback, WakeWordCallback, WakeWordDetector};

/// Wake-word engine whose detections are triggered by the caller.
pub struct SimWakeWord {
    running: AtomicBool,
    starts: AtomicUsize,
    fed: AtomicUsize,
    buffered: Vec<Vec<u8>>,
    encoded: Mutex<VecDeque<Vec<u8>>>,
    vad: Mutex<Option<VadCallback>>,
    detected: Mutex<Option<WakeWordCallback>>,
}

impl SimWakeWord {
    /// `buffered` frames are replayed after each detection.
    pub fn new(buffered: Vec<Vec<u8>>) -> Self {
        Self {
            running: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            fed: AtomicUsize::new(0),
            buffered,
            encoded: Mutex::new(VecDeque::new()),
            vad: Mutex::new(None),
            detected: Mutex::new(None),
        }
    }

    /// Simulate hearing `word`.  Detection stops until restarted.
    pub fn trigger(&self, word: &str) {
        self.running.store(false, Ordering::Release);
        if let Some(callback) = lock(&self.detected).as_ref() {
            callback(word);
        }
    }

    pub fn set_voice_activity(&self, speaking: bool) {
        if let Some(callback) = lock(&self.vad).as_ref() {
            callback(speaking);
        }
    }

    /// Buffers fed while detection was running.
    pub fn fed(&self) -> usize {
        self.fed.load(Ordering::Acquire)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Acquire)
    }
}

impl WakeWordDetector for SimWakeWord {
    fn start_detection(&self) {
        self.starts.fetch_add(1, Ordering::AcqRel);
        self.running.store(true, Ordering::Release);
    }

    fn stop_detection(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn is_detection_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn feed(&self, _pcm: &[i16]) {
        self.fed.fetch_add(1, Ordering::AcqRel);
    }

    fn on_vad_state_change(&self, callback: VadCallback) {
        *lock(&self.vad) = Some(callback);
    }

    fn on_wake_word_detected(&self, callback: WakeWordCallback) {
        *lock(&self.detected) = Some(callback);
    }

    fn encode_wake_word_data(&self) {
        *lock(&self.encoded) = self.buffered.iter().cloned().collect();
    }

    fn take_wake_word_frame(&self) -> Option<Vec<u8>> {
        lock(&self.encoded).pop_front()
    }
}

/// Audio processor that passes its input straight to its output while
/// running.
#[derive(Default)]
pub struct PassthroughProcessor {
    running: AtomicBool,
    output: Mutex<Option<PcmCallback>>,
}

impl PassthroughProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioProcessor for PassthroughProcessor {
    fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn input(&self, pcm: &[i16]) {
        if let Some(callback) = lock(&self.output).as_ref() {
            callback(pcm.to_vec());
        }
    }

    fn on_output(&self, callback: PcmCallback) {
        *lock(&self.output) = Some(callback);
    }
}
