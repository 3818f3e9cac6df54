//! On-device voice analysis seams: echo cancellation / audio processing and
//! wake-word detection.
//!
//! Both consume PCM at the encode rate pushed from the main loop and report
//! back through callbacks fired on their own threads.

/// Callback receiving processed PCM ready for encoding.
pub type PcmCallback = Box<dyn Fn(Vec<i16>) + Send + Sync + 'static>;
/// Callback receiving voice-activity edges (`true` = speech started).
pub type VadCallback = Box<dyn Fn(bool) + Send + Sync + 'static>;
/// Callback receiving the detected wake word.
pub type WakeWordCallback = Box<dyn Fn(&str) + Send + Sync + 'static>;

/// Acoustic echo cancellation and noise suppression in front of the encoder.
pub trait AudioProcessor: Send + Sync {
    fn start(&self);

    fn stop(&self);

    fn is_running(&self) -> bool;

    /// Feed captured PCM (interleaved with the reference channel when the
    /// codec provides one).
    fn input(&self, pcm: &[i16]);

    fn on_output(&self, callback: PcmCallback);
}

/// Wake-word engine with its own voice-activity detector.
pub trait WakeWordDetector: Send + Sync {
    fn start_detection(&self);

    fn stop_detection(&self);

    fn is_detection_running(&self) -> bool;

    fn feed(&self, pcm: &[i16]);

    fn on_vad_state_change(&self, callback: VadCallback);

    fn on_wake_word_detected(&self, callback: WakeWordCallback);

    /// Encode the audio buffered around the last detection.
    fn encode_wake_word_data(&self);

    /// Next encoded frame from [`encode_wake_word_data`](Self::encode_wake_word_data),
    /// `None` when drained.
    fn take_wake_word_frame(&self) -> Option<Vec<u8>>;
}
