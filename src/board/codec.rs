//! Audio codec hardware seam.
//!
//! The codec owns the microphone and the speaker.  It raises "input ready"
//! when a captured buffer can be read and "output ready" when it can take
//! another playback buffer.  Both callbacks may fire from interrupt-like
//! contexts, so the orchestrator only sets an event bit inside them.

/// Callback fired by the codec when a buffer is ready.
pub type ReadyCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Microphone and speaker hardware.
pub trait AudioCodec: Send + Sync {
    /// Rate of captured PCM.
    fn input_sample_rate(&self) -> u32;

    /// Rate the speaker expects.
    fn output_sample_rate(&self) -> u32;

    /// 1 for microphone only, 2 when a playback reference channel is
    /// interleaved with the microphone.
    fn input_channels(&self) -> u16;

    /// Read one captured buffer, interleaved when
    /// [`input_channels`](Self::input_channels) is 2.  `None` when nothing is
    /// available.
    fn input_data(&self) -> Option<Vec<i16>>;

    /// Play one buffer at [`output_sample_rate`](Self::output_sample_rate).
    fn output_data(&self, pcm: &[i16]);

    /// Power the speaker path up or down.
    fn enable_output(&self, enable: bool);

    fn on_input_ready(&self, callback: ReadyCallback);

    fn on_output_ready(&self, callback: ReadyCallback);

    /// Begin capture and playback.
    fn start(&self);
}
