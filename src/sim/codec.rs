//! Simulated codec hardware and a PCM passthrough frame codec.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::audio::{AudioDecoder, AudioEncoder, CodecError, CodecFactory};
use crate::board::{AudioCodec, ReadyCallback};
use crate::scheduler::lock;

// ---------------------------------------------------------------------------
// SimCodec
// ---------------------------------------------------------------------------

/// Codec whose input is fed by the caller and whose output is recorded.
///
/// The ready callbacks only fire when the caller says so, which lets tests
/// step the audio pipeline one signal at a time.
pub struct SimCodec {
    input_rate: u32,
    output_rate: u32,
    channels: u16,
    captured: Mutex<VecDeque<Vec<i16>>>,
    played: Mutex<Vec<Vec<i16>>>,
    enable_calls: Mutex<Vec<bool>>,
    input_ready: Mutex<Option<ReadyCallback>>,
    output_ready: Mutex<Option<ReadyCallback>>,
    started: AtomicBool,
}

impl SimCodec {
    pub fn new(input_rate: u32, output_rate: u32, channels: u16) -> Self {
        Self {
            input_rate,
            output_rate,
            channels,
            captured: Mutex::new(VecDeque::new()),
            played: Mutex::new(Vec::new()),
            enable_calls: Mutex::new(Vec::new()),
            input_ready: Mutex::new(None),
            output_ready: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Queue a captured buffer for the next `input_data` call.
    pub fn push_input(&self, pcm: Vec<i16>) {
        lock(&self.captured).push_back(pcm);
    }

    pub fn fire_input_ready(&self) {
        if let Some(callback) = lock(&self.input_ready).as_ref() {
            callback();
        }
    }

    pub fn fire_output_ready(&self) {
        if let Some(callback) = lock(&self.output_ready).as_ref() {
            callback();
        }
    }

    /// Buffers written with `output_data`, oldest first.
    pub fn played(&self) -> Vec<Vec<i16>> {
        lock(&self.played).clone()
    }

    /// Arguments of every `enable_output` call, in order.
    pub fn enable_output_calls(&self) -> Vec<bool> {
        lock(&self.enable_calls).clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

impl AudioCodec for SimCodec {
    fn input_sample_rate(&self) -> u32 {
        self.input_rate
    }

    fn output_sample_rate(&self) -> u32 {
        self.output_rate
    }

    fn input_channels(&self) -> u16 {
        self.channels
    }

    fn input_data(&self) -> Option<Vec<i16>> {
        lock(&self.captured).pop_front()
    }

    fn output_data(&self, pcm: &[i16]) {
        lock(&self.played).push(pcm.to_vec());
    }

    fn enable_output(&self, enable: bool) {
        lock(&self.enable_calls).push(enable);
    }

    fn on_input_ready(&self, callback: ReadyCallback) {
        *lock(&self.input_ready) = Some(callback);
    }

    fn on_output_ready(&self, callback: ReadyCallback) {
        *lock(&self.output_ready) = Some(callback);
    }

    fn start(&self) {
        self.started.store(true, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// PcmCodecFactory
// ---------------------------------------------------------------------------

/// Frame codec that stores PCM as little-endian bytes.
///
/// The encoder emits one frame per `frame_duration_ms` of input, so frame
/// boundaries behave like a real codec's.
#[derive(Default)]
pub struct PcmCodecFactory {
    fail: AtomicBool,
    decoder_rates: Mutex<Vec<u32>>,
}

impl PcmCodecFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent create call fail.
    pub fn fail_creation(&self, fail: bool) {
        self.fail.store(fail, Ordering::Release);
    }

    /// Sample rates of every decoder created so far.
    pub fn decoder_rates(&self) -> Vec<u32> {
        lock(&self.decoder_rates).clone()
    }

    fn check(&self) -> Result<(), CodecError> {
        if self.fail.load(Ordering::Acquire) {
            return Err(CodecError::Create("simulated codec failure".into()));
        }
        Ok(())
    }
}

impl CodecFactory for PcmCodecFactory {
    fn create_encoder(
        &self,
        sample_rate: u32,
        channels: u16,
        frame_duration_ms: u32,
    ) -> Result<Box<dyn AudioEncoder>, CodecError> {
        self.check()?;
        if sample_rate == 0 || channels == 0 {
            return Err(CodecError::Unsupported {
                sample_rate,
                channels,
            });
        }
        let frame_samples =
            (sample_rate as usize * frame_duration_ms as usize / 1000) * channels as usize;
        Ok(Box::new(PcmEncoder {
            frame_samples: frame_samples.max(1),
            pending: Vec::new(),
        }))
    }

    fn create_decoder(
        &self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Box<dyn AudioDecoder>, CodecError> {
        self.check()?;
        if sample_rate == 0 || channels == 0 {
            return Err(CodecError::Unsupported {
                sample_rate,
                channels,
            });
        }
        lock(&self.decoder_rates).push(sample_rate);
        Ok(Box::new(PcmDecoder { sample_rate }))
    }
}

struct PcmEncoder {
    frame_samples: usize,
    pending: Vec<i16>,
}

impl AudioEncoder for PcmEncoder {
    fn encode(&mut self, pcm: &[i16], emit: &mut dyn FnMut(Vec<u8>)) -> Result<(), CodecError> {
        self.pending.extend_from_slice(pcm);
        while self.pending.len() >= self.frame_samples {
            let frame: Vec<u8> = self
                .pending
                .drain(..self.frame_samples)
                .flat_map(i16::to_le_bytes)
                .collect();
            emit(frame);
        }
        Ok(())
    }

    fn reset_state(&mut self) {
        self.pending.clear();
    }
}

struct PcmDecoder {
    sample_rate: u32,
}

impl AudioDecoder for PcmDecoder {
    fn decode(&mut self, frame: &[u8]) -> Result<Vec<i16>, CodecError> {
        if frame.len() % 2 != 0 {
            return Err(CodecError::Decode(format!(
                "odd frame length {}",
                frame.len()
            )));
        }
        Ok(frame
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect())
    }

    fn reset_state(&mut self) {}

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Encode PCM the way [`PcmCodecFactory`] frames it.
pub fn pcm_frame(samples: &[i16]) -> Vec<u8> {
    samples.iter().copied().flat_map(i16::to_le_bytes).collect()
}
