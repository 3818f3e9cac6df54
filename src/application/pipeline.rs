//! Capture and playback paths.
//!
//! Both run on the main loop and hand the codec work to the background
//! queue:
//!
//! * input ready: read, resample to the encode rate, then feed voice
//!   analysis or (while listening) encode in the background and post each
//!   frame back to the main loop for sending.
//! * output ready: pop one frame and decode, resample and play it in the
//!   background, unless the utterance was aborted meanwhile.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::audio::{deinterleave, interleave, parse_frames, AudioDecoder, CodecError, Resampler};
use crate::board::AudioCodec;
use crate::device::DeviceState;
use crate::scheduler::{lock, CancellationFlag};

use super::Inner;

/// Rate of the bundled alert sounds.
const ALERT_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// Stage state
// ---------------------------------------------------------------------------

/// Encoded frames waiting for playback and codec output power bookkeeping.
pub(super) struct Playback {
    pub(super) queue: VecDeque<Vec<u8>>,
    pub(super) last_output_time: Instant,
    pub(super) output_enabled: bool,
}

impl Playback {
    pub(super) fn new(now: Instant) -> Self {
        Self {
            queue: VecDeque::new(),
            last_output_time: now,
            output_enabled: false,
        }
    }
}

/// The decoder and the resampler from its rate to the codec output rate.
#[derive(Default)]
pub(super) struct DecodeStage {
    decoder: Option<Box<dyn AudioDecoder>>,
    sample_rate: u32,
    resampler: Option<Resampler>,
}

/// Converts captured buffers to the encode rate.
#[derive(Debug, Default)]
pub(super) struct CaptureStage {
    /// `None` when the codec already captures at the encode rate.
    resampler: Option<Resampler>,
    /// Second channel of stereo input.
    reference_resampler: Option<Resampler>,
    channels: u16,
}

impl CaptureStage {
    fn new(input_rate: u32, encode_rate: u32, channels: u16) -> Self {
        let resampler = Resampler::new(input_rate, encode_rate);
        let resampler = (!resampler.is_passthrough()).then_some(resampler);
        Self {
            reference_resampler: resampler.clone().filter(|_| channels == 2),
            resampler,
            channels,
        }
    }

    /// Stereo buffers carry the playback reference in the second channel;
    /// each channel is resampled as its own stream.
    fn process(&mut self, pcm: Vec<i16>) -> Vec<i16> {
        let Some(resampler) = self.resampler.as_mut() else {
            return pcm;
        };
        match self.reference_resampler.as_mut() {
            Some(reference_resampler) => {
                let (mic, reference) = deinterleave(&pcm);
                interleave(
                    &resampler.process(&mic),
                    &reference_resampler.process(&reference),
                )
            }
            None => resampler.process(&pcm),
        }
    }
}

/// Decode one frame and play it unless `cancel` is raised first.
fn play_frame(
    frame: &[u8],
    cancel: &CancellationFlag,
    decode: &Mutex<DecodeStage>,
    codec: &dyn AudioCodec,
) {
    if cancel.is_cancelled() {
        return;
    }

    let pcm = {
        let mut guard = lock(decode);
        let stage = &mut *guard;
        let Some(decoder) = stage.decoder.as_mut() else {
            return;
        };
        match decoder.decode(frame) {
            Ok(pcm) => match stage.resampler.as_mut() {
                Some(resampler) => resampler.process(&pcm),
                None => pcm,
            },
            Err(err) => {
                log::warn!("app: dropping undecodable frame: {err}");
                return;
            }
        }
    };

    if cancel.is_cancelled() {
        return;
    }
    codec.output_data(&pcm);
}

// ---------------------------------------------------------------------------
// Pipeline operations
// ---------------------------------------------------------------------------

impl Inner {
    /// Build the encoder and the output-rate decoder, and configure input
    /// resampling.  Runs once during start, before any audio flows.
    pub(super) fn setup_codecs(&self) -> Result<(), CodecError> {
        let codec = &self.ctx.codec;
        let audio = &self.config.audio;

        let encoder =
            self.ctx
                .codecs
                .create_encoder(audio.encode_sample_rate, 1, audio.frame_duration_ms)?;
        *lock(&self.encoder) = Some(encoder);

        self.install_decoder(codec.output_sample_rate())?;

        let capture = CaptureStage::new(
            codec.input_sample_rate(),
            audio.encode_sample_rate,
            codec.input_channels(),
        );
        if let Some(resampler) = &capture.resampler {
            log::info!(
                "app: resampling capture {} Hz -> {} Hz",
                resampler.input_rate(),
                resampler.output_rate()
            );
        }
        *lock(&self.capture) = capture;
        Ok(())
    }

    fn install_decoder(&self, sample_rate: u32) -> Result<(), CodecError> {
        let decoder = self.ctx.codecs.create_decoder(sample_rate, 1)?;
        let resampler = Resampler::new(sample_rate, self.ctx.codec.output_sample_rate());

        let mut stage = lock(&self.decode);
        stage.decoder = Some(decoder);
        stage.sample_rate = sample_rate;
        stage.resampler = (!resampler.is_passthrough()).then_some(resampler);
        if let Some(resampler) = &stage.resampler {
            log::info!(
                "app: resampling playback {} Hz -> {} Hz",
                resampler.input_rate(),
                resampler.output_rate()
            );
        }
        Ok(())
    }

    /// Rebuild the decoder for `sample_rate`.  No-op when unchanged.
    ///
    /// In-flight playback tasks finish with the old decoder before it is
    /// replaced.  On failure the old decoder stays in place.
    pub(super) fn set_decode_sample_rate(&self, sample_rate: u32) {
        if lock(&self.decode).sample_rate == sample_rate {
            return;
        }

        self.wait_background();
        match self.install_decoder(sample_rate) {
            Ok(()) => log::info!("app: decoder rebuilt at {sample_rate} Hz"),
            Err(err) => log::error!("app: cannot rebuild decoder at {sample_rate} Hz: {err}"),
        }
    }

    pub(super) fn mark_output_enabled(&self) {
        let mut playback = lock(&self.playback);
        playback.output_enabled = true;
        playback.last_output_time = self.ctx.clock.now();
    }

    /// Clear the decode queue, reset the decoder and power the output up.
    pub(super) fn reset_decoder(&self) {
        {
            let mut playback = lock(&self.playback);
            {
                let mut guard = lock(&self.decode);
                let stage = &mut *guard;
                if let Some(decoder) = stage.decoder.as_mut() {
                    decoder.reset_state();
                }
                if let Some(resampler) = stage.resampler.as_mut() {
                    resampler.reset();
                }
            }
            playback.queue.clear();
            playback.last_output_time = self.ctx.clock.now();
            playback.output_enabled = true;
        }
        // A new utterance starts; an abort of the previous one no longer applies.
        self.abort.renew();
        self.ctx.codec.enable_output(true);
    }

    // ---- capture ---------------------------------------------------------------

    pub(super) fn input_audio(self: &Arc<Self>) {
        let Some(pcm) = self.ctx.codec.input_data() else {
            return;
        };
        let pcm = lock(&self.capture).process(pcm);

        if self.ctx.has_voice_analysis() {
            if let Some(processor) = &self.ctx.audio_processor {
                if processor.is_running() {
                    processor.input(&pcm);
                }
            }
            if let Some(detector) = &self.ctx.wake_word {
                if detector.is_detection_running() {
                    detector.feed(&pcm);
                }
            }
            return;
        }

        if self.device_state() == DeviceState::Listening {
            self.encode_and_send(pcm);
        }
    }

    /// Encode `pcm` in the background; every finished frame is sent from
    /// the main loop.
    pub(super) fn encode_and_send(self: &Arc<Self>, pcm: Vec<i16>) {
        let encoder = Arc::clone(&self.encoder);
        let weak = Arc::downgrade(self);
        self.offload(move || {
            let mut guard = lock(&encoder);
            let Some(encoder) = guard.as_mut() else {
                return;
            };
            let result = encoder.encode(&pcm, &mut |frame| {
                if let Some(inner) = weak.upgrade() {
                    inner.schedule(move |inner| {
                        if let Some(transport) = inner.transport() {
                            transport.send_audio(&frame);
                        }
                    });
                }
            });
            if let Err(err) = result {
                log::warn!("app: encode failed: {err}");
            }
        });
    }

    // ---- playback --------------------------------------------------------------

    pub(super) fn output_audio(&self) {
        let now = self.ctx.clock.now();
        let state = self.device_state();

        let (frame, power_up) = {
            let mut playback = lock(&self.playback);

            if playback.queue.is_empty() {
                let silent_for = now.saturating_duration_since(playback.last_output_time);
                let timeout = self.config.audio.output_silence_timeout();
                if state == DeviceState::Idle && playback.output_enabled && silent_for > timeout {
                    playback.output_enabled = false;
                    drop(playback);
                    log::info!("app: output silent for {silent_for:?}, powering down");
                    self.ctx.codec.enable_output(false);
                }
                return;
            }

            if state == DeviceState::Listening {
                playback.queue.clear();
                return;
            }

            let Some(frame) = playback.queue.pop_front() else {
                return;
            };
            playback.last_output_time = now;
            let power_up = !playback.output_enabled;
            playback.output_enabled = true;
            (frame, power_up)
        };

        if power_up {
            self.ctx.codec.enable_output(true);
        }

        let cancel = self.abort.token();
        let decode = Arc::clone(&self.decode);
        let codec = Arc::clone(&self.ctx.codec);
        self.offload(move || play_frame(&frame, &cancel, &decode, codec.as_ref()));
    }

    /// Incoming audio from the session.  Only kept while speaking.
    pub(super) fn queue_incoming_audio(&self, frame: Vec<u8>) {
        let mut playback = lock(&self.playback);
        if self.device_state() == DeviceState::Speaking {
            playback.queue.push_back(frame);
        }
    }

    /// Queue every frame of a bundled sound asset.  Nothing is queued when
    /// the asset is malformed.
    pub(super) fn play_local_file(&self, asset: &[u8]) {
        log::info!("app: playing local sound, {} bytes", asset.len());
        let frames = match parse_frames(asset) {
            Ok(frames) => frames,
            Err(err) => {
                log::warn!("app: bad sound asset: {err}");
                return;
            }
        };

        self.set_decode_sample_rate(ALERT_SAMPLE_RATE);
        self.abort.renew();
        lock(&self.playback).queue.extend(frames);
    }
}
