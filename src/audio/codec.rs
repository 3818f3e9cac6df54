//! Frame encoder / decoder seams.
//!
//! The real device links an Opus implementation; host builds and tests plug
//! in their own through [`CodecFactory`].  Encoders and decoders are owned by
//! the orchestrator and only ever touched from the background queue, so they
//! are `Send` but need not be `Sync`.

use thiserror::Error;

/// Errors produced by frame codecs.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported codec parameters: {sample_rate} Hz, {channels} channel(s)")]
    Unsupported { sample_rate: u32, channels: u16 },

    #[error("failed to create codec: {0}")]
    Create(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

/// PCM → encoded frames.
pub trait AudioEncoder: Send {
    /// Feed PCM.  `emit` is called once per complete encoded frame; partial
    /// frames are buffered until more PCM arrives.
    fn encode(&mut self, pcm: &[i16], emit: &mut dyn FnMut(Vec<u8>)) -> Result<(), CodecError>;

    /// Drop buffered PCM and internal predictor state.
    fn reset_state(&mut self);
}

/// Encoded frame → PCM.
pub trait AudioDecoder: Send {
    fn decode(&mut self, frame: &[u8]) -> Result<Vec<i16>, CodecError>;

    fn reset_state(&mut self);

    /// Rate of the PCM this decoder produces.
    fn sample_rate(&self) -> u32;
}

/// Builds encoders and decoders for given parameters.
pub trait CodecFactory: Send + Sync {
    fn create_encoder(
        &self,
        sample_rate: u32,
        channels: u16,
        frame_duration_ms: u32,
    ) -> Result<Box<dyn AudioEncoder>, CodecError>;

    fn create_decoder(
        &self,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Box<dyn AudioDecoder>, CodecError>;
}
