//! Audio data handling shared by the capture and playback paths.
//!
//! ```text
//! capture:  codec input ─▶ deinterleave ─▶ Resampler ─▶ AudioEncoder ─▶ frames
//! playback: frames ─▶ AudioDecoder ─▶ Resampler ─▶ codec output
//! alerts:   bundled asset ─▶ Frames ─▶ decode queue
//! ```
//!
//! The orchestration of these steps lives in
//! [`crate::application`]; this module only holds the data transforms and
//! the codec seams.

pub mod asset;
pub mod codec;
pub mod resample;

pub use asset::{encode_frames, parse_frames, AlertSounds, AssetError, Frames};
pub use codec::{AudioDecoder, AudioEncoder, CodecError, CodecFactory};
pub use resample::{deinterleave, interleave, Resampler};
