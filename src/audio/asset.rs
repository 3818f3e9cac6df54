//! Bundled alert sounds.
//!
//! Sound assets are a sequence of length-prefixed encoded frames:
//!
//! ```text
//! ┌──────────────┬───────────────────────┬──────────────┬─────
//! │ len: u16 BE  │ payload (len bytes)   │ len: u16 BE  │ ...
//! └──────────────┴───────────────────────┴──────────────┴─────
//! ```
//!
//! Each payload is one frame for the decoder.  [`Frames`] walks an asset
//! without copying; [`AlertSounds`] maps alert messages to their asset.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

const HEADER_LEN: usize = 2;

/// Errors produced while walking a sound asset.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("truncated frame header at byte {offset}")]
    TruncatedHeader { offset: usize },

    #[error("frame at byte {offset} declares {declared} bytes but only {available} remain")]
    TruncatedPayload {
        offset: usize,
        declared: usize,
        available: usize,
    },
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Iterator over the frames of an asset.  Yields one error and then stops
/// when the data is truncated.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Frames<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<&'a [u8], AssetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        let offset = self.offset;
        let rest = &self.data[offset..];
        let Some(header) = rest.get(..HEADER_LEN) else {
            self.failed = true;
            return Some(Err(AssetError::TruncatedHeader { offset }));
        };

        let declared = usize::from(u16::from_be_bytes([header[0], header[1]]));
        let body = &rest[HEADER_LEN..];
        let Some(payload) = body.get(..declared) else {
            self.failed = true;
            return Some(Err(AssetError::TruncatedPayload {
                offset,
                declared,
                available: body.len(),
            }));
        };

        self.offset += HEADER_LEN + declared;
        Some(Ok(payload))
    }
}

/// Split an asset into owned frames.  Nothing is returned unless the whole
/// asset is well formed.
///
/// ```rust
/// use voice_device_core::audio::parse_frames;
///
/// let asset = [0, 3, 1, 2, 3, 0, 0];
/// let frames = parse_frames(&asset).unwrap();
/// assert_eq!(frames, vec![vec![1, 2, 3], vec![]]);
/// ```
pub fn parse_frames(data: &[u8]) -> Result<Vec<Vec<u8>>, AssetError> {
    Frames::new(data)
        .map(|frame| frame.map(<[u8]>::to_vec))
        .collect()
}

/// Build an asset from frames.  Frames longer than `u16::MAX` are cut.
pub fn encode_frames<'a, I>(frames: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut out = Vec::new();
    for frame in frames {
        let frame = &frame[..frame.len().min(usize::from(u16::MAX))];
        out.extend_from_slice(&(frame.len() as u16).to_be_bytes());
        out.extend_from_slice(frame);
    }
    out
}

// ---------------------------------------------------------------------------
// AlertSounds
// ---------------------------------------------------------------------------

/// Alert message → sound asset.
#[derive(Debug, Clone, Default)]
pub struct AlertSounds {
    sounds: HashMap<String, Arc<[u8]>>,
}

impl AlertSounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `asset` as the sound for alerts whose message is `message`.
    pub fn with_sound(mut self, message: impl Into<String>, asset: impl Into<Arc<[u8]>>) -> Self {
        self.insert(message, asset);
        self
    }

    pub fn insert(&mut self, message: impl Into<String>, asset: impl Into<Arc<[u8]>>) {
        self.sounds.insert(message.into(), asset.into());
    }

    pub fn get(&self, message: &str) -> Option<Arc<[u8]>> {
        self.sounds.get(message).cloned()
    }
}
