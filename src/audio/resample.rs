//! Sample-rate conversion and channel (de)interleaving for `i16` PCM.
//!
//! Captured audio is converted to the encode rate before it reaches the
//! encoder or the wake-word engine, and decoded audio is converted to the
//! codec output rate before playback.  Both directions use the same
//! [`Resampler`].
//!
//! The resampler uses linear interpolation over a continuous stream: the
//! last sample of each buffer is kept and interpolated against the first
//! sample of the next, so buffer edges carry no discontinuity.  This costs
//! one input sample of latency.  Output length for a buffer of `n` samples
//! is exactly [`Resampler::output_samples`]`(n)`, so fixed-size codec frames
//! map to fixed-size frames on the other side.

// ---------------------------------------------------------------------------
// Resampler
// ---------------------------------------------------------------------------

/// Converts a mono `i16` stream from one sample rate to another, one buffer
/// at a time.
///
/// ```rust
/// use voice_device_core::audio::Resampler;
///
/// // 10 ms @ 48 kHz → 10 ms @ 16 kHz
/// let mut down = Resampler::new(48_000, 16_000);
/// assert_eq!(down.process(&[0_i16; 480]).len(), 160);
///
/// // Equal rates are a plain copy
/// let same = Resampler::new(16_000, 16_000);
/// assert!(same.is_passthrough());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resampler {
    input_rate: u32,
    output_rate: u32,
    /// Last input sample of the previous buffer.
    history: Option<i16>,
}

impl Resampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        Self {
            input_rate,
            output_rate,
            history: None,
        }
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// `true` when the rates match (or either is zero) and
    /// [`process`](Self::process) only copies.
    pub fn is_passthrough(&self) -> bool {
        self.input_rate == self.output_rate || self.input_rate == 0 || self.output_rate == 0
    }

    /// Number of samples [`process`](Self::process) yields for `input_len`
    /// input samples.
    pub fn output_samples(&self, input_len: usize) -> usize {
        if self.is_passthrough() {
            return input_len;
        }
        (input_len as u64 * u64::from(self.output_rate) / u64::from(self.input_rate)) as usize
    }

    /// Resample the next buffer of the stream.
    ///
    /// Position 0 is the last sample of the previous buffer (the first
    /// sample of `input` when there is none), so every output sample lies
    /// between two known input samples.
    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        if self.is_passthrough() || input.is_empty() {
            return input.to_vec();
        }

        let first = self.history.unwrap_or(input[0]);
        let sample_at = |idx: usize| if idx == 0 { first } else { input[idx - 1] };

        let output_len = self.output_samples(input.len());
        let step = f64::from(self.input_rate) / f64::from(self.output_rate);
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len {
            let src_pos = i as f64 * step;
            let idx = (src_pos as usize).min(input.len() - 1);
            let frac = src_pos - idx as f64;

            let a = f64::from(sample_at(idx));
            let b = f64::from(sample_at(idx + 1));
            let sample = a * (1.0 - frac) + b * frac;

            output.push(sample.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16);
        }

        self.history = input.last().copied();
        output
    }

    /// Forget the previous buffer; the next one starts a new stream.
    pub fn reset(&mut self) {
        self.history = None;
    }
}

// ---------------------------------------------------------------------------
// Channel helpers
// ---------------------------------------------------------------------------

/// Split a two-channel interleaved buffer `[m0, r0, m1, r1, ...]` into the
/// microphone and reference channels.  A trailing odd sample is dropped.
pub fn deinterleave(samples: &[i16]) -> (Vec<i16>, Vec<i16>) {
    samples
        .chunks_exact(2)
        .map(|frame| (frame[0], frame[1]))
        .unzip()
}

/// Inverse of [`deinterleave`].  The longer channel is truncated to the
/// shorter one.
pub fn interleave(mic: &[i16], reference: &[i16]) -> Vec<i16> {
    mic.iter()
        .zip(reference)
        .flat_map(|(&m, &r)| [m, r])
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
