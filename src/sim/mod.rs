//! Simulated collaborators for host runs and tests.
//!
//! Every fake records what the core asked of it and lets the caller inject
//! hardware and network events: codec ready signals, incoming JSON and
//! audio, wake-word detections, channel failures.  [`SimDevice`] bundles one
//! of each into a ready [`DeviceContext`].

pub mod board;
pub mod codec;
pub mod ota;
pub mod things;
pub mod transport;
pub mod voice;

use std::sync::Arc;
use std::time::Duration;

use crate::application::DeviceContext;
use crate::config::DeviceConfig;

pub use board::{ManualClock, RecordingDisplay, RecordingLed, Shown, SimBoard};
pub use codec::{pcm_frame, PcmCodecFactory, SimCodec};
pub use ota::ScriptedOta;
pub use things::StaticThings;
pub use transport::{Sent, SimTransport};
pub use voice::{PassthroughProcessor, SimWakeWord};

/// One of every simulated collaborator.
pub struct SimDevice {
    pub codec: Arc<SimCodec>,
    pub codecs: Arc<PcmCodecFactory>,
    pub display: Arc<RecordingDisplay>,
    pub led: Arc<RecordingLed>,
    pub board: Arc<SimBoard>,
    pub things: Arc<StaticThings>,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<SimTransport>,
}

impl SimDevice {
    /// Mono 16 kHz codec talking to a 16 kHz server.
    pub fn new() -> Self {
        Self::with_codec(SimCodec::new(16_000, 16_000, 1), 16_000)
    }

    pub fn with_codec(codec: SimCodec, server_sample_rate: u32) -> Self {
        Self {
            codec: Arc::new(codec),
            codecs: Arc::new(PcmCodecFactory::new()),
            display: Arc::new(RecordingDisplay::new()),
            led: Arc::new(RecordingLed::new()),
            board: Arc::new(SimBoard::new()),
            things: Arc::new(StaticThings::new()),
            clock: Arc::new(ManualClock::new()),
            transport: Arc::new(SimTransport::new(server_sample_rate)),
        }
    }

    /// Context wired to these collaborators, with a transport and no OTA or
    /// voice analysis.
    pub fn context(&self) -> DeviceContext {
        DeviceContext::new(
            self.codec.clone(),
            self.codecs.clone(),
            self.display.clone(),
            self.led.clone(),
            self.board.clone(),
            self.things.clone(),
        )
        .with_clock(self.clock.clone())
        .with_transport(self.transport.clone())
    }

    /// Defaults with every delay shrunk to keep simulated runs fast.  The
    /// upgrade checker is disabled.
    pub fn fast_config() -> DeviceConfig {
        let mut config = DeviceConfig::default();
        config.audio.speaker_drain_ms = 0;
        config.upgrade.enabled = false;
        config.upgrade.check_interval_ms = 10;
        config.upgrade.idle_poll_ms = 5;
        config.upgrade.settle_ms = 0;
        config.upgrade.failure_restart_delay_ms = 0;
        config
    }

    /// Time after which an idle codec output is powered down, plus a bit.
    pub fn past_silence_timeout(config: &DeviceConfig) -> Duration {
        config.audio.output_silence_timeout() + Duration::from_secs(1)
    }
}

impl Default for SimDevice {
    fn default() -> Self {
        Self::new()
    }
}
