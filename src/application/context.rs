//! Collaborators the application is built from.

use std::sync::Arc;

use crate::audio::{AlertSounds, CodecFactory};
use crate::board::{AudioCodec, Board, Clock, Display, Led, SystemClock};
use crate::iot::ThingRegistry;
use crate::ota::Ota;
use crate::protocol::SessionTransport;
use crate::voice::{AudioProcessor, WakeWordDetector};

/// Everything the device core talks to, constructed once at startup and
/// handed to [`Application::new`](super::Application::new).
///
/// Optional collaborators model hardware or services a board may lack:
/// without a transport every chat intent reports an error, without an
/// [`Ota`] no version check runs, and without voice analysis captured audio
/// goes straight to the encoder while listening.
#[derive(Clone)]
pub struct DeviceContext {
    pub codec: Arc<dyn AudioCodec>,
    pub codecs: Arc<dyn CodecFactory>,
    pub display: Arc<dyn Display>,
    pub led: Arc<dyn Led>,
    pub board: Arc<dyn Board>,
    pub things: Arc<dyn ThingRegistry>,
    pub clock: Arc<dyn Clock>,
    pub transport: Option<Arc<dyn SessionTransport>>,
    pub ota: Option<Arc<dyn Ota>>,
    pub audio_processor: Option<Arc<dyn AudioProcessor>>,
    pub wake_word: Option<Arc<dyn WakeWordDetector>>,
    pub alert_sounds: AlertSounds,
}

impl DeviceContext {
    /// Context with the required collaborators, the system clock and no
    /// optional ones.
    pub fn new(
        codec: Arc<dyn AudioCodec>,
        codecs: Arc<dyn CodecFactory>,
        display: Arc<dyn Display>,
        led: Arc<dyn Led>,
        board: Arc<dyn Board>,
        things: Arc<dyn ThingRegistry>,
    ) -> Self {
        Self {
            codec,
            codecs,
            display,
            led,
            board,
            things,
            clock: Arc::new(SystemClock),
            transport: None,
            ota: None,
            audio_processor: None,
            wake_word: None,
            alert_sounds: AlertSounds::new(),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn SessionTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_ota(mut self, ota: Arc<dyn Ota>) -> Self {
        self.ota = Some(ota);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_audio_processor(mut self, processor: Arc<dyn AudioProcessor>) -> Self {
        self.audio_processor = Some(processor);
        self
    }

    pub fn with_wake_word(mut self, detector: Arc<dyn WakeWordDetector>) -> Self {
        self.wake_word = Some(detector);
        self
    }

    pub fn with_alert_sounds(mut self, sounds: AlertSounds) -> Self {
        self.alert_sounds = sounds;
        self
    }

    /// `true` when captured audio is routed through on-device analysis
    /// instead of straight to the encoder.
    pub fn has_voice_analysis(&self) -> bool {
        self.audio_processor.is_some() || self.wake_word.is_some()
    }
}
