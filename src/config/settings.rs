//! Device settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Time values are stored as plain integers and exposed as [`Duration`]s
//! through accessor methods.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::DevicePaths;

// ---------------------------------------------------------------------------
// SchedulerConfig
// ---------------------------------------------------------------------------

/// Settings for the main scheduler and the background offload queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pending + in-flight task count at which a queue logs a saturation
    /// warning.  Diagnostic only, never a backpressure limit.
    pub saturation_watermark: usize,
    /// Stack size in bytes for the background codec worker thread.
    pub background_stack_size: usize,
    /// Stack size in bytes for the main scheduler thread.
    pub main_stack_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            saturation_watermark: 30,
            background_stack_size: 4096 * 8,
            main_stack_size: 4096 * 2,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for the capture / playback pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz that captured audio is resampled to before it is
    /// handed to the encoder or the wake-word engine.
    pub encode_sample_rate: u32,
    /// Encoder frame duration in milliseconds.
    pub frame_duration_ms: u32,
    /// Seconds of output silence in `Idle` after which the codec output is
    /// powered down.
    pub output_silence_timeout_secs: u64,
    /// Grace period given to the speaker to drain its buffers when listening
    /// interrupts playback.
    pub speaker_drain_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            encode_sample_rate: 16_000,
            frame_duration_ms: 60,
            output_silence_timeout_secs: 10,
            speaker_drain_ms: 120,
        }
    }
}

impl AudioConfig {
    pub fn output_silence_timeout(&self) -> Duration {
        Duration::from_secs(self.output_silence_timeout_secs)
    }

    pub fn speaker_drain(&self) -> Duration {
        Duration::from_millis(self.speaker_drain_ms)
    }
}

// ---------------------------------------------------------------------------
// UpgradeConfig
// ---------------------------------------------------------------------------

/// Firmware upgrade polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeConfig {
    /// Run the version checker at all.
    pub enabled: bool,
    /// Delay between version checks while the server cannot be reached.
    pub check_interval_ms: u64,
    /// Delay between device-state polls while waiting for `Idle`.
    pub idle_poll_ms: u64,
    /// Pause between retiring the background queue and starting the
    /// transfer.
    pub settle_ms: u64,
    /// Delay between showing the failure status and restarting.
    pub failure_restart_delay_ms: u64,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_ms: 60_000,
            idle_poll_ms: 3_000,
            settle_ms: 1_000,
            failure_restart_delay_ms: 3_000,
        }
    }
}

impl UpgradeConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn failure_restart_delay(&self) -> Duration {
        Duration::from_millis(self.failure_restart_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// DeviceConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level device configuration, serialised as `device.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_device_core::config::DeviceConfig;
///
/// // Load (returns Default when file is missing)
/// let config = DeviceConfig::load().unwrap();
/// assert_eq!(config.scheduler.saturation_watermark, 30);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub scheduler: SchedulerConfig,
    pub audio: AudioConfig,
    pub upgrade: UpgradeConfig,
}

impl DeviceConfig {
    /// Load configuration from the platform-appropriate `device.toml`.
    ///
    /// Returns `Ok(DeviceConfig::default())` when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&DevicePaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `device.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&DevicePaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
