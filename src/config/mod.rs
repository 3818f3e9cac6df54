//! Configuration module for the voice device core.
//!
//! Provides `DeviceConfig` (top-level settings), sub-configs for the
//! scheduler, audio pipeline and upgrade checker, `DevicePaths` for the
//! platform config directory, and TOML persistence via
//! `DeviceConfig::load` / `DeviceConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::DevicePaths;
pub use settings::{AudioConfig, DeviceConfig, SchedulerConfig, UpgradeConfig};
