//! Cross-platform device paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir:
//!   Windows: %APPDATA%\voice-device\
//!   macOS:   ~/Library/Application Support/voice-device/
//!   Linux:   ~/.config/voice-device/

use std::path::PathBuf;

/// Holds all resolved directory/file paths.
#[derive(Debug, Clone)]
pub struct DevicePaths {
    /// Directory for `device.toml`.
    pub config_dir: PathBuf,
    /// Full path to `device.toml`.
    pub settings_file: PathBuf,
}

impl DevicePaths {
    const APP_NAME: &'static str = "voice-device";

    /// Resolves all paths using the `dirs` crate, falling back to the
    /// current directory if the platform cannot provide one.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let settings_file = config_dir.join("device.toml");

        Self {
            config_dir,
            settings_file,
        }
    }
}

impl Default for DevicePaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_file_lives_in_config_dir() {
        let paths = DevicePaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "device.toml"));
        assert_eq!(paths.settings_file.parent(), Some(paths.config_dir.as_path()));
    }
}
