//! Firmware upgrade service seam.
//!
//! The orchestrator only sequences the upgrade; talking to the update server
//! and writing the image is the [`Ota`] implementation's job.

use thiserror::Error;

/// Errors reported by the upgrade service.
#[derive(Debug, Error)]
pub enum OtaError {
    #[error("version check failed: {0}")]
    Check(String),

    #[error("firmware download failed: {0}")]
    Download(String),

    #[error("firmware image rejected: {0}")]
    Image(String),
}

/// Transfer progress reported while an image is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpgradeProgress {
    /// 0..=100.
    pub percent: u32,
    pub bytes_per_sec: usize,
}

impl UpgradeProgress {
    /// Status line shown while upgrading, e.g. `"42% 12KB/s"`.
    pub fn status_line(&self) -> String {
        format!("{}% {}KB/s", self.percent, self.bytes_per_sec / 1024)
    }
}

/// Update server client.
pub trait Ota: Send + Sync {
    /// Ask the server for the latest firmware version.
    fn check_version(&self) -> Result<(), OtaError>;

    /// Valid after a successful [`check_version`](Self::check_version).
    fn has_new_version(&self) -> bool;

    /// Confirm the running image so the bootloader does not roll back.
    fn mark_current_version_valid(&self);

    fn current_version(&self) -> String;

    /// Version offered by the server.
    fn firmware_version(&self) -> String;

    /// Download and write the new image, reporting progress.
    fn start_upgrade(&self, progress: &mut dyn FnMut(UpgradeProgress)) -> Result<(), OtaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_in_kilobytes() {
        let progress = UpgradeProgress {
            percent: 42,
            bytes_per_sec: 12 * 1024 + 100,
        };
        assert_eq!(progress.status_line(), "42% 12KB/s");
    }
}
