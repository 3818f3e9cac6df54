//! Scripted update server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::ota::{Ota, OtaError, UpgradeProgress};

/// Update server whose answers are fixed at construction.
pub struct ScriptedOta {
    current: String,
    offered: Option<String>,
    failing_checks: usize,
    upgrade_fails: bool,
    checks: AtomicUsize,
    marked_valid: AtomicBool,
    upgrades: AtomicUsize,
}

impl ScriptedOta {
    /// Server that reports `current` as the latest version.
    pub fn new(current: &str) -> Self {
        Self {
            current: current.to_string(),
            offered: None,
            failing_checks: 0,
            upgrade_fails: false,
            checks: AtomicUsize::new(0),
            marked_valid: AtomicBool::new(false),
            upgrades: AtomicUsize::new(0),
        }
    }

    /// Offer `version` as a new firmware.
    pub fn offering(mut self, version: &str) -> Self {
        self.offered = Some(version.to_string());
        self
    }

    /// Fail the first `count` version checks.
    pub fn failing_checks(mut self, count: usize) -> Self {
        self.failing_checks = count;
        self
    }

    pub fn upgrade_fails(mut self, fails: bool) -> Self {
        self.upgrade_fails = fails;
        self
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::Acquire)
    }

    pub fn upgrades_started(&self) -> usize {
        self.upgrades.load(Ordering::Acquire)
    }

    pub fn is_marked_valid(&self) -> bool {
        self.marked_valid.load(Ordering::Acquire)
    }
}

impl Ota for ScriptedOta {
    fn check_version(&self) -> Result<(), OtaError> {
        let attempt = self.checks.fetch_add(1, Ordering::AcqRel);
        if attempt < self.failing_checks {
            return Err(OtaError::Check(format!("server unreachable (attempt {})", attempt + 1)));
        }
        Ok(())
    }

    fn has_new_version(&self) -> bool {
        self.offered.is_some()
    }

    fn mark_current_version_valid(&self) {
        self.marked_valid.store(true, Ordering::Release);
    }

    fn current_version(&self) -> String {
        self.current.clone()
    }

    fn firmware_version(&self) -> String {
        self.offered.clone().unwrap_or_else(|| self.current.clone())
    }

    fn start_upgrade(&self, progress: &mut dyn FnMut(UpgradeProgress)) -> Result<(), OtaError> {
        self.upgrades.fetch_add(1, Ordering::AcqRel);
        for percent in [25, 50, 75] {
            progress(UpgradeProgress {
                percent,
                bytes_per_sec: 64 * 1024,
            });
        }
        if self.upgrade_fails {
            return Err(OtaError::Image("checksum mismatch".into()));
        }
        progress(UpgradeProgress {
            percent: 100,
            bytes_per_sec: 64 * 1024,
        });
        Ok(())
    }
}
