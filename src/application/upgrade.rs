//! Firmware version polling and the upgrade sequence.
//!
//! The checker runs on its own thread.  Once a new version is known it
//! waits for the device to be idle, then hands the upgrade to the main loop,
//! which runs it to the end: the device always restarts afterwards.

use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::device::DeviceState;
use crate::ota::Ota;
use crate::scheduler::lock;

use super::Inner;

const STATUS_UPGRADE_FAILED: &str = "Upgrade failed";

/// Wakes the checker out of its sleeps when the application shuts down.
#[derive(Debug, Default)]
pub(super) struct StopSignal {
    stopped: Mutex<bool>,
    changed: Condvar,
}

impl StopSignal {
    pub(super) fn raise(&self) {
        *lock(&self.stopped) = true;
        self.changed.notify_all();
    }

    /// Sleep for `timeout`.  Returns `true` if stopped meanwhile.
    fn sleep(&self, timeout: Duration) -> bool {
        let stopped = lock(&self.stopped);
        let (stopped, _) = self
            .changed
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *stopped
    }
}

/// Body of the checker thread.
pub(super) fn check_new_version(inner: &Arc<Inner>, ota: Arc<dyn Ota>, stop: &StopSignal) {
    let config = inner.config.upgrade.clone();

    loop {
        match ota.check_version() {
            Ok(()) if ota.has_new_version() => break,
            Ok(()) => {
                ota.mark_current_version_valid();
                let version = ota.current_version();
                log::info!("upgrade: firmware {version} is up to date");
                inner
                    .ctx
                    .display
                    .show_notification(&format!("Version {version}"));
                return;
            }
            Err(err) => log::warn!("upgrade: {err}, retrying in {:?}", config.check_interval()),
        }
        if stop.sleep(config.check_interval()) {
            return;
        }
    }

    log::info!("upgrade: new firmware {} available", ota.firmware_version());
    loop {
        if stop.sleep(config.idle_poll()) {
            return;
        }
        if inner.device_state() != DeviceState::Idle {
            continue;
        }

        // The state may change before the task runs; it reports whether it
        // actually started.
        let (started_tx, started_rx) = mpsc::channel();
        let ota = Arc::clone(&ota);
        inner.schedule(move |inner| {
            let idle = inner.device_state() == DeviceState::Idle;
            let _ = started_tx.send(idle);
            if idle {
                inner.upgrade_firmware(ota.as_ref());
            }
        });
        match started_rx.recv() {
            Ok(true) => return,
            Ok(false) => log::info!("upgrade: device busy, waiting for idle again"),
            Err(_) => return,
        }
    }
}

impl Inner {
    /// Non-cancelable upgrade sequence.  Ends in a board restart.
    fn upgrade_firmware(&self, ota: &dyn Ota) {
        let version = ota.firmware_version();
        log::info!("upgrade: upgrading to {version}");

        self.set_device_state(DeviceState::Upgrading);
        self.ctx.display.set_status(&format!("New version {version}"));

        {
            let mut playback = lock(&self.playback);
            playback.output_enabled = false;
            playback.queue.clear();
        }
        self.ctx.codec.enable_output(false);

        self.retire_background();
        thread::sleep(self.config.upgrade.settle());

        let display = Arc::clone(&self.ctx.display);
        let result = ota.start_upgrade(&mut |progress| {
            log::info!("upgrade: {}", progress.status_line());
            display.set_status(&progress.status_line());
        });

        match result {
            Ok(()) => log::info!("upgrade: firmware written, restarting"),
            Err(err) => {
                log::error!("upgrade: {err}");
                self.ctx.display.set_status(STATUS_UPGRADE_FAILED);
                thread::sleep(self.config.upgrade.failure_restart_delay());
            }
        }
        self.ctx.board.restart();
    }
}
