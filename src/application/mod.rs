//! Session orchestrator.
//!
//! [`Application`] owns the device state and composes every collaborator in
//! a [`DeviceContext`].  All state mutation and all protocol calls happen on
//! one thread, the main loop:
//!
//! ```text
//!   codec ready ─────┐        transport / voice callbacks ──┐
//!   (interrupt ctx)  │ set bit                     schedule │
//!                    ▼                                      ▼
//!               EventGroup ◀──────── SCHEDULE ──────── main WorkQueue
//!                    │
//!              main loop: input_audio / output_audio / run_pending
//!                    │ offload                   ▲ schedule(send frame)
//!                    ▼                           │
//!            background WorkQueue  (encode, decode + play)
//!
//!   upgrade checker thread ── polls Ota, schedules the upgrade sequence
//! ```
//!
//! Public intents never act directly; they schedule a task so they are
//! serialised with protocol callbacks and state reads.  Every state change
//! first waits for the background queue to drain, so no audio work from the
//! previous state outlives it.

mod context;
mod intents;
mod pipeline;
mod session;
mod transition;
mod upgrade;

#[cfg(test)]
mod tests;

pub use context::DeviceContext;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

use thiserror::Error;

use crate::audio::{AudioEncoder, CodecError};
use crate::config::DeviceConfig;
use crate::device::{DeviceState, DeviceStateMachine};
use crate::iot::StateTracker;
use crate::protocol::{AbortReason, SessionTransport};
use crate::scheduler::work_queue::MIN_STACK_SIZE;
use crate::scheduler::{
    lock, AbortSignal, EventGroup, WorkQueue, INPUT_READY_EVENT, OUTPUT_READY_EVENT,
    SCHEDULE_EVENT, SHUTDOWN_EVENT,
};

use pipeline::{CaptureStage, DecodeStage, Playback};
use upgrade::StopSignal;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur while building or starting the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("codec setup failed: {0}")]
    Codec(#[from] CodecError),

    #[error("application already started")]
    AlreadyStarted,
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

/// State shared between the main loop, the background queue and the
/// collaborator callbacks.
pub(crate) struct Inner {
    ctx: DeviceContext,
    config: DeviceConfig,
    events: Arc<EventGroup>,
    main_queue: WorkQueue,
    /// `None` once the upgrade sequence has retired it.
    background: Mutex<Option<Arc<WorkQueue>>>,
    main_thread: OnceLock<ThreadId>,
    machine: DeviceStateMachine,
    /// Decode queue and output power bookkeeping.  Also held across state
    /// changes so incoming audio sees a consistent state.
    playback: Mutex<Playback>,
    decode: Arc<Mutex<DecodeStage>>,
    encoder: Arc<Mutex<Option<Box<dyn AudioEncoder>>>>,
    capture: Mutex<CaptureStage>,
    abort: AbortSignal,
    keep_listening: AtomicBool,
    voice_detected: AtomicBool,
    iot_states: StateTracker,
}

impl Inner {
    fn new(ctx: DeviceContext, config: DeviceConfig) -> Result<Self, AppError> {
        let watermark = config.scheduler.saturation_watermark;
        let events = Arc::new(EventGroup::new());
        let main_queue = WorkQueue::bound("main", watermark, Arc::clone(&events), SCHEDULE_EVENT);
        let background =
            WorkQueue::spawn("background", watermark, config.scheduler.background_stack_size)
                .map_err(|source| AppError::Spawn {
                    name: "background",
                    source,
                })?;
        let now = ctx.clock.now();

        Ok(Self {
            ctx,
            config,
            events,
            main_queue,
            background: Mutex::new(Some(Arc::new(background))),
            main_thread: OnceLock::new(),
            machine: DeviceStateMachine::new(),
            playback: Mutex::new(Playback::new(now)),
            decode: Arc::new(Mutex::new(DecodeStage::default())),
            encoder: Arc::new(Mutex::new(None)),
            capture: Mutex::new(CaptureStage::default()),
            abort: AbortSignal::new(),
            keep_listening: AtomicBool::new(false),
            voice_detected: AtomicBool::new(false),
            iot_states: StateTracker::new(),
        })
    }

    pub(crate) fn device_state(&self) -> DeviceState {
        self.machine.current()
    }

    fn transport(&self) -> Option<Arc<dyn SessionTransport>> {
        self.ctx.transport.clone()
    }

    fn is_voice_detected(&self) -> bool {
        self.voice_detected.load(Ordering::Acquire)
    }

    // ---- scheduling ----------------------------------------------------------

    /// Run `task` on the main loop.  The task is skipped if the application
    /// is gone by the time it runs.
    fn schedule<F>(self: &Arc<Self>, task: F)
    where
        F: FnOnce(&Arc<Inner>) + Send + 'static,
    {
        let weak = Arc::downgrade(self);
        self.main_queue.schedule(move || {
            if let Some(inner) = weak.upgrade() {
                task(&inner);
            }
        });
    }

    /// Hand CPU-heavy work to the background queue.
    fn offload<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match lock(&self.background).as_ref() {
            Some(queue) => queue.schedule(task),
            None => log::debug!("app: background queue retired, task dropped"),
        }
    }

    fn background_queue(&self) -> Option<Arc<WorkQueue>> {
        lock(&self.background).clone()
    }

    /// Block until the background queue has nothing pending or running.
    fn wait_background(&self) {
        if let Some(queue) = self.background_queue() {
            queue.wait_for_completion();
        }
    }

    fn background_quiescent(&self) -> bool {
        self.background_queue()
            .map_or(true, |queue| queue.is_quiescent())
    }

    /// Drain the background queue and stop its worker for good.
    fn retire_background(&self) {
        let queue = lock(&self.background).take();
        if let Some(queue) = queue {
            queue.wait_for_completion();
            log::info!("app: background queue retired");
        }
    }

    fn on_main_thread(&self) -> bool {
        self.main_thread.get() == Some(&thread::current().id())
    }

    // ---- main loop -----------------------------------------------------------

    fn main_loop(self: Arc<Self>) {
        let _ = self.main_thread.set(thread::current().id());
        log::info!("app: main loop started");

        let mask = SCHEDULE_EVENT | INPUT_READY_EVENT | OUTPUT_READY_EVENT | SHUTDOWN_EVENT;
        loop {
            let raised = self.events.wait_any(mask);

            if raised & INPUT_READY_EVENT != 0 {
                self.input_audio();
            }
            if raised & OUTPUT_READY_EVENT != 0 {
                self.output_audio();
            }
            if raised & SCHEDULE_EVENT != 0 {
                self.main_queue.run_pending();
            }
            if raised & SHUTDOWN_EVENT != 0 {
                break;
            }
        }

        log::info!("app: main loop stopped");
    }

    // ---- startup -------------------------------------------------------------

    fn start(self: &Arc<Self>) -> Result<(), AppError> {
        self.schedule(|inner| inner.set_device_state(DeviceState::Starting));

        if let Err(err) = self.setup_codecs() {
            log::error!("app: {err}");
            self.schedule(|inner| inner.set_device_state(DeviceState::FatalError));
            return Err(err.into());
        }

        let events = Arc::clone(&self.events);
        self.ctx
            .codec
            .on_input_ready(Box::new(move || events.set(INPUT_READY_EVENT)));
        let events = Arc::clone(&self.events);
        self.ctx
            .codec
            .on_output_ready(Box::new(move || events.set(OUTPUT_READY_EVENT)));
        self.ctx.codec.start();
        self.mark_output_enabled();

        self.wire_voice_analysis();
        match self.transport() {
            Some(transport) => self.wire_transport(transport.as_ref()),
            None => log::warn!("app: no session transport, chat is unavailable"),
        }

        self.schedule(|inner| inner.set_device_state(DeviceState::Idle));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// The device core.  Dropping it stops every thread it started.
///
/// ```rust
/// use voice_device_core::application::Application;
/// use voice_device_core::device::DeviceState;
/// use voice_device_core::sim::SimDevice;
///
/// let device = SimDevice::new();
/// let mut app = Application::new(device.context(), SimDevice::fast_config()).unwrap();
/// app.start().unwrap();
/// app.settle();
/// assert_eq!(app.device_state(), DeviceState::Idle);
/// ```
pub struct Application {
    inner: Arc<Inner>,
    main_loop: Option<JoinHandle<()>>,
    upgrade_checker: Option<JoinHandle<()>>,
    stop: Arc<StopSignal>,
}

impl Application {
    /// Build the application and its background worker.  Nothing else runs
    /// until [`start`](Self::start).
    pub fn new(ctx: DeviceContext, config: DeviceConfig) -> Result<Self, AppError> {
        Ok(Self {
            inner: Arc::new(Inner::new(ctx, config)?),
            main_loop: None,
            upgrade_checker: None,
            stop: Arc::new(StopSignal::default()),
        })
    }

    /// Start the main loop, set up the codecs, wire every callback and, when
    /// enabled, the upgrade checker.
    ///
    /// A codec setup failure moves the device to `FatalError` and is also
    /// returned here.
    pub fn start(&mut self) -> Result<(), AppError> {
        if self.main_loop.is_some() {
            return Err(AppError::AlreadyStarted);
        }

        let stack_size = self
            .inner
            .config
            .scheduler
            .main_stack_size
            .max(MIN_STACK_SIZE);
        let inner = Arc::clone(&self.inner);
        let main_loop = thread::Builder::new()
            .name("main_loop".into())
            .stack_size(stack_size)
            .spawn(move || inner.main_loop())
            .map_err(|source| AppError::Spawn {
                name: "main_loop",
                source,
            })?;
        self.main_loop = Some(main_loop);

        self.inner.start()?;

        let ota = self.inner.ctx.ota.clone();
        match ota {
            Some(ota) if self.inner.config.upgrade.enabled => {
                let inner = Arc::clone(&self.inner);
                let stop = Arc::clone(&self.stop);
                let checker = thread::Builder::new()
                    .name("check_new_version".into())
                    .spawn(move || upgrade::check_new_version(&inner, ota, &stop))
                    .map_err(|source| AppError::Spawn {
                        name: "check_new_version",
                        source,
                    })?;
                self.upgrade_checker = Some(checker);
            }
            Some(_) => log::info!("app: upgrade checker disabled"),
            None => {}
        }

        Ok(())
    }

    pub fn device_state(&self) -> DeviceState {
        self.inner.device_state()
    }

    /// Speech currently detected by the wake-word engine's VAD.
    pub fn is_voice_detected(&self) -> bool {
        self.inner.is_voice_detected()
    }

    /// Re-enter listening after the assistant finishes speaking.
    pub fn keep_listening(&self) -> bool {
        self.inner.keep_listening.load(Ordering::Acquire)
    }

    /// Encoded frames waiting to be played.
    pub fn decode_queue_len(&self) -> usize {
        lock(&self.inner.playback).queue.len()
    }

    // ---- intents -------------------------------------------------------------

    /// Idle → connect and listen; Speaking → interrupt; Listening → hang up.
    pub fn toggle_chat_state(&self) {
        self.inner.schedule(|inner| inner.toggle_chat_state());
    }

    /// Push-to-talk press.
    pub fn start_listening(&self) {
        self.inner.schedule(|inner| inner.start_listening());
    }

    /// Push-to-talk release.
    pub fn stop_listening(&self) {
        self.inner.schedule(|inner| inner.stop_listening());
    }

    pub fn abort_speaking(&self, reason: AbortReason) {
        self.inner.schedule(move |inner| inner.abort_speaking(reason));
    }

    /// Show `message` and play its alert sound when one is registered.
    pub fn alert(&self, title: &str, message: &str) {
        let title = title.to_string();
        let message = message.to_string();
        self.inner.schedule(move |inner| inner.alert(&title, &message));
    }

    /// Push the IoT state snapshot if it changed since the last push.
    pub fn update_iot_states(&self) {
        self.inner.schedule(|inner| inner.update_iot_states());
    }

    /// Run an arbitrary closure on the main loop.
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.main_queue.schedule(task);
    }

    // ---- lifecycle -----------------------------------------------------------

    /// Block until the main loop and the background queue are both idle,
    /// including work either of them hands to the other.
    ///
    /// Returns immediately when not started or when called from the main
    /// loop itself.
    pub fn settle(&self) {
        if self.main_loop.is_none() || self.inner.on_main_thread() {
            return;
        }
        loop {
            self.inner.main_queue.schedule(|| {});
            self.inner.main_queue.wait_for_completion();
            self.inner.wait_background();
            if self.inner.main_queue.is_quiescent() && self.inner.background_quiescent() {
                return;
            }
        }
    }

    /// Stop the upgrade checker, the main loop and the background worker and
    /// join them.  Idempotent.
    pub fn shutdown(&mut self) {
        self.stop.raise();
        if let Some(checker) = self.upgrade_checker.take() {
            if checker.join().is_err() {
                log::error!("app: upgrade checker panicked");
            }
        }
        if let Some(main_loop) = self.main_loop.take() {
            self.inner.events.set(SHUTDOWN_EVENT);
            if main_loop.join().is_err() {
                log::error!("app: main loop panicked");
            }
            self.inner.retire_background();
        }
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("state", &self.device_state())
            .field("started", &self.main_loop.is_some())
            .finish_non_exhaustive()
    }
}
