//! FIFO closure queue with a quiescence barrier.
//!
//! A [`WorkQueue`] is drained by exactly one thread.  It comes in two
//! flavours:
//!
//! * [`WorkQueue::spawn`] owns a dedicated worker thread that sleeps on a
//!   condition variable until work arrives.  Used for the background codec
//!   offload queue.
//! * [`WorkQueue::bound`] has no thread of its own.  Scheduling raises a bit
//!   in an [`EventGroup`] and the owner drains the queue with
//!   [`WorkQueue::run_pending`] from its own loop.  Used for the main
//!   scheduler, which also waits on codec signals.
//!
//! # Bookkeeping
//!
//! ```text
//! schedule()      active += 1, pending.push_back(task)
//! drain           batch = take(pending)      (lock released)
//! after each task active -= 1, notify idle when pending empty && active == 0
//! ```
//!
//! Tasks scheduled while a batch runs land in the next batch.  A panicking
//! task is caught and logged; the drain loop keeps going.

use std::collections::VecDeque;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use super::EventGroup;

/// Host threads get at least this much stack regardless of the configured
/// embedded budget.
pub(crate) const MIN_STACK_SIZE: usize = 256 * 1024;

/// A deferred zero-argument action.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Task>,
    /// Scheduled but not yet finished (pending + executing).
    active: usize,
    shutdown: bool,
}

impl QueueState {
    fn is_quiescent(&self) -> bool {
        self.pending.is_empty() && self.active == 0
    }
}

enum Wake {
    /// A dedicated worker sleeps on `Shared::work_ready`.
    Worker,
    /// The owner's loop waits on an event group bit.
    Signal { events: Arc<EventGroup>, bit: u32 },
}

struct Shared {
    name: String,
    watermark: usize,
    state: Mutex<QueueState>,
    work_ready: Condvar,
    idle: Condvar,
    wake: Wake,
    /// The thread that drains this queue, once known.
    driver: OnceLock<ThreadId>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        super::lock(&self.state)
    }

    fn take_batch(&self) -> VecDeque<Task> {
        std::mem::take(&mut self.lock().pending)
    }

    fn execute(&self, batch: VecDeque<Task>) -> usize {
        let count = batch.len();
        for task in batch {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                log::error!(
                    "work_queue[{}]: task panicked: {}",
                    self.name,
                    panic_message(payload.as_ref())
                );
            }

            let mut st = self.lock();
            st.active -= 1;
            if st.is_quiescent() {
                self.idle.notify_all();
            }
        }
        count
    }

    fn worker_loop(&self) {
        log::info!("work_queue[{}]: worker started", self.name);
        loop {
            let batch = {
                let mut st = self.lock();
                while st.pending.is_empty() && !st.shutdown {
                    st = self
                        .work_ready
                        .wait(st)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                if st.pending.is_empty() {
                    break;
                }
                std::mem::take(&mut st.pending)
            };
            self.execute(batch);
        }
        log::info!("work_queue[{}]: worker stopped", self.name);
    }

    fn on_driver_thread(&self) -> bool {
        self.driver.get() == Some(&thread::current().id())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// WorkQueue
// ---------------------------------------------------------------------------

/// Single-consumer FIFO task queue.
///
/// ```rust
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use voice_device_core::scheduler::WorkQueue;
///
/// let queue = WorkQueue::spawn("doc", 30, 0).unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
/// for _ in 0..10 {
///     let counter = Arc::clone(&counter);
///     queue.schedule(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     });
/// }
/// queue.wait_for_completion();
/// assert_eq!(counter.load(Ordering::SeqCst), 10);
/// ```
pub struct WorkQueue {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl WorkQueue {
    /// Create a queue drained by its own worker thread named `name`.
    ///
    /// `watermark` is the in-flight count at which a saturation warning is
    /// logged.  `stack_size` is the requested worker stack in bytes.
    pub fn spawn(name: &str, watermark: usize, stack_size: usize) -> io::Result<Self> {
        let shared = Arc::new(Self::shared(name, watermark, Wake::Worker));

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .stack_size(stack_size.max(MIN_STACK_SIZE))
            .spawn(move || {
                let _ = worker_shared.driver.set(thread::current().id());
                worker_shared.worker_loop();
            })?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Create a queue with no worker.  Scheduling raises `bit` on `events`;
    /// the owner drains with [`run_pending`](Self::run_pending).
    pub fn bound(name: &str, watermark: usize, events: Arc<EventGroup>, bit: u32) -> Self {
        Self {
            shared: Arc::new(Self::shared(name, watermark, Wake::Signal { events, bit })),
            worker: None,
        }
    }

    fn shared(name: &str, watermark: usize, wake: Wake) -> Shared {
        Shared {
            name: name.to_string(),
            watermark,
            state: Mutex::new(QueueState::default()),
            work_ready: Condvar::new(),
            idle: Condvar::new(),
            wake,
            driver: OnceLock::new(),
        }
    }

    /// Append a task.  Callable from any thread; never waits for the worker.
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut st = self.shared.lock();
            if st.shutdown {
                log::warn!(
                    "work_queue[{}]: schedule after shutdown, task dropped",
                    self.shared.name
                );
                return;
            }
            if st.active >= self.shared.watermark {
                log::warn!(
                    "work_queue[{}]: {} tasks in flight (watermark {})",
                    self.shared.name,
                    st.active,
                    self.shared.watermark
                );
            }
            st.active += 1;
            st.pending.push_back(Box::new(task));
        }

        match &self.shared.wake {
            Wake::Worker => self.shared.work_ready.notify_one(),
            Wake::Signal { events, bit } => events.set(*bit),
        }
    }

    /// Execute the tasks pending right now on the calling thread, in FIFO
    /// order.  Returns how many ran.
    ///
    /// Only meaningful for [`bound`](Self::bound) queues; the calling thread
    /// becomes the queue's driver.
    pub fn run_pending(&self) -> usize {
        let _ = self.shared.driver.set(thread::current().id());
        let batch = self.shared.take_batch();
        self.shared.execute(batch)
    }

    /// Block until no task is pending or executing.
    ///
    /// Tasks scheduled while waiting extend the wait until they drain too.
    /// Calling this from the queue's own driver thread would never return,
    /// so that case logs an error and returns immediately.
    pub fn wait_for_completion(&self) {
        if self.shared.on_driver_thread() {
            log::error!(
                "work_queue[{}]: wait_for_completion called from its own worker",
                self.shared.name
            );
            return;
        }

        let st = self.shared.lock();
        let _st = self
            .shared
            .idle
            .wait_while(st, |st| !st.is_quiescent())
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`wait_for_completion`](Self::wait_for_completion) but gives up
    /// after `timeout`.  Returns `true` when the queue is quiescent.
    pub fn wait_for_completion_timeout(&self, timeout: Duration) -> bool {
        let st = self.shared.lock();
        let (st, _) = self
            .shared
            .idle
            .wait_timeout_while(st, timeout, |st| !st.is_quiescent())
            .unwrap_or_else(PoisonError::into_inner);
        st.is_quiescent()
    }

    /// Scheduled but unfinished tasks.
    pub fn in_flight(&self) -> usize {
        self.shared.lock().active
    }

    pub fn is_quiescent(&self) -> bool {
        self.shared.lock().is_quiescent()
    }
}

impl Drop for WorkQueue {
    /// Stops accepting work, lets the worker finish what is pending, then
    /// joins it.
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.work_ready.notify_all();

        if let Some(worker) = self.worker.take() {
            if self.shared.on_driver_thread() {
                // Dropped by one of its own tasks; the loop exits on its own.
                return;
            }
            if worker.join().is_err() {
                log::error!("work_queue[{}]: worker thread panicked", self.shared.name);
            }
        }
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("name", &self.shared.name)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
