//! Task scheduling primitives.
//!
//! ```text
//!  interrupt ctx ──set(bit)──▶ EventGroup ◀──set(SCHEDULE)── WorkQueue::bound (main)
//!                                  │
//!                          main loop wait_any()
//!                                  │
//!            input / output / run_pending()  ──schedule──▶ WorkQueue::spawn (background)
//!                                                               │
//!                                             result ──schedule──┘ back onto main
//! ```
//!
//! * [`WorkQueue`]: FIFO closure queue with a quiescence barrier.
//! * [`EventGroup`]: lock-free signal bits the main loop blocks on.
//! * [`CancellationFlag`] / [`AbortSignal`]: cooperative abort for
//!   in-flight playback work.

pub mod cancel;
pub mod event_group;
pub mod work_queue;

pub use cancel::{AbortSignal, CancellationFlag};
pub use event_group::{
    EventGroup, INPUT_READY_EVENT, OUTPUT_READY_EVENT, SCHEDULE_EVENT, SHUTDOWN_EVENT,
};
pub use work_queue::{Task, WorkQueue};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `mutex`, taking the data even if a panicking task poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
