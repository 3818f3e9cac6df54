//! Lock-free signal bits with a single parked waiter.
//!
//! [`EventGroup`] replaces the RTOS event group the main loop blocks on.
//! Producers (codec interrupt callbacks, the main [`WorkQueue`]) call
//! [`EventGroup::set`], which is one atomic `fetch_or` plus an `unpark` of
//! the waiting thread: no lock, no allocation, never blocks.
//!
//! Exactly one thread may wait.  The first caller of [`EventGroup::wait_any`]
//! becomes the waiter for the lifetime of the group.  Bits set before the
//! waiter registers are kept and observed on its first wait.
//!
//! [`WorkQueue`]: super::WorkQueue

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::thread::{self, Thread};

/// Tasks were appended to the main scheduler queue.
pub const SCHEDULE_EVENT: u32 = 1 << 0;
/// The codec has a captured buffer ready to read.
pub const INPUT_READY_EVENT: u32 = 1 << 1;
/// The codec can accept another playback buffer.
pub const OUTPUT_READY_EVENT: u32 = 1 << 2;
/// The owner asked the main loop to exit.
pub const SHUTDOWN_EVENT: u32 = 1 << 3;

/// A set of auto-clearing signal bits.
#[derive(Debug, Default)]
pub struct EventGroup {
    bits: AtomicU32,
    waiter: OnceLock<Thread>,
}

impl EventGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise `bits` and wake the waiter.  Safe to call from any context.
    pub fn set(&self, bits: u32) {
        self.bits.fetch_or(bits, Ordering::AcqRel);
        if let Some(waiter) = self.waiter.get() {
            waiter.unpark();
        }
    }

    /// Block until at least one bit in `mask` is raised, then clear and
    /// return every raised bit in `mask`.
    ///
    /// Bits outside `mask` are left untouched.
    pub fn wait_any(&self, mask: u32) -> u32 {
        let waiter = self.waiter.get_or_init(thread::current);
        debug_assert_eq!(
            waiter.id(),
            thread::current().id(),
            "EventGroup supports a single waiting thread"
        );

        loop {
            let raised = self.bits.fetch_and(!mask, Ordering::AcqRel) & mask;
            if raised != 0 {
                return raised;
            }
            // An unpark issued between the fetch_and and here leaves a token,
            // so this returns immediately instead of losing the wakeup.
            thread::park();
        }
    }

    /// Currently raised bits, without clearing them.
    pub fn peek(&self) -> u32 {
        self.bits.load(Ordering::Acquire)
    }
}
