//! Cooperative cancellation for background codec work.
//!
//! Each playback task captures the [`CancellationFlag`] that was current
//! when it was dispatched and checks it before decoding and before writing to
//! the codec.  [`AbortSignal::renew`] hands out a fresh flag for the next
//! utterance, so raising the old one never leaks into later work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::lock;

/// A shareable "stop what you are doing" bit.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Owner of the flag for the utterance currently playing.
#[derive(Debug, Default)]
pub struct AbortSignal {
    current: Mutex<CancellationFlag>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// The flag new background work should capture.
    pub fn token(&self) -> CancellationFlag {
        lock(&self.current).clone()
    }

    /// Cancel all work holding the current flag.
    pub fn abort(&self) {
        self.token().cancel();
    }

    /// Start a new utterance with a clear flag.  Work dispatched under the
    /// previous flag keeps seeing its own state.
    pub fn renew(&self) {
        *lock(&self.current) = CancellationFlag::new();
    }

    pub fn is_aborted(&self) -> bool {
        self.token().is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_reaches_captured_tokens() {
        let signal = AbortSignal::new();
        let token = signal.token();
        assert!(!token.is_cancelled());

        signal.abort();
        assert!(token.is_cancelled());
        assert!(signal.is_aborted());
    }

    #[test]
    fn renew_does_not_resurrect_old_tokens() {
        let signal = AbortSignal::new();
        let old = signal.token();
        signal.abort();
        signal.renew();

        assert!(old.is_cancelled());
        assert!(!signal.token().is_cancelled());
        assert!(!signal.is_aborted());
    }

    #[test]
    fn survives_a_poisoned_lock() {
        let signal = AbortSignal::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = signal.current.lock().unwrap();
            panic!("task panicked while holding the flag");
        }));
        assert!(signal.current.is_poisoned());

        signal.abort();
        assert!(signal.is_aborted());
        signal.renew();
        assert!(!signal.is_aborted());
    }
}
