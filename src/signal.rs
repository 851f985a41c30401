//! One-shot close signal.
//!
//! [`CloseSignal`] is a broadcast event that any number of tasks can wait on.
//! It moves from "not fired" to "fired" exactly once and never back. The
//! transition is guarded by a mutex-protected flag, so concurrent callers of
//! [`CloseSignal::fire`] agree on a single winner.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use tokio::sync::watch;

// ============================================================================
// CloseSignal
// ============================================================================

/// Fire-once, multi-waiter close event.
#[derive(Debug)]
pub(crate) struct CloseSignal {
    /// Set once; the lock is held only for the check-and-set.
    fired: Mutex<bool>,
    /// Broadcasts the fired state to waiters.
    notify: watch::Sender<bool>,
}

impl CloseSignal {
    /// Creates a signal in the "not fired" state.
    pub(crate) fn new() -> Self {
        let (notify, _) = watch::channel(false);
        Self {
            fired: Mutex::new(false),
            notify,
        }
    }

    /// Fires the signal.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub(crate) fn fire(&self) -> bool {
        let mut fired = self.fired.lock();
        if *fired {
            return false;
        }
        *fired = true;
        self.notify.send_replace(true);
        true
    }

    /// Returns `true` once the signal has fired.
    #[inline]
    pub(crate) fn is_fired(&self) -> bool {
        *self.fired.lock()
    }

    /// Waits until the signal fires.
    ///
    /// Resolves immediately if it already has. Cancel-safe.
    pub(crate) async fn wait(&self) {
        let mut rx = self.notify.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a dropped sender.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
