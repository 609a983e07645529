//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a shared one-way flag: once cancelled it stays
//! cancelled. Holders check it at their own safe points, or block on it with
//! [`CancelToken::wait_timeout`] which returns as soon as the token fires.

use parking_lot::{Condvar, Mutex};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

/// Cloneable handle to a shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the token and wake every waiter.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let _guard = self.inner.lock.lock();
        self.inner.cond.notify_all();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Raw flag, for libraries that poll an `AtomicBool` themselves.
    pub fn flag(&self) -> &AtomicBool {
        &self.inner.cancelled
    }

    /// Block for at most `timeout`, returning early on cancellation.
    ///
    /// Returns `true` if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut guard = self.inner.lock.lock();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while !self.is_cancelled() {
                self.inner.cond.wait(&mut guard);
            }
            return true;
        };

        while !self.is_cancelled() {
            if self.inner.cond.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.is_cancelled()
    }
}
