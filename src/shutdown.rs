//! Shutdown coordination.
//!
//! - A process-wide flag set by the ctrlc handler (SIGINT/SIGTERM); the binary
//!   polls it while the service runs.
//! - `StopSignal`, a per-component stop flag whose waits wake up as soon as
//!   `stop()` is called. Workers and the reaper sleep on it instead of
//!   `thread::sleep` so shutdown never waits out a full retry pause.
//!
//! Notes:
//! - Relaxed atomics are sufficient for a one-way "stop" flag.
//! - `request()` is safe to call from signal handlers.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Request a cooperative shutdown (idempotent).
#[inline]
pub fn request() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Check whether a shutdown has been requested.
#[inline]
pub fn is_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Test/utility-only: clear the shutdown flag.
#[cfg(test)]
#[inline]
pub fn reset() {
    SHUTDOWN.store(false, Ordering::Relaxed);
}

/// Cloneable stop flag with interruptible waits.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip to stopped and wake every waiter (idempotent).
    pub fn stop(&self) {
        let mut stopped = self.inner.stopped.lock();
        *stopped = true;
        self.inner.cv.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock()
    }

    /// Sleep for `dur` unless stopped first. Returns true if stopped.
    pub fn wait_timeout(&self, dur: Duration) -> bool {
        let mut stopped = self.inner.stopped.lock();
        let Some(deadline) = Instant::now().checked_add(dur) else {
            // Past the representable horizon: wait for stop only.
            while !*stopped {
                self.inner.cv.wait(&mut stopped);
            }
            return true;
        };
        while !*stopped {
            if self.inner.cv.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}
