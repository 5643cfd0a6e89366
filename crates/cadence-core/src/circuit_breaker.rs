//! Cooperative cancellation gate.
//!
//! Operators poll [`CircuitBreaker::check`] inside every loop whose length is
//! bounded only by input size. A tripped breaker turns the current pull into an
//! error so callers can tell cancellation apart from end-of-data.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Default number of checks between clock reads when a timeout is set.
pub const DEFAULT_THROTTLE: u32 = 1024;

pub struct CircuitBreaker {
    cancelled: Arc<AtomicBool>,
    started: Instant,
    deadline: Option<Instant>,
    throttle: u32,
    countdown: Cell<u32>,
}

/// Handle held by whoever owns the query; trips every breaker cloned from the
/// same origin.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Re-arm the breaker for the next execution.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
            deadline: None,
            throttle: DEFAULT_THROTTLE,
            countdown: Cell::new(DEFAULT_THROTTLE),
        }
    }

    /// Breaker that also trips once `timeout` has elapsed since construction.
    pub fn with_timeout(timeout: Duration) -> Self {
        let mut cb = Self::new();
        cb.deadline = Some(cb.started + timeout);
        cb
    }

    /// Number of checks between clock reads. The cancel flag is read on every check.
    pub fn with_throttle(mut self, throttle: u32) -> Self {
        self.throttle = throttle;
        self.countdown.set(throttle);
        self
    }

    pub fn handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail with `Cancelled` or `Timeout` if the breaker has tripped.
    pub fn check(&self) -> Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(Error::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            let left = self.countdown.get();
            if left == 0 {
                self.countdown.set(self.throttle);
                if Instant::now() >= deadline {
                    return Err(Error::Timeout {
                        elapsed_ms: self.started.elapsed().as_millis() as u64,
                    });
                }
            } else {
                self.countdown.set(left - 1);
            }
        }
        Ok(())
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CircuitBreaker {
    /// Shares the cancel flag and deadline; the throttle countdown starts fresh.
    fn clone(&self) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            started: self.started,
            deadline: self.deadline,
            throttle: self.throttle,
            countdown: Cell::new(self.throttle),
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .field("throttle", &self.throttle)
            .finish()
    }
}
