//! Countdown enforcement for the maximum recording duration.
//!
//! The timer itself is a small shared-state struct; the 1 Hz interval task
//! that drives `tick()` is owned by the capture controller and torn down
//! with the rest of the session's resources.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Outcome of a single countdown tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownSignal {
    /// Still counting down
    Running { remaining: u64 },
    /// Hit zero on this tick; reported exactly once
    Expired,
    /// Timer is not running
    Stopped,
}

/// One-second countdown from a fixed maximum.
///
/// `stop` is idempotent; `reset` restores the maximum and is only called
/// when the owning session returns to idle.
#[derive(Debug)]
pub struct CountdownTimer {
    max_secs: u64,
    remaining: AtomicU64,
    running: AtomicBool,
}

impl CountdownTimer {
    pub fn new(max_secs: u64) -> Self {
        Self {
            max_secs,
            remaining: AtomicU64::new(max_secs),
            running: AtomicBool::new(false),
        }
    }

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Decrement by one second. Expiry is reported on the tick that reaches
    /// zero and stops the timer, so it cannot fire twice.
    pub fn tick(&self) -> CountdownSignal {
        if !self.running.load(Ordering::SeqCst) {
            return CountdownSignal::Stopped;
        }

        let previous = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| {
                Some(r.saturating_sub(1))
            })
            .unwrap_or(0);

        let remaining = previous.saturating_sub(1);

        if remaining == 0 {
            self.running.store(false, Ordering::SeqCst);
            if previous > 0 {
                CountdownSignal::Expired
            } else {
                CountdownSignal::Stopped
            }
        } else {
            CountdownSignal::Running { remaining }
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining.load(Ordering::SeqCst)
    }

    /// Seconds elapsed since the countdown started
    pub fn elapsed(&self) -> u64 {
        self.max_secs - self.remaining()
    }

    pub fn max_secs(&self) -> u64 {
        self.max_secs
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop counting. Calling this when already stopped is a no-op.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Restore the full duration. Only valid once the session is idle.
    pub fn reset(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.remaining.store(self.max_secs, Ordering::SeqCst);
    }
}
