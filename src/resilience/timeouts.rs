//! Timeout enforcement.
//!
//! # Responsibilities
//! - Normalize requested attempt timeouts
//! - Provide a cancellable timer for attempt timeouts and backoff waits
//!
//! # Design Decisions
//! - A timer starts counting when it is created, not when first polled
//! - Clearing is idempotent and also happens on drop
//! - An elapsed timer counts as cleared; it can fire only once

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::lifecycle::CancelScope;

/// Smallest accepted non-zero timeout.
pub const MINIMUM_TIMEOUT_MS: u64 = 50;

/// Timeout suggested to callers that want one but have no preference.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Largest accepted timeout.
pub const MAXIMUM_TIMEOUT_MS: u64 = 100_000;

/// Normalize a requested attempt timeout.
///
/// Zero disables the timeout (`None`); anything else is clamped to
/// `[MINIMUM_TIMEOUT_MS, MAXIMUM_TIMEOUT_MS]`.
pub fn clamp_timeout(requested: Duration) -> Option<Duration> {
    if requested.is_zero() {
        return None;
    }

    Some(requested.clamp(
        Duration::from_millis(MINIMUM_TIMEOUT_MS),
        Duration::from_millis(MAXIMUM_TIMEOUT_MS),
    ))
}

/// Returned when a timer is cleared before it elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("delay cleared before it elapsed")]
pub struct DelayCleared;

/// A timer that can be cleared before it fires.
#[derive(Debug)]
pub struct AbortableDelay {
    deadline: Instant,
    duration: Duration,
    scope: CancelScope,
    cleared: AtomicBool,
}

impl AbortableDelay {
    pub fn new(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
            duration,
            scope: CancelScope::new(),
            cleared: AtomicBool::new(false),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Wait for the timer. `Err` if it was cleared first.
    pub async fn elapsed(&self) -> Result<(), DelayCleared> {
        let signal = self.scope.signal();

        tokio::select! {
            biased;
            _ = signal.aborted() => Err(DelayCleared),
            _ = tokio::time::sleep_until(self.deadline) => {
                if self.clear() {
                    Ok(())
                } else {
                    Err(DelayCleared)
                }
            }
        }
    }

    /// Clear the timer. Returns `true` only for the call that cleared it.
    pub fn clear(&self) -> bool {
        let first = !self.cleared.swap(true, Ordering::SeqCst);
        if first {
            self.scope.cancel();
        }
        first
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared.load(Ordering::SeqCst)
    }
}

impl Drop for AbortableDelay {
    fn drop(&mut self) {
        self.clear();
    }
}
