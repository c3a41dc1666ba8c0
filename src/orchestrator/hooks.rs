//! Lifecycle hooks fired by the scheduler.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A retried attempt is about to be dispatched.
#[derive(Debug, Clone)]
pub struct RetryEvent {
    pub call_id: Uuid,
    pub resource: String,
    /// Retries so far, this one included.
    pub retry: u32,
    /// Backoff waited before this retry.
    pub delay: Duration,
    /// Attempt limit of the call.
    pub max: u32,
}

/// An attempt timer fired.
#[derive(Debug, Clone)]
pub struct TimeoutEvent {
    pub call_id: Uuid,
    pub resource: String,
    pub attempt: u32,
    pub timeout: Duration,
}

/// A logical call was aborted.
#[derive(Debug, Clone)]
pub struct AbortEvent {
    pub call_id: Uuid,
    pub resource: String,
    pub attempt: u32,
}

pub type Hook<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Hooks of a configuration. Cloning shares the callbacks.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_retry: Option<Hook<RetryEvent>>,
    pub on_timeout: Option<Hook<TimeoutEvent>>,
    pub on_abort: Option<Hook<AbortEvent>>,
}

impl Hooks {
    pub(crate) fn retry(&self, event: &RetryEvent) {
        if let Some(hook) = &self.on_retry {
            hook(event);
        }
    }

    pub(crate) fn timeout(&self, event: &TimeoutEvent) {
        if let Some(hook) = &self.on_timeout {
            hook(event);
        }
    }

    pub(crate) fn abort(&self, event: &AbortEvent) {
        if let Some(hook) = &self.on_abort {
            hook(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.on_retry.is_none() && self.on_timeout.is_none() && self.on_abort.is_none()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_retry", &self.on_retry.is_some())
            .field("on_timeout", &self.on_timeout.is_some())
            .field("on_abort", &self.on_abort.is_some())
            .finish()
    }
}
