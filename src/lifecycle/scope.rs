//! Cancellation scopes.
//!
//! A [`CancelScope`] is a `{signal, cancel()}` pair. An orchestrator owns one
//! through a [`ScopeCell`], which swaps in a fresh scope as soon as the
//! current one is cancelled so the orchestrator stays usable:
//!
//! ```text
//! scope := fresh()
//! on abort(scope): scope := fresh()
//! ```

use arc_swap::ArcSwap;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

use crate::lifecycle::signals::AbortSignal;

/// A cancellation controller with its signal.
#[derive(Debug, Default)]
pub struct CancelScope {
    token: CancellationToken,
}

impl CancelScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The signal observed by everything this scope can cancel.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal::from_token(self.token.clone())
    }

    /// Cancel the scope. Repeated calls have no further effect.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Instance-level scope that refreshes itself after every abort.
#[derive(Debug)]
pub struct ScopeCell {
    current: ArcSwap<CancelScope>,
}

impl ScopeCell {
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(CancelScope::new()),
        }
    }

    /// The live scope. An aborted scope is replaced before being returned.
    pub fn current(&self) -> Arc<CancelScope> {
        let scope = self.current.load_full();
        if scope.is_aborted() {
            self.refresh(&scope)
        } else {
            scope
        }
    }

    /// Cancel the live scope and install a fresh one.
    ///
    /// The replacement happens before this returns, so a call issued right
    /// after (even from an abort hook) sees a non-aborted scope.
    pub fn abort(&self) {
        let scope = self.current.load_full();
        scope.cancel();
        self.refresh(&scope);
        tracing::debug!("Instance scope aborted and refreshed");
    }

    fn refresh(&self, stale: &Arc<CancelScope>) -> Arc<CancelScope> {
        let fresh = Arc::new(CancelScope::new());
        let prev = self.current.compare_and_swap(stale, fresh.clone());
        if Arc::ptr_eq(&*prev, stale) {
            fresh
        } else {
            // Another caller refreshed first.
            arc_swap::Guard::into_inner(prev)
        }
    }
}

impl Default for ScopeCell {
    fn default() -> Self {
        Self::new()
    }
}

/// A detached `abort` accessor.
///
/// Always cancels the scope that is live at the moment of the call, never a
/// scope captured earlier. Holds the cell weakly; aborting after the
/// orchestrator is gone does nothing.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    cell: Weak<ScopeCell>,
}

impl AbortHandle {
    pub fn new(cell: &Arc<ScopeCell>) -> Self {
        Self {
            cell: Arc::downgrade(cell),
        }
    }

    pub fn abort(&self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.abort();
        }
    }
}
