//! Abort signals.
//!
//! An [`AbortSignal`] is the read side of a [`CancelScope`](super::scope::CancelScope).
//! It can be cloned freely and handed to transports, timers and callers.

use futures_util::future::{self, BoxFuture, FutureExt};
use tokio_util::sync::CancellationToken;

/// Read side of a cancellation scope.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    pub(crate) fn from_token(token: CancellationToken) -> Self {
        Self { token }
    }

    /// A signal that can never fire.
    pub fn never() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// True once the owning scope has been cancelled.
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the signal fires, immediately if it already has.
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }

    /// Snapshot the signal state into a future, at the moment of the call.
    ///
    /// A signal that is already aborted yields a future that never completes;
    /// callers are expected to have checked [`is_aborted`](Self::is_aborted)
    /// before racing on it. Otherwise the future completes on abort.
    pub fn watch(&self) -> BoxFuture<'static, ()> {
        if self.is_aborted() {
            future::pending().boxed()
        } else {
            self.token.clone().cancelled_owned().boxed()
        }
    }

    /// Like [`watch`](Self::watch), but fails fast: `Err` right away when
    /// already aborted.
    pub fn watch_or_fail(&self) -> Result<BoxFuture<'static, ()>, Aborted> {
        if self.is_aborted() {
            Err(Aborted)
        } else {
            Ok(self.token.clone().cancelled_owned().boxed())
        }
    }
}

/// Returned by [`AbortSignal::watch_or_fail`] for an already-aborted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("signal already aborted")]
pub struct Aborted;
