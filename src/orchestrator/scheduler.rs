//! Attempt scheduling for one logical call.
//!
//! # Responsibilities
//! - Dispatch attempts strictly one after another
//! - Race each attempt against its timer and both abort signals
//! - Decide between retrying and settling, and wait out the backoff
//!
//! # Data Flow
//! ```text
//! DISPATCH ──outer aborted──────────────────────────────▶ TERMINAL(aborted)
//!    │
//!    ▼
//! RACE: transport | timer | instance abort | outer abort
//!    │
//!    ├── ok response / aborted ─────────────────────────▶ TERMINAL
//!    ▼
//! DECIDE: predicates && attempt + 1 < limit
//!    ├── abort while predicates run ────────────────────▶ TERMINAL(aborted)
//!    ├── no ────────────────────────────────────────────▶ TERMINAL(error)
//!    ▼
//! BACKOFF: timer | instance abort | outer abort ──abort─▶ TERMINAL(aborted)
//!    │
//!    └──▶ RACE
//! ```
//!
//! # Design Decisions
//! - Per-call state lives in [`CallState`]; nothing is shared between calls
//!   except the instance scope
//! - The instance signal is captured at dispatch, so aborting the instance
//!   reaches every call dispatched before the abort
//! - Every timer is cleared when its race settles, on every path

use futures_util::future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::FetchResult;
use crate::http::request::RequestInit;
use crate::http::transport::Transport;
use crate::lifecycle::{AbortSignal, CancelScope, ScopeCell};
use crate::observability::metrics;
use crate::orchestrator::context::{ConcurrencyMode, ConfigContext};
use crate::orchestrator::hooks::{AbortEvent, RetryEvent, TimeoutEvent};
use crate::orchestrator::outcome::Outcome;
use crate::resilience::retries::should_retry;
use crate::resilience::timeouts::AbortableDelay;

/// Number of logical calls in flight on one instance.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    count: AtomicUsize,
}

impl InFlight {
    pub(crate) fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            tracker: self.clone(),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Marks a call in flight until dropped.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    tracker: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct CallState {
    /// 0-based index of the current attempt.
    attempt: u32,
    retries: u32,
}

/// One invocation of an orchestrator.
pub(crate) struct LogicalCall<T: Transport> {
    transport: Arc<T>,
    context: Arc<ConfigContext<T::Response>>,
    resource: String,
    init: RequestInit,
    instance: AbortSignal,
    outer: AbortSignal,
    call_id: Uuid,
    _in_flight: InFlightGuard,
}

impl<T: Transport> LogicalCall<T> {
    /// Synchronous part of a call: single-mode cancellation, init defaults
    /// and signal capture.
    pub(crate) fn dispatch(
        transport: Arc<T>,
        context: Arc<ConfigContext<T::Response>>,
        scope: &ScopeCell,
        in_flight: &Arc<InFlight>,
        resource: String,
        init: RequestInit,
    ) -> Self {
        if context.mode() == ConcurrencyMode::Single && in_flight.count() > 0 {
            tracing::debug!(resource = %resource, "Cancelling in-flight call");
            scope.abort();
        }

        let mut init = context.init().resolve(init);
        let outer = init.signal.take().unwrap_or_else(AbortSignal::never);

        Self {
            transport,
            context,
            resource,
            init,
            instance: scope.current().signal(),
            outer,
            call_id: Uuid::new_v4(),
            _in_flight: in_flight.enter(),
        }
    }

    pub(crate) async fn run(self) -> FetchResult<T::Response> {
        let span = tracing::info_span!(
            "refetch",
            call_id = %self.call_id,
            resource = %self.resource
        );
        self.drive().instrument(span).await
    }

    async fn drive(self) -> FetchResult<T::Response> {
        let start = Instant::now();
        let limit = self.context.attempt_limit();
        let mut state = CallState::default();

        if self.outer.is_aborted() {
            tracing::debug!("Caller signal already aborted, no attempt dispatched");
            return self.finish(Outcome::Aborted, &state, start);
        }

        loop {
            let outcome = self.attempt(&state).await;
            metrics::record_attempt(outcome.label());
            tracing::debug!(attempt = state.attempt, outcome = outcome.label(), "Attempt settled");

            if outcome.is_success() || outcome.is_aborted() {
                return self.finish(outcome, &state, start);
            }

            let retry = tokio::select! {
                biased;
                _ = self.instance.aborted() => None,
                _ = self.outer.aborted() => None,
                retry = should_retry(self.context.predicates(), &outcome) => Some(retry),
            };
            let Some(retry) = retry else {
                tracing::debug!("Aborted while evaluating retry predicates");
                return self.finish(Outcome::Aborted, &state, start);
            };
            if !retry || state.attempt + 1 >= limit {
                return self.finish(outcome, &state, start);
            }

            state.retries += 1;
            let delay = self.context.delay().delay(state.retries);
            metrics::record_retry();
            tracing::info!(
                attempt = state.attempt + 1,
                retries = state.retries,
                delay = ?delay,
                outcome = outcome.label(),
                "Retrying request"
            );

            if !self.backoff(delay).await {
                return self.finish(Outcome::Aborted, &state, start);
            }

            self.context.hooks().retry(&RetryEvent {
                call_id: self.call_id,
                resource: self.resource.clone(),
                retry: state.retries,
                delay,
                max: limit,
            });
            state.attempt += 1;
        }
    }

    async fn attempt(&self, state: &CallState) -> Outcome<T::Response> {
        let inner = CancelScope::new();
        let timeout = self.context.timeout();
        let timer = timeout.map(AbortableDelay::new);

        let timed_out = async {
            match &timer {
                Some(timer) => timer.elapsed().await,
                None => future::pending().await,
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = self.instance.aborted() => Outcome::Aborted,
            _ = self.outer.aborted() => Outcome::Aborted,
            Ok(()) = timed_out => Outcome::Timeout(timeout.unwrap_or_default()),
            result = self.transport.perform(&self.resource, &self.init, inner.signal()) => {
                match result {
                    Ok(response) => Outcome::Response(response),
                    Err(e) => Outcome::Error(Arc::new(e)),
                }
            }
        };

        // The transport lost the race; cancel whatever it left running.
        if matches!(outcome, Outcome::Timeout(_) | Outcome::Aborted) {
            inner.cancel();
        }
        if let Some(timer) = &timer {
            timer.clear();
        }

        if let Outcome::Timeout(after) = outcome {
            metrics::record_timeout();
            tracing::warn!(attempt = state.attempt, timeout = ?after, "Attempt timed out");
            self.context.hooks().timeout(&TimeoutEvent {
                call_id: self.call_id,
                resource: self.resource.clone(),
                attempt: state.attempt,
                timeout: after,
            });
        }

        outcome
    }

    /// Wait out a backoff delay. `false` if the call was aborted meanwhile.
    async fn backoff(&self, delay: Duration) -> bool {
        let timer = AbortableDelay::new(delay);

        tokio::select! {
            biased;
            _ = self.instance.aborted() => false,
            _ = self.outer.aborted() => false,
            waited = timer.elapsed() => waited.is_ok(),
        }
    }

    fn finish(
        &self,
        outcome: Outcome<T::Response>,
        state: &CallState,
        start: Instant,
    ) -> FetchResult<T::Response> {
        let label = outcome.label();

        match &outcome {
            Outcome::Aborted => {
                tracing::info!(attempt = state.attempt, "Call aborted");
                self.context.hooks().abort(&AbortEvent {
                    call_id: self.call_id,
                    resource: self.resource.clone(),
                    attempt: state.attempt,
                });
            }
            outcome if outcome.is_success() => {
                tracing::debug!(attempts = state.attempt + 1, "Call succeeded");
            }
            outcome => {
                let error = outcome.error().map(ToString::to_string);
                tracing::warn!(
                    attempts = state.attempt + 1,
                    outcome = label,
                    error = ?error,
                    "Call failed"
                );
            }
        }

        metrics::record_call(label, start);
        outcome.into_result()
    }
}
