//! Retry decisions.
//!
//! # Responsibilities
//! - Run user-supplied predicates against a failed attempt
//! - Provide the common predicates (any error, network error, timeout, 5xx)
//!
//! # Design Decisions
//! - Predicates run sequentially in registration order and stop at the
//!   first `true`; predicates may rely on the side effects of earlier ones
//! - Each predicate gets its own clone of the outcome
//! - A predicate that fails or panics counts as `false`
//! - No predicates means no retries
//! - An aborted attempt is never retried

use futures_util::future::{BoxFuture, FutureExt};
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use crate::http::response::ResponseLike;
use crate::orchestrator::outcome::Outcome;

/// Error type predicates may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type PredicateFn<R> =
    Arc<dyn Fn(Outcome<R>) -> BoxFuture<'static, Result<bool, BoxError>> + Send + Sync>;

/// A named, possibly asynchronous retry predicate.
pub struct RetryPredicate<R> {
    name: Cow<'static, str>,
    f: PredicateFn<R>,
}

impl<R> Clone for RetryPredicate<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            f: self.f.clone(),
        }
    }
}

impl<R> fmt::Debug for RetryPredicate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RetryPredicate").field(&self.name).finish()
    }
}

impl<R: ResponseLike> RetryPredicate<R> {
    /// An asynchronous predicate.
    pub fn new<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Outcome<R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(move |outcome| f(outcome).boxed()),
        }
    }

    /// A synchronous, infallible predicate.
    pub fn from_fn<F>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(&Outcome<R>) -> bool + Send + Sync + 'static,
    {
        Self::new(name, move |outcome| {
            let retry = f(&outcome);
            async move { Ok(retry) }
        })
    }

    /// Retry after anything that is not a response.
    pub fn any_error() -> Self {
        Self::from_fn("any_error", |outcome| outcome.response().is_none())
    }

    /// Retry after transport failures only.
    pub fn network_error() -> Self {
        Self::from_fn("network_error", |outcome| matches!(outcome, Outcome::Error(_)))
    }

    /// Retry after the attempt timer fired.
    pub fn timeout() -> Self {
        Self::from_fn("timeout", |outcome| outcome.is_timeout())
    }

    /// Retry after a 5xx response.
    pub fn server_error() -> Self {
        Self::from_fn("server_error", |outcome| {
            outcome
                .response()
                .is_some_and(|response| (500..600).contains(&response.status()))
        })
    }

    /// Retry after a non-ok response with one of the given status codes.
    pub fn status(codes: impl IntoIterator<Item = u16>) -> Self {
        let codes: Vec<u16> = codes.into_iter().collect();
        Self::from_fn("status", move |outcome| {
            outcome
                .response()
                .is_some_and(|response| !response.ok() && codes.contains(&response.status()))
        })
    }

    /// Retry after every failure.
    pub fn always() -> Self {
        Self::from_fn("always", |_| true)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Same underlying function.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.f, &other.f)
    }

    async fn evaluate(&self, outcome: Outcome<R>) -> bool {
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| (self.f)(outcome))) {
            Ok(future) => future,
            Err(_) => {
                tracing::warn!(predicate = %self.name, "Retry predicate panicked");
                return false;
            }
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(retry)) => retry,
            Ok(Err(e)) => {
                tracing::debug!(predicate = %self.name, error = %e, "Retry predicate failed");
                false
            }
            Err(_) => {
                tracing::warn!(predicate = %self.name, "Retry predicate panicked");
                false
            }
        }
    }
}

/// Decide whether a failed attempt should be retried.
pub async fn should_retry<R: ResponseLike>(
    predicates: &[RetryPredicate<R>],
    outcome: &Outcome<R>,
) -> bool {
    if outcome.is_aborted() {
        return false;
    }

    for predicate in predicates {
        if predicate.evaluate(outcome.clone()).await {
            tracing::trace!(
                predicate = %predicate.name(),
                outcome = outcome.label(),
                "Retry predicate matched"
            );
            return true;
        }
    }

    false
}

/// Built-in predicates selectable by name in config files and on the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTrigger {
    AnyError,
    NetworkError,
    Timeout,
    ServerError,
    Always,
}

impl RetryTrigger {
    pub fn predicate<R: ResponseLike>(self) -> RetryPredicate<R> {
        match self {
            RetryTrigger::AnyError => RetryPredicate::any_error(),
            RetryTrigger::NetworkError => RetryPredicate::network_error(),
            RetryTrigger::Timeout => RetryPredicate::timeout(),
            RetryTrigger::ServerError => RetryPredicate::server_error(),
            RetryTrigger::Always => RetryPredicate::always(),
        }
    }
}

impl FromStr for RetryTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" | "any-error" => Ok(RetryTrigger::AnyError),
            "network" | "network-error" => Ok(RetryTrigger::NetworkError),
            "timeout" => Ok(RetryTrigger::Timeout),
            "server-error" | "5xx" => Ok(RetryTrigger::ServerError),
            "always" => Ok(RetryTrigger::Always),
            other => Err(format!("unknown retry trigger '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::http::response::HttpResponse;
    use reqwest::StatusCode;
    use std::sync::Mutex;
    use std::time::Duration;

    type P = RetryPredicate<HttpResponse>;

    fn failure() -> Outcome<HttpResponse> {
        Outcome::Error(Arc::new(TransportError::other("reset")))
    }

    fn status(code: StatusCode) -> Outcome<HttpResponse> {
        Outcome::Response(HttpResponse::new(code, ""))
    }

    #[tokio::test]
    async fn test_no_predicates_never_retry() {
        assert!(!should_retry::<HttpResponse>(&[], &failure()).await);
        let timeout = Outcome::Timeout(Duration::from_millis(50));
        assert!(!should_retry::<HttpResponse>(&[], &timeout).await);
    }

    #[tokio::test]
    async fn test_abort_is_vetoed() {
        assert!(!should_retry(&[P::always()], &Outcome::Aborted).await);
    }

    #[tokio::test]
    async fn test_sequential_short_circuit() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = |name: &'static str, answer: bool| {
            let seen = seen.clone();
            P::from_fn(name, move |_| {
                seen.lock().unwrap().push(name);
                answer
            })
        };

        let predicates = [record("a", false), record("b", true), record("c", true)];
        assert!(should_retry(&predicates, &failure()).await);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);

        seen.lock().unwrap().clear();
        let predicates = [record("a", false), record("b", false)];
        assert!(!should_retry(&predicates, &failure()).await);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_failing_predicates_count_as_false() {
        let failing = P::new("failing", |_| async { Err::<bool, BoxError>("boom".into()) });
        let panicking = P::from_fn("panicking", |_| panic!("predicate bug"));
        let panicking_async = P::new("panicking_async", |_| async {
            if true {
                panic!("async predicate bug");
            }
            Ok(true)
        });

        let broken = [failing, panicking, panicking_async];
        assert!(!should_retry(&broken, &failure()).await);

        let [failing, panicking, panicking_async] = broken;
        let with_fallback = [failing, panicking, panicking_async, P::always()];
        assert!(should_retry(&with_fallback, &failure()).await);
    }

    #[tokio::test]
    async fn test_async_predicate() {
        let slow = P::new("slow", |outcome| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(outcome.response().is_some_and(|r| r.status() == 429))
        });

        assert!(should_retry(&[slow.clone()], &status(StatusCode::TOO_MANY_REQUESTS)).await);
        assert!(!should_retry(&[slow], &status(StatusCode::BAD_REQUEST)).await);
    }

    #[tokio::test]
    async fn test_builtin_predicates() {
        let timeout = Outcome::Timeout(Duration::from_millis(50));

        assert!(should_retry(&[P::any_error()], &failure()).await);
        assert!(should_retry(&[P::any_error()], &timeout).await);
        assert!(!should_retry(&[P::any_error()], &status(StatusCode::BAD_GATEWAY)).await);

        assert!(should_retry(&[P::network_error()], &failure()).await);
        assert!(!should_retry(&[P::network_error()], &timeout).await);

        assert!(should_retry(&[P::timeout()], &timeout).await);
        assert!(!should_retry(&[P::timeout()], &failure()).await);

        assert!(should_retry(&[P::server_error()], &status(StatusCode::SERVICE_UNAVAILABLE)).await);
        assert!(!should_retry(&[P::server_error()], &status(StatusCode::NOT_FOUND)).await);

        assert!(should_retry(&[P::status([404])], &status(StatusCode::NOT_FOUND)).await);
        assert!(!should_retry(&[P::status([404])], &status(StatusCode::GONE)).await);
    }

    #[tokio::test]
    async fn test_predicate_gets_its_own_clone() {
        let original = status(StatusCode::BAD_GATEWAY);
        let check = P::from_fn("clone", |outcome| outcome.response().is_some());
        assert!(should_retry(&[check], &original).await);
        assert!(original.response().is_some());
    }

    #[test]
    fn test_trigger_names() {
        assert_eq!("5xx".parse::<RetryTrigger>(), Ok(RetryTrigger::ServerError));
        assert_eq!("Network".parse::<RetryTrigger>(), Ok(RetryTrigger::NetworkError));
        assert!("sometimes".parse::<RetryTrigger>().is_err());
    }
}
