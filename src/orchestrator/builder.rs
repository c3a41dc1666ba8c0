//! Fluent configuration.
//!
//! # Design Decisions
//! - Every modifier returns a new orchestrator bound to a new context and a
//!   new scope; the receiver is left untouched
//! - A modifier that would not change anything returns the same instance
//! - `None` arguments reset the field to its factory default

use std::time::Duration;

use crate::http::request::InitDefaults;
use crate::http::transport::Transport;
use crate::orchestrator::context::{
    AttemptLimit, ConcurrencyMode, ConfigContext, ConfigPatch, Override,
};
use crate::orchestrator::hooks::{AbortEvent, Hooks, RetryEvent, TimeoutEvent};
use crate::orchestrator::refetch::Refetch;
use crate::resilience::backoff::DelayConfig;
use crate::resilience::retries::RetryPredicate;
use crate::resilience::timeouts::clamp_timeout;

impl<T: Transport> Refetch<T> {
    fn rebuild(&self, context: ConfigContext<T::Response>) -> Self {
        Refetch::with_context(self.transport.clone(), context)
    }

    /// Apply a patch. Always builds a new instance.
    pub fn extend(&self, patch: ConfigPatch<T::Response>) -> Self {
        self.rebuild(self.context.patched(patch))
    }

    /// Start over from the factory defaults, then apply the patch.
    pub fn fresh(&self, patch: ConfigPatch<T::Response>) -> Self {
        self.rebuild(ConfigContext::default().patched(patch))
    }

    /// Backoff between attempts: milliseconds, a [`Duration`], a
    /// [`DelaySequence`](crate::resilience::backoff::DelaySequence) or
    /// [`DelayConfig::Default`] to reset.
    pub fn delay(&self, delay: impl Into<DelayConfig>) -> Self {
        let sequence = delay.into().into_sequence();
        if &sequence == self.context.delay() {
            return self.clone();
        }

        self.extend(ConfigPatch {
            delay: Override::Set(DelayConfig::Sequence(sequence)),
            ..ConfigPatch::default()
        })
    }

    /// Multiply the current delay sequence.
    pub fn amplify(&self, factor: u32) -> Self {
        let sequence = self.context.delay().amplify(factor);
        if &sequence == self.context.delay() {
            return self.clone();
        }

        self.extend(ConfigPatch {
            delay: Override::Set(DelayConfig::Sequence(sequence)),
            ..ConfigPatch::default()
        })
    }

    /// Defaults for per-call options.
    pub fn init(&self, defaults: impl Into<Option<InitDefaults>>) -> Self {
        let defaults: Option<InitDefaults> = defaults.into();
        self.extend(ConfigPatch {
            init: defaults.into(),
            ..ConfigPatch::default()
        })
    }

    /// Attempts per call. `0` is unlimited, `None` resets.
    pub fn limit(&self, limit: impl Into<Option<u32>>) -> Self {
        let limit = limit.into();
        let resolved = limit.map(AttemptLimit::from_count).unwrap_or_default();
        if resolved == self.context.limit() {
            return self.clone();
        }

        self.extend(ConfigPatch {
            limit: limit.into(),
            ..ConfigPatch::default()
        })
    }

    /// Calls run side by side.
    pub fn many(&self) -> Self {
        self.mode(ConcurrencyMode::Multiple)
    }

    /// A new call cancels the previous one.
    pub fn one(&self) -> Self {
        self.mode(ConcurrencyMode::Single)
    }

    fn mode(&self, mode: ConcurrencyMode) -> Self {
        if mode == self.context.mode() {
            return self.clone();
        }

        self.extend(ConfigPatch {
            mode: Override::Set(mode),
            ..ConfigPatch::default()
        })
    }

    /// Replace the retry predicates. An empty list disables retries.
    pub fn retry(&self, predicates: impl IntoIterator<Item = RetryPredicate<T::Response>>) -> Self {
        let predicates: Vec<_> = predicates.into_iter().collect();
        let current = self.context.predicates();
        let unchanged = predicates.len() == current.len()
            && predicates.iter().zip(current).all(|(a, b)| a.ptr_eq(b));
        if unchanged {
            return self.clone();
        }

        let predicates = if predicates.is_empty() {
            Override::Reset
        } else {
            Override::Set(predicates)
        };

        self.extend(ConfigPatch {
            predicates,
            ..ConfigPatch::default()
        })
    }

    /// Per-attempt timeout. Zero disables, `None` resets; other values are
    /// clamped to the accepted range.
    pub fn timeout(&self, timeout: impl Into<Option<Duration>>) -> Self {
        let timeout = timeout.into();
        if timeout.and_then(clamp_timeout) == self.context.timeout() {
            return self.clone();
        }

        self.extend(ConfigPatch {
            timeout: timeout.into(),
            ..ConfigPatch::default()
        })
    }

    pub fn on_retry(&self, hook: impl Fn(&RetryEvent) + Send + Sync + 'static) -> Self {
        self.with_hooks(Hooks {
            on_retry: Some(std::sync::Arc::new(hook)),
            ..self.context.hooks().clone()
        })
    }

    pub fn on_timeout(&self, hook: impl Fn(&TimeoutEvent) + Send + Sync + 'static) -> Self {
        self.with_hooks(Hooks {
            on_timeout: Some(std::sync::Arc::new(hook)),
            ..self.context.hooks().clone()
        })
    }

    pub fn on_abort(&self, hook: impl Fn(&AbortEvent) + Send + Sync + 'static) -> Self {
        self.with_hooks(Hooks {
            on_abort: Some(std::sync::Arc::new(hook)),
            ..self.context.hooks().clone()
        })
    }

    fn with_hooks(&self, hooks: Hooks) -> Self {
        self.extend(ConfigPatch {
            hooks: Override::Set(hooks),
            ..ConfigPatch::default()
        })
    }
}
