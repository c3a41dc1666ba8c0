//! Immutable configuration of an orchestrator.
//!
//! # Design Decisions
//! - A `ConfigContext` is never mutated once built; every builder call
//!   derives a new one
//! - Patches distinguish "keep the current value", "reset to the factory
//!   default" and "use this value" with [`Override`]

use std::num::NonZeroU32;
use std::time::Duration;

use crate::http::request::InitDefaults;
use crate::orchestrator::hooks::Hooks;
use crate::resilience::backoff::{DelayConfig, DelaySequence};
use crate::resilience::retries::RetryPredicate;
use crate::resilience::timeouts::clamp_timeout;

/// Attempts per logical call when nothing else is configured.
pub const DEFAULT_ATTEMPT_LIMIT: u32 = 1;

/// Whether a new call cancels the instance's previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyMode {
    /// Calls run side by side and share the instance scope.
    #[default]
    Multiple,
    /// Starting a call cancels the one in flight.
    Single,
}

/// Maximum number of attempts per logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptLimit {
    Bounded(NonZeroU32),
    /// As many attempts as the delay sequence has retries, plus the first.
    Unlimited,
}

impl AttemptLimit {
    /// `0` means unlimited.
    pub fn from_count(count: u32) -> Self {
        match NonZeroU32::new(count) {
            Some(n) => AttemptLimit::Bounded(n),
            None => AttemptLimit::Unlimited,
        }
    }

    /// Concrete attempt count under the given sequence.
    pub fn resolve(&self, sequence: &DelaySequence) -> u32 {
        match self {
            AttemptLimit::Bounded(n) => n.get(),
            AttemptLimit::Unlimited => sequence.retries().saturating_add(1),
        }
    }
}

impl Default for AttemptLimit {
    fn default() -> Self {
        AttemptLimit::from_count(DEFAULT_ATTEMPT_LIMIT)
    }
}

/// Settings shared by every call of one orchestrator instance.
#[derive(Debug, Clone)]
pub struct ConfigContext<R> {
    pub(crate) mode: ConcurrencyMode,
    pub(crate) limit: AttemptLimit,
    pub(crate) timeout: Option<Duration>,
    pub(crate) delay: DelaySequence,
    pub(crate) predicates: Vec<RetryPredicate<R>>,
    pub(crate) init: InitDefaults,
    pub(crate) hooks: Hooks,
}

impl<R> Default for ConfigContext<R> {
    fn default() -> Self {
        Self {
            mode: ConcurrencyMode::default(),
            limit: AttemptLimit::default(),
            timeout: None,
            delay: DelaySequence::default(),
            predicates: Vec::new(),
            init: InitDefaults::default(),
            hooks: Hooks::default(),
        }
    }
}

impl<R> ConfigContext<R> {
    pub fn mode(&self) -> ConcurrencyMode {
        self.mode
    }

    pub fn limit(&self) -> AttemptLimit {
        self.limit
    }

    /// Attempts per logical call, with unlimited resolved against the delay
    /// sequence.
    pub fn attempt_limit(&self) -> u32 {
        self.limit.resolve(&self.delay)
    }

    /// `None` when attempts are not timed.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn delay(&self) -> &DelaySequence {
        &self.delay
    }

    pub fn predicates(&self) -> &[RetryPredicate<R>] {
        &self.predicates
    }

    pub fn init(&self) -> &InitDefaults {
        &self.init
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }
}

/// How a patch treats one field.
#[derive(Debug, Clone, Default)]
pub enum Override<T> {
    /// Keep the current value.
    #[default]
    Inherit,
    /// Restore the factory default.
    Reset,
    /// Replace the value.
    Set(T),
}

impl<T> Override<T> {
    fn apply(self, current: T, reset: impl FnOnce() -> T) -> T {
        match self {
            Override::Inherit => current,
            Override::Reset => reset(),
            Override::Set(value) => value,
        }
    }
}

impl<T> From<Option<T>> for Override<T> {
    /// `None` resets, matching the modifiers.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Override::Set(value),
            None => Override::Reset,
        }
    }
}

/// A set of field overrides, applied by `Refetch::extend`.
#[derive(Debug, Clone)]
pub struct ConfigPatch<R> {
    pub mode: Override<ConcurrencyMode>,
    /// Attempt count, `0` for unlimited.
    pub limit: Override<u32>,
    /// Attempt timeout, zero disables.
    pub timeout: Override<Duration>,
    pub delay: Override<DelayConfig>,
    pub predicates: Override<Vec<RetryPredicate<R>>>,
    pub init: Override<InitDefaults>,
    pub hooks: Override<Hooks>,
}

impl<R> Default for ConfigPatch<R> {
    fn default() -> Self {
        Self {
            mode: Override::Inherit,
            limit: Override::Inherit,
            timeout: Override::Inherit,
            delay: Override::Inherit,
            predicates: Override::Inherit,
            init: Override::Inherit,
            hooks: Override::Inherit,
        }
    }
}

impl<R> ConfigContext<R> {
    /// A new context with the patch applied field by field.
    pub fn patched(&self, patch: ConfigPatch<R>) -> Self {
        let defaults = Self::default();

        Self {
            mode: patch.mode.apply(self.mode, || defaults.mode),
            limit: match patch.limit {
                Override::Inherit => self.limit,
                Override::Reset => defaults.limit,
                Override::Set(count) => AttemptLimit::from_count(count),
            },
            timeout: match patch.timeout {
                Override::Inherit => self.timeout,
                Override::Reset => defaults.timeout,
                Override::Set(timeout) => clamp_timeout(timeout),
            },
            delay: match patch.delay {
                Override::Inherit => self.delay.clone(),
                Override::Reset => defaults.delay.clone(),
                Override::Set(delay) => delay.into_sequence(),
            },
            predicates: patch
                .predicates
                .apply(self.predicates.clone(), Vec::new),
            init: patch.init.apply(self.init.clone(), InitDefaults::default),
            hooks: patch.hooks.apply(self.hooks.clone(), Hooks::default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::InitDefault;
    use crate::http::response::HttpResponse;
    use crate::resilience::backoff::DEFAULT_MAX_RETRIES;
    use crate::resilience::timeouts::MINIMUM_TIMEOUT_MS;
    use reqwest::Method;

    type Ctx = ConfigContext<HttpResponse>;

    fn configured() -> Ctx {
        Ctx::default().patched(ConfigPatch {
            mode: Override::Set(ConcurrencyMode::Single),
            limit: Override::Set(4),
            timeout: Override::Set(Duration::from_millis(250)),
            delay: Override::Set(DelayConfig::Sequence(DelaySequence::fibonacci())),
            predicates: Override::Set(vec![RetryPredicate::always()]),
            init: Override::Set(InitDefaults::new().with(InitDefault::Method(Method::PUT))),
            hooks: Override::Inherit,
        })
    }

    #[test]
    fn test_factory_defaults() {
        let ctx = Ctx::default();
        assert_eq!(ctx.mode(), ConcurrencyMode::Multiple);
        assert_eq!(ctx.attempt_limit(), DEFAULT_ATTEMPT_LIMIT);
        assert_eq!(ctx.timeout(), None);
        assert_eq!(ctx.delay(), &DelaySequence::default());
        assert!(ctx.predicates().is_empty());
        assert!(ctx.init().is_empty());
        assert!(ctx.hooks().is_empty());
    }

    #[test]
    fn test_empty_patch_round_trips() {
        let ctx = configured();
        let copy = ctx.patched(ConfigPatch::default());

        assert_eq!(copy.mode(), ctx.mode());
        assert_eq!(copy.limit(), ctx.limit());
        assert_eq!(copy.timeout(), ctx.timeout());
        assert_eq!(copy.delay(), ctx.delay());
        assert_eq!(copy.predicates().len(), 1);
        assert!(copy.predicates()[0].ptr_eq(&ctx.predicates()[0]));
        assert_eq!(copy.init().len(), 1);
    }

    #[test]
    fn test_reset_restores_factory_default() {
        let ctx = configured().patched(ConfigPatch {
            limit: Override::Reset,
            timeout: Override::Reset,
            delay: Override::Reset,
            ..ConfigPatch::default()
        });

        assert_eq!(ctx.attempt_limit(), DEFAULT_ATTEMPT_LIMIT);
        assert_eq!(ctx.timeout(), None);
        assert_eq!(ctx.delay(), &DelaySequence::default());
        // Untouched fields keep their values
        assert_eq!(ctx.mode(), ConcurrencyMode::Single);
        assert_eq!(ctx.predicates().len(), 1);
    }

    #[test]
    fn test_limit_zero_is_unlimited() {
        let ctx = Ctx::default().patched(ConfigPatch {
            limit: Override::Set(0),
            ..ConfigPatch::default()
        });

        assert_eq!(ctx.limit(), AttemptLimit::Unlimited);
        assert_eq!(ctx.attempt_limit(), DEFAULT_MAX_RETRIES + 1);

        let short = ctx.patched(ConfigPatch {
            delay: Override::Set(DelayConfig::Sequence(DelaySequence::fibonacci().with_retries(3))),
            ..ConfigPatch::default()
        });
        assert_eq!(short.attempt_limit(), 4);
    }

    #[test]
    fn test_timeout_is_clamped() {
        let ctx = Ctx::default().patched(ConfigPatch {
            timeout: Override::Set(Duration::from_millis(1)),
            ..ConfigPatch::default()
        });
        assert_eq!(ctx.timeout(), Some(Duration::from_millis(MINIMUM_TIMEOUT_MS)));

        let ctx = ctx.patched(ConfigPatch {
            timeout: Override::Set(Duration::ZERO),
            ..ConfigPatch::default()
        });
        assert_eq!(ctx.timeout(), None);
    }

    #[test]
    fn test_override_from_option() {
        assert!(matches!(Override::from(Some(3u32)), Override::Set(3)));
        assert!(matches!(Override::<u32>::from(None), Override::Reset));
    }
}
