//! Delay sequences for retry backoff.
//!
//! A [`DelaySequence`] maps a retry index (1 for the first retry, 2 for the
//! second, ...) to the time waited before the next attempt is dispatched.
//!
//! # Built-in sequences
//! ```text
//! immediate     0, 0, 0, ...
//! default       100ms, 100ms, ...
//! fibonacci     fib(n) * n, capped at 1000ms
//! progressive   100ms doubled every 4 retries, capped at 500ms
//! exponential   base * 2^(n-1) + 0-10% jitter
//! ```
//!
//! Every sequence carries a `retries` cap. Indexes beyond the cap return the
//! value at the cap. All values are clamped to [`DELAY_CEILING_MS`] before the
//! amplifier is applied.

use rand::Rng;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Delay used by the `default` sequence.
pub const DEFAULT_DELAY_MS: u64 = 100;

/// Retry cap carried by sequences that were not given an explicit one.
pub const DEFAULT_MAX_RETRIES: u32 = 12;

/// Upper bound for any unamplified delay.
pub const DELAY_CEILING_MS: u64 = 30_000;

/// Largest accepted amplifier.
pub const MAX_AMPLIFICATION: u32 = 10;

/// Plateau of the fibonacci sequence.
pub const FIBONACCI_PLATEAU_MS: u64 = 1_000;

/// Step of the progressive sequence.
pub const PROGRESSIVE_BASE_MS: u64 = 100;

const PROGRESSIVE_MAX_FACTOR: u64 = 5;

// fib(93) is the largest Fibonacci number that fits in a u64.
const FIBONACCI_MAX_INDEX: u32 = 93;

type SequenceFn = Arc<dyn Fn(u32) -> u64 + Send + Sync>;

#[derive(Clone)]
enum Policy {
    Immediate,
    Constant(u64),
    Fibonacci,
    Progressive,
    Exponential { base_ms: u64 },
    Custom(SequenceFn),
}

/// A backoff policy: retry index to delay.
#[derive(Clone)]
pub struct DelaySequence {
    policy: Policy,
    retries: u32,
    amplifier: u32,
    /// First index whose bounded value equals the value at the cap.
    /// Shared between clones; depends only on `policy` and `retries`.
    plateau_index: Arc<OnceLock<u32>>,
}

impl DelaySequence {
    fn with_policy(policy: Policy) -> Self {
        Self {
            policy,
            retries: DEFAULT_MAX_RETRIES,
            amplifier: 1,
            plateau_index: Arc::new(OnceLock::new()),
        }
    }

    /// Always zero.
    pub fn immediate() -> Self {
        Self::with_policy(Policy::Immediate)
    }

    /// The same delay for every retry.
    pub fn constant(delay: Duration) -> Self {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        Self::with_policy(Policy::Constant(ms.min(DELAY_CEILING_MS)))
    }

    /// `fib(n) * n` milliseconds, capped at [`FIBONACCI_PLATEAU_MS`].
    pub fn fibonacci() -> Self {
        Self::with_policy(Policy::Fibonacci)
    }

    /// [`PROGRESSIVE_BASE_MS`] doubled every four retries, saturating at 5x.
    pub fn progressive() -> Self {
        Self::with_policy(Policy::Progressive)
    }

    /// Exponential backoff with up to 10% jitter.
    pub fn exponential(base: Duration) -> Self {
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        Self::with_policy(Policy::Exponential { base_ms })
    }

    /// A caller supplied sequence, in milliseconds.
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> u64 + Send + Sync + 'static,
    {
        Self::with_policy(Policy::Custom(Arc::new(f)))
    }

    /// Replace the retry cap.
    pub fn with_retries(&self, retries: u32) -> Self {
        Self {
            policy: self.policy.clone(),
            retries,
            amplifier: self.amplifier,
            plateau_index: Arc::new(OnceLock::new()),
        }
    }

    /// Multiply every delay by `factor`, bounded to `1..=MAX_AMPLIFICATION`.
    ///
    /// Only fibonacci, progressive and exponential sequences can be
    /// amplified; other sequences are returned unchanged.
    pub fn amplify(&self, factor: u32) -> Self {
        if !self.is_amplifiable() {
            tracing::debug!(
                sequence = %self.name(),
                "Ignoring amplifier on non-amplifiable sequence"
            );
            return self.clone();
        }

        Self {
            policy: self.policy.clone(),
            retries: self.retries,
            amplifier: factor.clamp(1, MAX_AMPLIFICATION),
            plateau_index: self.plateau_index.clone(),
        }
    }

    /// The retry cap.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn amplifier(&self) -> u32 {
        self.amplifier
    }

    pub fn is_amplifiable(&self) -> bool {
        matches!(
            self.policy,
            Policy::Fibonacci | Policy::Progressive | Policy::Exponential { .. }
        )
    }

    /// Short name used in logs and config files.
    pub fn name(&self) -> &'static str {
        match self.policy {
            Policy::Immediate => "immediate",
            Policy::Constant(ms) if ms == DEFAULT_DELAY_MS => "default",
            Policy::Constant(_) => "constant",
            Policy::Fibonacci => "fibonacci",
            Policy::Progressive => "progressive",
            Policy::Exponential { .. } => "exponential",
            Policy::Custom(_) => "custom",
        }
    }

    /// Delay before the given retry.
    pub fn delay(&self, retry: u32) -> Duration {
        let retry = retry.min(self.retries);

        let ms = if self.is_amplifiable() {
            let plateau_index = self.plateau_index();
            let plateau = self.bounded(self.retries);
            if retry >= plateau_index {
                plateau
            } else {
                self.jittered(self.bounded(retry), plateau)
            }
        } else {
            self.bounded(retry)
        };

        Duration::from_millis(ms.saturating_mul(u64::from(self.amplifier)))
    }

    /// Index from which the sequence returns its plateau value.
    pub fn plateau_index(&self) -> u32 {
        *self.plateau_index.get_or_init(|| {
            let plateau = self.bounded(self.retries);
            (0..=self.retries)
                .find(|&retry| self.bounded(retry) >= plateau)
                .unwrap_or(self.retries)
        })
    }

    /// Unamplified, unjittered value clamped to the ceiling.
    fn bounded(&self, retry: u32) -> u64 {
        self.raw(retry).min(DELAY_CEILING_MS)
    }

    fn raw(&self, retry: u32) -> u64 {
        match &self.policy {
            Policy::Immediate => 0,
            Policy::Constant(ms) => *ms,
            Policy::Fibonacci => fibonacci(retry)
                .saturating_mul(u64::from(retry))
                .min(FIBONACCI_PLATEAU_MS),
            Policy::Progressive => {
                let steps = (retry >> 2).min(3);
                (1u64 << steps).min(PROGRESSIVE_MAX_FACTOR) * PROGRESSIVE_BASE_MS
            }
            Policy::Exponential { base_ms } => {
                if retry == 0 {
                    return 0;
                }
                let factor = 2u64.saturating_pow(retry - 1);
                base_ms.saturating_mul(factor)
            }
            Policy::Custom(f) => f(retry),
        }
    }

    fn jittered(&self, delay_ms: u64, plateau: u64) -> u64 {
        if !matches!(self.policy, Policy::Exponential { .. }) {
            return delay_ms;
        }

        // Apply jitter (0 to 10% of the delay)
        let jitter_range = delay_ms / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        (delay_ms + jitter).min(plateau)
    }
}

impl Default for DelaySequence {
    fn default() -> Self {
        Self::with_policy(Policy::Constant(DEFAULT_DELAY_MS))
    }
}

impl PartialEq for DelaySequence {
    fn eq(&self, other: &Self) -> bool {
        let same_policy = match (&self.policy, &other.policy) {
            (Policy::Immediate, Policy::Immediate)
            | (Policy::Fibonacci, Policy::Fibonacci)
            | (Policy::Progressive, Policy::Progressive) => true,
            (Policy::Constant(a), Policy::Constant(b)) => a == b,
            (Policy::Exponential { base_ms: a }, Policy::Exponential { base_ms: b }) => a == b,
            (Policy::Custom(a), Policy::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };

        same_policy && self.retries == other.retries && self.amplifier == other.amplifier
    }
}

impl fmt::Debug for DelaySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelaySequence")
            .field("policy", &self.name())
            .field("retries", &self.retries)
            .field("amplifier", &self.amplifier)
            .finish()
    }
}

/// Memoized Fibonacci: `fib(0) = 0`, `fib(1) = fib(2) = 1`.
fn fibonacci(n: u32) -> u64 {
    static TABLE: OnceLock<Vec<u64>> = OnceLock::new();

    let table = TABLE.get_or_init(|| {
        let mut table = vec![0u64, 1];
        while table.len() <= FIBONACCI_MAX_INDEX as usize {
            let k = table.len();
            table.push(table[k - 1] + table[k - 2]);
        }
        table
    });

    table[n.min(FIBONACCI_MAX_INDEX) as usize]
}

/// Names accepted for built-in sequences in config files and on the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceName {
    Immediate,
    Default,
    Fibonacci,
    Progressive,
    Exponential,
}

impl SequenceName {
    /// Whether sequences of this kind accept an amplifier.
    pub fn is_amplifiable(self) -> bool {
        matches!(
            self,
            SequenceName::Fibonacci | SequenceName::Progressive | SequenceName::Exponential
        )
    }

    /// Build the named sequence. `base` only matters for `exponential`.
    pub fn build(self, base: Duration) -> DelaySequence {
        match self {
            SequenceName::Immediate => DelaySequence::immediate(),
            SequenceName::Default => DelaySequence::default(),
            SequenceName::Fibonacci => DelaySequence::fibonacci(),
            SequenceName::Progressive => DelaySequence::progressive(),
            SequenceName::Exponential => DelaySequence::exponential(base),
        }
    }
}

impl FromStr for SequenceName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" | "immediately" => Ok(SequenceName::Immediate),
            "default" => Ok(SequenceName::Default),
            "fibonacci" => Ok(SequenceName::Fibonacci),
            "progressive" => Ok(SequenceName::Progressive),
            "exponential" => Ok(SequenceName::Exponential),
            other => Err(format!("unknown delay sequence '{}'", other)),
        }
    }
}

/// Argument of the `delay` builder modifier.
#[derive(Debug, Clone, Default)]
pub enum DelayConfig {
    /// Reset to the default sequence.
    #[default]
    Default,
    /// A constant delay.
    Fixed(Duration),
    /// A full sequence.
    Sequence(DelaySequence),
}

impl DelayConfig {
    pub fn into_sequence(self) -> DelaySequence {
        match self {
            DelayConfig::Default => DelaySequence::default(),
            DelayConfig::Fixed(delay) if delay == Duration::from_millis(DEFAULT_DELAY_MS) => {
                DelaySequence::default()
            }
            DelayConfig::Fixed(delay) => DelaySequence::constant(delay),
            DelayConfig::Sequence(sequence) => sequence,
        }
    }
}

impl From<u64> for DelayConfig {
    fn from(ms: u64) -> Self {
        DelayConfig::Fixed(Duration::from_millis(ms))
    }
}

impl From<Duration> for DelayConfig {
    fn from(delay: Duration) -> Self {
        DelayConfig::Fixed(delay)
    }
}

impl From<DelaySequence> for DelayConfig {
    fn from(sequence: DelaySequence) -> Self {
        DelayConfig::Sequence(sequence)
    }
}

impl From<SequenceName> for DelayConfig {
    fn from(name: SequenceName) -> Self {
        DelayConfig::Sequence(name.build(Duration::from_millis(DEFAULT_DELAY_MS)))
    }
}
