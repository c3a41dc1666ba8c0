//! Configuration schema definitions.
//!
//! This module defines the TOML configuration of an orchestrator.
//! All types derive Serde traits; every section and field has a default so
//! an empty file is a valid config.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::validation::ValidationError;
use crate::http::request::{InitDefault, InitDefaults};
use crate::http::response::ResponseLike;
use crate::orchestrator::context::{ConcurrencyMode, ConfigPatch, Override, DEFAULT_ATTEMPT_LIMIT};
use crate::resilience::backoff::{DelayConfig, SequenceName, DEFAULT_DELAY_MS, MAX_AMPLIFICATION};
use crate::resilience::retries::{RetryPredicate, RetryTrigger};
use crate::resilience::timeouts::MAXIMUM_TIMEOUT_MS;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RefetchConfig {
    /// Concurrency mode and attempt timeout.
    pub request: RequestConfig,

    /// Attempt limit, backoff and retry triggers.
    pub retry: RetryConfig,

    /// Defaults for per-call request options.
    pub init: InitConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// `[request]` section.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RequestConfig {
    pub mode: ModeSetting,

    /// Attempt timeout in milliseconds (0 = disabled).
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    #[default]
    Many,
    One,
}

impl From<ModeSetting> for ConcurrencyMode {
    fn from(mode: ModeSetting) -> Self {
        match mode {
            ModeSetting::Many => ConcurrencyMode::Multiple,
            ModeSetting::One => ConcurrencyMode::Single,
        }
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Result<Duration, ValidationError> {
        if self.timeout_ms > MAXIMUM_TIMEOUT_MS {
            return Err(ValidationError::TimeoutTooLarge {
                value: self.timeout_ms,
                max: MAXIMUM_TIMEOUT_MS,
            });
        }
        Ok(Duration::from_millis(self.timeout_ms))
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per call (0 = as many as the delay sequence allows).
    pub limit: u32,

    /// Constant delay in milliseconds, or a sequence name.
    pub delay: DelaySetting,

    /// Base delay of the exponential sequence, in milliseconds.
    pub base_ms: u64,

    /// Amplifier for fibonacci, progressive and exponential sequences.
    pub amplify: u32,

    /// Built-in predicates, by name.
    pub on: Vec<String>,

    /// Retry non-ok responses with these status codes.
    pub statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_ATTEMPT_LIMIT,
            delay: DelaySetting::default(),
            base_ms: DEFAULT_DELAY_MS,
            amplify: 1,
            on: Vec::new(),
            statuses: Vec::new(),
        }
    }
}

/// A delay given either as milliseconds or as a sequence name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DelaySetting {
    Millis(u64),
    Named(String),
}

impl Default for DelaySetting {
    fn default() -> Self {
        DelaySetting::Millis(DEFAULT_DELAY_MS)
    }
}

impl fmt::Display for DelaySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelaySetting::Millis(ms) => write!(f, "{}ms", ms),
            DelaySetting::Named(name) => f.write_str(name),
        }
    }
}

impl FromStr for DelaySetting {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<u64>() {
            Ok(ms) => DelaySetting::Millis(ms),
            Err(_) => DelaySetting::Named(s.to_string()),
        })
    }
}

impl RetryConfig {
    /// Every problem with `delay` and `amplify`, checked independently.
    pub fn delay_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let in_range = (1..=MAX_AMPLIFICATION).contains(&self.amplify);
        if !in_range {
            errors.push(ValidationError::AmplifyOutOfRange {
                value: self.amplify,
                max: MAX_AMPLIFICATION,
            });
        }

        let amplifiable = match &self.delay {
            DelaySetting::Millis(_) => Some(false),
            DelaySetting::Named(name) => match name.parse::<SequenceName>() {
                Ok(name) => Some(name.is_amplifiable()),
                Err(e) => {
                    errors.push(ValidationError::UnknownDelay(e));
                    None
                }
            },
        };

        if in_range && self.amplify != 1 && amplifiable == Some(false) {
            errors.push(ValidationError::AmplifyIgnored {
                delay: self.delay.to_string(),
            });
        }

        errors
    }

    pub fn delay_config(&self) -> Result<DelayConfig, ValidationError> {
        if let Some(e) = self.delay_errors().into_iter().next() {
            return Err(e);
        }

        match &self.delay {
            DelaySetting::Millis(ms) => Ok(DelayConfig::Fixed(Duration::from_millis(*ms))),
            DelaySetting::Named(name) => {
                let name = name.parse::<SequenceName>().map_err(ValidationError::UnknownDelay)?;
                let sequence = name
                    .build(Duration::from_millis(self.base_ms))
                    .amplify(self.amplify);
                Ok(DelayConfig::Sequence(sequence))
            }
        }
    }

    pub fn triggers(&self) -> Result<Vec<RetryTrigger>, ValidationError> {
        self.on
            .iter()
            .map(|name| name.parse::<RetryTrigger>().map_err(ValidationError::UnknownTrigger))
            .collect()
    }

    pub fn predicates<R: ResponseLike>(&self) -> Result<Vec<RetryPredicate<R>>, ValidationError> {
        let mut predicates: Vec<RetryPredicate<R>> = self
            .triggers()?
            .into_iter()
            .map(RetryTrigger::predicate)
            .collect();

        if let Some(&code) = self.statuses.iter().find(|code| !(100..=599).contains(*code)) {
            return Err(ValidationError::InvalidStatus(code));
        }
        if !self.statuses.is_empty() {
            predicates.push(RetryPredicate::status(self.statuses.clone()));
        }

        Ok(predicates)
    }
}

/// `[init]` section: defaults for per-call options.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InitConfig {
    pub method: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub cache: Option<String>,
    pub credentials: Option<String>,
    pub integrity: Option<String>,
    pub keepalive: Option<bool>,
    pub mode: Option<String>,
    pub redirect: Option<String>,
    pub referrer: Option<String>,
    pub referrer_policy: Option<String>,
}

pub fn parse_method(method: &str) -> Result<Method, ValidationError> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| ValidationError::InvalidMethod(method.to_string()))
}

pub fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ValidationError> {
    let invalid = || ValidationError::InvalidHeader {
        name: name.to_string(),
    };
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    Ok((name, value))
}

impl InitConfig {
    pub fn defaults(&self) -> Result<InitDefaults, ValidationError> {
        let mut defaults = InitDefaults::new();

        if let Some(method) = &self.method {
            defaults = defaults.with(InitDefault::Method(parse_method(method)?));
        }

        if !self.headers.is_empty() {
            let mut headers = HeaderMap::new();
            for (name, value) in &self.headers {
                let (name, value) = parse_header(name, value)?;
                headers.append(name, value);
            }
            defaults = defaults.with(InitDefault::Headers(headers));
        }

        let strings: [(&Option<String>, fn(String) -> InitDefault); 7] = [
            (&self.cache, InitDefault::Cache),
            (&self.credentials, InitDefault::Credentials),
            (&self.integrity, InitDefault::Integrity),
            (&self.mode, InitDefault::Mode),
            (&self.redirect, InitDefault::Redirect),
            (&self.referrer, InitDefault::Referrer),
            (&self.referrer_policy, InitDefault::ReferrerPolicy),
        ];
        for (value, make) in strings {
            if let Some(value) = value {
                defaults = defaults.with(make(value.clone()));
            }
        }

        if let Some(keepalive) = self.keepalive {
            defaults = defaults.with(InitDefault::Keepalive(keepalive));
        }

        Ok(defaults)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Include the event target in log lines.
    pub with_target: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            with_target: true,
        }
    }
}

impl RefetchConfig {
    /// Patch over the factory defaults described by this config.
    pub fn to_patch<R: ResponseLike>(&self) -> Result<ConfigPatch<R>, ValidationError> {
        Ok(ConfigPatch {
            mode: Override::Set(self.request.mode.into()),
            limit: Override::Set(self.retry.limit),
            timeout: Override::Set(self.request.timeout()?),
            delay: Override::Set(self.retry.delay_config()?),
            predicates: Override::Set(self.retry.predicates()?),
            init: Override::Set(self.init.defaults()?),
            hooks: Override::Inherit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::HttpResponse;
    use crate::orchestrator::context::ConfigContext;
    use crate::resilience::backoff::DelaySequence;

    const FULL: &str = r#"
        [request]
        mode = "one"
        timeout_ms = 2000

        [retry]
        limit = 4
        delay = "fibonacci"
        amplify = 2
        on = ["network", "timeout"]
        statuses = [429, 503]

        [init]
        method = "post"
        credentials = "include"
        keepalive = true

        [init.headers]
        accept = "application/json"
        x-client = "refetch"

        [observability]
        log_level = "debug"
    "#;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: RefetchConfig = toml::from_str("").unwrap();
        assert_eq!(config.request.mode, ModeSetting::Many);
        assert_eq!(config.request.timeout_ms, 0);
        assert_eq!(config.retry.limit, DEFAULT_ATTEMPT_LIMIT);
        assert_eq!(config.retry.delay, DelaySetting::Millis(DEFAULT_DELAY_MS));
        assert_eq!(config.observability.log_level, "info");

        let ctx = ConfigContext::<HttpResponse>::default().patched(config.to_patch().unwrap());
        assert_eq!(ctx.mode(), ConcurrencyMode::Multiple);
        assert_eq!(ctx.attempt_limit(), 1);
        assert_eq!(ctx.timeout(), None);
        assert_eq!(ctx.delay(), &DelaySequence::default());
        assert!(ctx.predicates().is_empty());
        assert!(ctx.init().is_empty());
    }

    #[test]
    fn test_full_config() {
        let config: RefetchConfig = toml::from_str(FULL).unwrap();
        let ctx = ConfigContext::<HttpResponse>::default().patched(config.to_patch().unwrap());

        assert_eq!(ctx.mode(), ConcurrencyMode::Single);
        assert_eq!(ctx.attempt_limit(), 4);
        assert_eq!(ctx.timeout(), Some(Duration::from_millis(2000)));
        assert_eq!(ctx.delay(), &DelaySequence::fibonacci().amplify(2));

        let names: Vec<_> = ctx.predicates().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, ["network_error", "timeout", "status"]);

        let options: Vec<_> = ctx.init().iter().map(InitDefault::option).collect();
        assert_eq!(options, ["method", "headers", "credentials", "keepalive"]);
    }

    #[test]
    fn test_delay_setting_forms() {
        let config: RefetchConfig = toml::from_str("[retry]\ndelay = 250").unwrap();
        assert_eq!(config.retry.delay, DelaySetting::Millis(250));

        assert_eq!(
            "progressive".parse::<DelaySetting>().unwrap(),
            DelaySetting::Named("progressive".into())
        );
        assert_eq!("75".parse::<DelaySetting>().unwrap(), DelaySetting::Millis(75));
    }

    #[test]
    fn test_exponential_uses_base() {
        let retry = RetryConfig {
            delay: DelaySetting::Named("exponential".into()),
            base_ms: 40,
            ..RetryConfig::default()
        };

        match retry.delay_config().unwrap() {
            DelayConfig::Sequence(sequence) => {
                assert_eq!(sequence, DelaySequence::exponential(Duration::from_millis(40)));
            }
            other => panic!("expected a sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_amplify_needs_amplifiable_sequence() {
        let fixed = RetryConfig {
            delay: DelaySetting::Millis(250),
            amplify: 5,
            ..RetryConfig::default()
        };
        assert_eq!(
            fixed.delay_config().unwrap_err(),
            ValidationError::AmplifyIgnored { delay: "250ms".into() }
        );

        let constant = RetryConfig {
            delay: DelaySetting::Named("default".into()),
            amplify: 2,
            ..RetryConfig::default()
        };
        assert!(matches!(
            constant.delay_config(),
            Err(ValidationError::AmplifyIgnored { .. })
        ));

        let progressive = RetryConfig {
            delay: DelaySetting::Named("progressive".into()),
            amplify: 2,
            ..RetryConfig::default()
        };
        assert!(progressive.delay_errors().is_empty());
    }

    #[test]
    fn test_invalid_values() {
        let retry = RetryConfig {
            amplify: 11,
            ..RetryConfig::default()
        };
        assert!(matches!(retry.delay_config(), Err(ValidationError::AmplifyOutOfRange { .. })));

        let retry = RetryConfig {
            statuses: vec![42],
            ..RetryConfig::default()
        };
        assert_eq!(
            retry.predicates::<HttpResponse>().unwrap_err(),
            ValidationError::InvalidStatus(42)
        );

        let retry = RetryConfig {
            delay: DelaySetting::Named("sometimes".into()),
            amplify: 0,
            ..RetryConfig::default()
        };
        assert_eq!(
            retry.delay_errors(),
            [
                ValidationError::AmplifyOutOfRange { value: 0, max: MAX_AMPLIFICATION },
                ValidationError::UnknownDelay("unknown delay sequence 'sometimes'".into()),
            ]
        );

        assert!(parse_header("bad header", "x").is_err());
        assert!(parse_method("GET POST").is_err());
    }
}
