//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeout, amplifier, status codes)
//! - Resolve names (delay sequences, retry triggers, methods, headers)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RefetchConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::str::FromStr;
use thiserror::Error;

use crate::config::schema::{parse_header, parse_method, RefetchConfig};

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("retry.delay: {0}")]
    UnknownDelay(String),

    #[error("retry.amplify must be between 1 and {max}, got {value}")]
    AmplifyOutOfRange { value: u32, max: u32 },

    #[error("retry.amplify has no effect on delay '{delay}'")]
    AmplifyIgnored { delay: String },

    #[error("request.timeout_ms must be at most {max}, got {value}")]
    TimeoutTooLarge { value: u64, max: u64 },

    #[error("retry.on: {0}")]
    UnknownTrigger(String),

    #[error("retry.statuses: {0} is not an HTTP status code")]
    InvalidStatus(u16),

    #[error("init.method: invalid method '{0}'")]
    InvalidMethod(String),

    #[error("init.headers: invalid header '{name}'")]
    InvalidHeader { name: String },

    #[error("observability.log_level: unknown level '{0}'")]
    InvalidLogLevel(String),
}

/// Check a parsed config, collecting every problem.
pub fn validate_config(config: &RefetchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.request.timeout() {
        errors.push(e);
    }

    errors.extend(config.retry.delay_errors());

    for name in &config.retry.on {
        if let Err(e) = name.parse::<crate::resilience::retries::RetryTrigger>() {
            errors.push(ValidationError::UnknownTrigger(e));
        }
    }

    for &code in &config.retry.statuses {
        if !(100..=599).contains(&code) {
            errors.push(ValidationError::InvalidStatus(code));
        }
    }

    if let Some(method) = &config.init.method {
        if let Err(e) = parse_method(method) {
            errors.push(e);
        }
    }

    for (name, value) in &config.init.headers {
        if let Err(e) = parse_header(name, value) {
            errors.push(e);
        }
    }

    if tracing::Level::from_str(&config.observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
