//! Metrics recording.
//!
//! # Metrics
//! - `refetch_calls_total` (counter): logical calls by terminal outcome
//! - `refetch_call_duration_seconds` (histogram): logical call latency
//! - `refetch_attempts_total` (counter): attempts by outcome
//! - `refetch_retries_total` (counter): retries scheduled
//! - `refetch_timeouts_total` (counter): attempt timers that fired
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; installing a recorder
//!   is left to the embedding application
//! - Without a recorder every call here is a no-op

use std::time::Instant;

pub fn record_call(outcome: &'static str, start: Instant) {
    metrics::counter!("refetch_calls_total", "outcome" => outcome).increment(1);
    metrics::histogram!("refetch_call_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_attempt(outcome: &'static str) {
    metrics::counter!("refetch_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_retry() {
    metrics::counter!("refetch_retries_total").increment(1);
}

pub fn record_timeout() {
    metrics::counter!("refetch_timeouts_total").increment(1);
}
