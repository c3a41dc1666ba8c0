//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler state changes:
//!     → tracing spans and events (one span per logical call, keyed by call_id)
//!     → metrics.rs (calls, attempts, retries, timeouts)
//!
//! Binaries:
//!     → logging.rs installs the fmt subscriber
//! ```
//!
//! # Design Decisions
//! - Every logical call carries a UUID v4 call id
//! - The library only emits; subscribers and recorders belong to the binary

pub mod logging;
pub mod metrics;
