//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt settles with a failure:
//!     → retries.rs (predicates decide whether to retry)
//!     → backoff.rs (delay for the next retry index)
//!     → timeouts.rs (cancellable wait for the backoff)
//!
//! Every attempt:
//!     → timeouts.rs (optional attempt timer)
//! ```
//!
//! # Design Decisions
//! - Timeouts are opt-in; zero disables them
//! - Retries only happen when a predicate asks for them
//! - Delay sequences are pure and bounded by a global ceiling

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::{DelayConfig, DelaySequence, SequenceName};
pub use retries::{RetryPredicate, RetryTrigger};
pub use timeouts::{clamp_timeout, AbortableDelay};
