//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! builder.rs (fluent modifiers)
//!     → context.rs (immutable ConfigContext, patched per modifier)
//!     → refetch.rs (Refetch instance: context + instance scope)
//!
//! Refetch::call(resource, init)
//!     → scheduler.rs (dispatch, race, decide, backoff)
//!     → outcome.rs (Outcome per attempt, Fetched or FetchError per call)
//!     → hooks.rs (on_retry, on_timeout, on_abort)
//! ```
//!
//! # Design Decisions
//! - Cancellation resolves to `Fetched::Aborted`, never to an error
//! - Attempts of one call never overlap
//! - Calls on one instance share only the instance scope

pub mod builder;
pub mod context;
pub mod hooks;
pub mod outcome;
pub mod refetch;
pub(crate) mod scheduler;

pub use context::{
    AttemptLimit, ConcurrencyMode, ConfigContext, ConfigPatch, Override, DEFAULT_ATTEMPT_LIMIT,
};
pub use hooks::{AbortEvent, Hooks, RetryEvent, TimeoutEvent};
pub use outcome::{Fetched, Outcome};
pub use refetch::Refetch;
