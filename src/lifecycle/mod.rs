//! Cancellation lifecycle.
//!
//! # Data Flow
//! ```text
//! Refetch instance
//!     → ScopeCell (scope.rs) owns the live CancelScope
//!     → abort(): cancel live scope → install fresh scope
//!
//! Each attempt:
//!     → holds the instance AbortSignal (signals.rs) it was dispatched under
//!     → owns a private CancelScope handed to the transport only
//! ```
//!
//! # Design Decisions
//! - Cancelling is idempotent
//! - The instance scope is replaced synchronously on abort
//! - Stale abort handles always reach the live scope

pub mod scope;
pub mod signals;

pub use scope::{AbortHandle, CancelScope, ScopeCell};
pub use signals::AbortSignal;
