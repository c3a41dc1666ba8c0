//! Resilient, cancellable request orchestration.
//!
//! # Architecture Overview
//!
//! ```text
//!     Refetch::call(resource, init)
//!         │
//!         ▼
//!   ┌──────────────┐   dispatch    ┌──────────────┐   perform   ┌──────────────┐
//!   │ orchestrator │──────────────▶│  scheduler   │────────────▶│  transport   │
//!   │ context +    │               │ race/decide/ │◀────────────│  (reqwest)   │
//!   │ builder      │               │ backoff      │   response  └──────────────┘
//!   └──────────────┘               └──────┬───────┘
//!                                         │
//!          ┌──────────────────────────────┼──────────────────────────────┐
//!          ▼                              ▼                              ▼
//!   ┌──────────────┐               ┌──────────────┐               ┌──────────────┐
//!   │  resilience  │               │  lifecycle   │               │observability │
//!   │ backoff/retry│               │ scopes and   │               │ tracing and  │
//!   │ /timeouts    │               │ abort signals│               │ metrics      │
//!   └──────────────┘               └──────────────┘               └──────────────┘
//! ```
//!
//! A call ends in exactly one of three ways: a response, an abort
//! ([`Fetched::Aborted`]) or an error ([`FetchError`]).

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod orchestrator;
pub mod resilience;

pub use config::RefetchConfig;
pub use error::{FetchError, FetchResult, TransportError};
pub use http::{HttpResponse, ReqwestTransport, RequestInit, ResponseLike, Transport};
pub use lifecycle::AbortHandle;
pub use orchestrator::{Fetched, Refetch};
pub use resilience::{DelaySequence, RetryPredicate};
