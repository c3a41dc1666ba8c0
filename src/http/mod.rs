//! Transport-facing types.
//!
//! # Data Flow
//! ```text
//! caller RequestInit
//!     → request.rs (apply configured defaults, merge headers)
//!     → transport.rs (perform one attempt under an inner signal)
//!     → response.rs (ResponseLike: ok + clone)
//! ```
//!
//! # Design Decisions
//! - The orchestrator is generic over the transport; reqwest is the default
//! - No HTTP semantics beyond `ok` leak into the orchestrator

pub mod request;
pub mod response;
pub mod transport;

pub use request::{InitDefault, InitDefaults, RequestInit};
pub use response::{HttpResponse, ResponseLike};
pub use transport::{ReqwestTransport, Transport};
