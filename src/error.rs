//! Error types for transports and logical calls.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::http::response::ResponseLike;

/// Errors produced by a transport while performing one attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying HTTP client failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The resource could not be turned into a request target.
    #[error("invalid resource '{resource}': {reason}")]
    InvalidResource { resource: String, reason: String },

    /// The transport observed its cancellation signal.
    #[error("transport call cancelled")]
    Cancelled,

    /// Anything else a custom transport wants to report.
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn other(message: impl Into<String>) -> Self {
        TransportError::Other(message.into())
    }
}

/// Rejection of a logical call, surfaced once retries are exhausted or
/// declined. Cancellation is never an error; see
/// [`Fetched::Aborted`](crate::orchestrator::Fetched::Aborted).
#[derive(Debug, Error)]
pub enum FetchError<R: ResponseLike> {
    /// The last attempt produced a non-ok response.
    #[error("request failed with status {}", .0.status())]
    Status(R),

    /// The last attempt timed out.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The last attempt failed in the transport.
    #[error("transport error: {0}")]
    Transport(#[source] Arc<TransportError>),
}

impl<R: ResponseLike> FetchError<R> {
    /// The non-ok response, if that is what ended the call.
    pub fn response(&self) -> Option<&R> {
        match self {
            FetchError::Status(response) => Some(response),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout(_))
    }
}

/// Result of a logical call.
pub type FetchResult<R> = Result<crate::orchestrator::Fetched<R>, FetchError<R>>;
