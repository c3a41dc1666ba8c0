//! How an attempt ended and how a logical call resolves.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{FetchError, TransportError};
use crate::http::response::ResponseLike;

/// Settlement of one attempt.
#[derive(Debug, Clone)]
pub enum Outcome<R> {
    /// The transport produced a response, ok or not.
    Response(R),
    /// The attempt timer fired first.
    Timeout(Duration),
    /// The instance scope or the caller's signal fired first.
    Aborted,
    /// The transport failed.
    Error(Arc<TransportError>),
}

impl<R: ResponseLike> Outcome<R> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Response(response) if response.ok())
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Outcome::Aborted)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::Timeout(_))
    }

    pub fn response(&self) -> Option<&R> {
        match self {
            Outcome::Response(response) => Some(response),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TransportError> {
        match self {
            Outcome::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Response(response) if response.ok() => "ok",
            Outcome::Response(_) => "status",
            Outcome::Timeout(_) => "timeout",
            Outcome::Aborted => "aborted",
            Outcome::Error(_) => "error",
        }
    }

    /// Terminal resolution of a call that ends with this outcome.
    pub fn into_result(self) -> Result<Fetched<R>, FetchError<R>> {
        match self {
            Outcome::Response(response) if response.ok() => Ok(Fetched::Response(response)),
            Outcome::Response(response) => Err(FetchError::Status(response)),
            Outcome::Timeout(after) => Err(FetchError::Timeout(after)),
            Outcome::Aborted => Ok(Fetched::Aborted),
            Outcome::Error(err) => Err(FetchError::Transport(err)),
        }
    }
}

/// Successful resolution of a logical call.
#[derive(Debug, Clone)]
pub enum Fetched<R> {
    Response(R),
    /// The call was cancelled. Cancellation is not an error.
    Aborted,
}

impl<R> Fetched<R> {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Fetched::Aborted)
    }

    pub fn response(&self) -> Option<&R> {
        match self {
            Fetched::Response(response) => Some(response),
            Fetched::Aborted => None,
        }
    }

    pub fn into_response(self) -> Option<R> {
        match self {
            Fetched::Response(response) => Some(response),
            Fetched::Aborted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::HttpResponse;
    use reqwest::StatusCode;

    #[test]
    fn test_terminal_resolution() {
        let ok = Outcome::Response(HttpResponse::new(StatusCode::OK, "hi"));
        assert_eq!(ok.label(), "ok");
        assert!(ok.into_result().unwrap().response().is_some());

        let failed = Outcome::Response(HttpResponse::new(StatusCode::BAD_GATEWAY, ""));
        assert_eq!(failed.label(), "status");
        assert!(matches!(failed.into_result(), Err(FetchError::Status(_))));

        let aborted: Outcome<HttpResponse> = Outcome::Aborted;
        assert!(aborted.into_result().unwrap().is_aborted());

        let timeout: Outcome<HttpResponse> = Outcome::Timeout(Duration::from_millis(50));
        assert!(timeout.into_result().unwrap_err().is_timeout());
    }
}
