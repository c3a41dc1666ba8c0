//! Response abstraction.
//!
//! # Responsibilities
//! - Define what the orchestrator needs from a response (`ok`, cheap clone)
//! - Provide a buffered HTTP response for the reqwest transport
//!
//! # Design Decisions
//! - Bodies are buffered so responses can be cloned for retry predicates
//!   without exhausting a stream used elsewhere

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::error::TransportError;

/// What the orchestrator needs from a transport's response.
pub trait ResponseLike: Clone + fmt::Debug + Send + Sync + 'static {
    /// Numeric status code.
    fn status(&self) -> u16;

    /// Whether the response counts as a success.
    fn ok(&self) -> bool {
        (200..300).contains(&self.status())
    }
}

/// A fully-read HTTP response.
#[derive(Clone)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Arc<[u8]>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        let body: Vec<u8> = body.into();
        Self {
            status,
            headers: HeaderMap::new(),
            body: Arc::from(body),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Read a reqwest response to the end.
    pub async fn read(response: reqwest::Response) -> Result<Self, TransportError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(Self {
            status,
            headers,
            body: Arc::from(body.as_ref()),
        })
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

impl ResponseLike for HttpResponse {
    fn status(&self) -> u16 {
        self.status.as_u16()
    }

    fn ok(&self) -> bool {
        self.status.is_success()
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers.len())
            .field("body_len", &self.body.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_range() {
        assert!(HttpResponse::new(StatusCode::OK, "").ok());
        assert!(HttpResponse::new(StatusCode::NO_CONTENT, "").ok());
        assert!(!HttpResponse::new(StatusCode::NOT_FOUND, "").ok());
        assert!(!HttpResponse::new(StatusCode::BAD_GATEWAY, "").ok());
    }

    #[test]
    fn test_clone_shares_body() {
        let response = HttpResponse::new(StatusCode::OK, r#"{"id": 7}"#);
        let copy = response.clone();
        assert_eq!(copy.text(), r#"{"id": 7}"#);

        let value: serde_json::Value = copy.json().unwrap();
        assert_eq!(value["id"], 7);
        assert_eq!(response.body().len(), copy.body().len());
    }
}
