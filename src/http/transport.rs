//! Transport capability.
//!
//! # Responsibilities
//! - Perform one attempt of a logical call
//! - Honour the attempt's cancellation signal
//!
//! The orchestrator also drops the in-flight future when an attempt loses
//! its race, so a transport that ignores the signal is still cancelled at
//! its next suspension point.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA, REFERER};
use reqwest::Method;
use std::time::Duration;
use url::Url;

use crate::error::TransportError;
use crate::http::request::RequestInit;
use crate::http::response::{HttpResponse, ResponseLike};
use crate::lifecycle::AbortSignal;

/// Something that can perform a request.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Response: ResponseLike;

    async fn perform(
        &self,
        resource: &str,
        init: &RequestInit,
        signal: AbortSignal,
    ) -> Result<Self::Response, TransportError>;
}

/// HTTP transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Client with a connect timeout; attempt timeouts are enforced by the
    /// orchestrator, not here.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client })
    }

    fn build(
        &self,
        resource: &str,
        init: &RequestInit,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let url = Url::parse(resource).map_err(|e| TransportError::InvalidResource {
            resource: resource.to_string(),
            reason: e.to_string(),
        })?;

        let method = init.method.clone().unwrap_or(Method::GET);
        let mut request = self.client.request(method, url);

        let headers = request_headers(init);
        if !headers.is_empty() {
            request = request.headers(headers);
        }
        if let Some(body) = &init.body {
            request = request.body(body.clone());
        }

        Ok(request)
    }
}

/// Caller headers plus the ones implied by `referrer` and `cache`.
///
/// Headers the caller set are never replaced.
fn request_headers(init: &RequestInit) -> HeaderMap {
    let mut headers = init.headers.clone().unwrap_or_default();

    let suppressed = init.referrer_policy.as_deref() == Some("no-referrer");
    if let Some(referrer) = init.referrer.as_deref().filter(|r| !suppressed && is_url(r)) {
        if let Ok(value) = HeaderValue::from_str(referrer) {
            headers.entry(REFERER).or_insert(value);
        }
    }

    match init.cache.as_deref() {
        Some("no-store" | "reload") => {
            headers
                .entry(CACHE_CONTROL)
                .or_insert(HeaderValue::from_static("no-cache"));
            headers
                .entry(PRAGMA)
                .or_insert(HeaderValue::from_static("no-cache"));
        }
        Some("no-cache") => {
            headers
                .entry(CACHE_CONTROL)
                .or_insert(HeaderValue::from_static("max-age=0"));
        }
        _ => {}
    }

    headers
}

fn is_url(referrer: &str) -> bool {
    Url::parse(referrer).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

#[async_trait]
impl Transport for ReqwestTransport {
    type Response = HttpResponse;

    async fn perform(
        &self,
        resource: &str,
        init: &RequestInit,
        signal: AbortSignal,
    ) -> Result<HttpResponse, TransportError> {
        let request = self.build(resource, init)?;

        let send = async {
            let response = request.send().await?;
            HttpResponse::read(response).await
        };

        tokio::select! {
            biased;
            _ = signal.aborted() => Err(TransportError::Cancelled),
            result = send => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::CancelScope;

    #[tokio::test]
    async fn test_invalid_resource() {
        let transport = ReqwestTransport::new();
        let err = transport
            .perform("not a url", &RequestInit::new(), AbortSignal::never())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::InvalidResource { .. }));
    }

    #[tokio::test]
    async fn test_referrer_and_cache_become_headers() {
        let transport = ReqwestTransport::new();
        let init = RequestInit {
            referrer: Some("https://example.com/page".into()),
            cache: Some("no-store".into()),
            ..RequestInit::new()
        };

        let request = transport
            .build("http://127.0.0.1:9/", &init)
            .unwrap()
            .build()
            .unwrap();
        let headers = request.headers();

        assert_eq!(headers[REFERER], "https://example.com/page");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers[PRAGMA], "no-cache");
    }

    #[test]
    fn test_caller_headers_and_policy_win() {
        let init = RequestInit {
            referrer: Some("https://example.com/".into()),
            referrer_policy: Some("no-referrer".into()),
            cache: Some("no-cache".into()),
            ..RequestInit::new()
        }
        .header(CACHE_CONTROL, HeaderValue::from_static("max-age=60"));

        let headers = request_headers(&init);
        assert!(headers.get(REFERER).is_none());
        assert_eq!(headers.get_all(CACHE_CONTROL).iter().count(), 1);
        assert_eq!(headers[CACHE_CONTROL], "max-age=60");

        let init = RequestInit {
            referrer: Some("about:client".into()),
            ..RequestInit::new()
        };
        assert!(request_headers(&init).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let transport = ReqwestTransport::new();
        let scope = CancelScope::new();
        scope.cancel();

        // Port 9 (discard) is never listened on in test environments
        let err = transport
            .perform("http://127.0.0.1:9/", &RequestInit::new(), scope.signal())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Cancelled));
    }
}
