//! Per-call request options and their defaults.
//!
//! # Responsibilities
//! - Carry the per-call init options handed to the transport
//! - Apply configured defaults without overwriting caller-supplied values
//! - Merge default headers additively, caller header names win
//!
//! # Design Decisions
//! - Only allow-listed options can carry defaults; the allow-list is the
//!   [`InitDefault`] enum itself
//! - The caller's options are never mutated in place; resolution consumes
//!   and returns them

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;

use crate::lifecycle::AbortSignal;

/// Options for one logical call.
///
/// `ReqwestTransport` turns `referrer` into a `Referer` header (unless
/// `referrer_policy` is `no-referrer`) and `cache` modes into cache
/// headers. It ignores `credentials`, `integrity`, `keepalive`, `mode` and
/// `redirect`; redirects follow the client's policy. Custom transports
/// receive every option.
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    pub method: Option<Method>,
    pub headers: Option<HeaderMap>,
    pub body: Option<Vec<u8>>,
    pub cache: Option<String>,
    pub credentials: Option<String>,
    pub integrity: Option<String>,
    pub keepalive: Option<bool>,
    pub mode: Option<String>,
    pub redirect: Option<String>,
    pub referrer: Option<String>,
    pub referrer_policy: Option<String>,
    /// Caller-supplied cancellation, raced against every attempt.
    pub signal: Option<AbortSignal>,
}

impl RequestInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers
            .get_or_insert_with(HeaderMap::new)
            .append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }
}

/// A default for one allow-listed init option.
#[derive(Debug, Clone)]
pub enum InitDefault {
    Cache(String),
    Credentials(String),
    Headers(HeaderMap),
    Integrity(String),
    Keepalive(bool),
    Method(Method),
    Mode(String),
    Redirect(String),
    Referrer(String),
    ReferrerPolicy(String),
    Signal(AbortSignal),
}

impl InitDefault {
    /// Option name as used in config files.
    pub fn option(&self) -> &'static str {
        match self {
            InitDefault::Cache(_) => "cache",
            InitDefault::Credentials(_) => "credentials",
            InitDefault::Headers(_) => "headers",
            InitDefault::Integrity(_) => "integrity",
            InitDefault::Keepalive(_) => "keepalive",
            InitDefault::Method(_) => "method",
            InitDefault::Mode(_) => "mode",
            InitDefault::Redirect(_) => "redirect",
            InitDefault::Referrer(_) => "referrer",
            InitDefault::ReferrerPolicy(_) => "referrer_policy",
            InitDefault::Signal(_) => "signal",
        }
    }

    fn apply(&self, init: &mut RequestInit) {
        match self {
            InitDefault::Cache(v) => fill(&mut init.cache, v),
            InitDefault::Credentials(v) => fill(&mut init.credentials, v),
            InitDefault::Headers(headers) => merge_headers(init, headers),
            InitDefault::Integrity(v) => fill(&mut init.integrity, v),
            InitDefault::Keepalive(v) => fill(&mut init.keepalive, v),
            InitDefault::Method(v) => fill(&mut init.method, v),
            InitDefault::Mode(v) => fill(&mut init.mode, v),
            InitDefault::Redirect(v) => fill(&mut init.redirect, v),
            InitDefault::Referrer(v) => fill(&mut init.referrer, v),
            InitDefault::ReferrerPolicy(v) => fill(&mut init.referrer_policy, v),
            InitDefault::Signal(v) => fill(&mut init.signal, v),
        }
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, default: &T) {
    if slot.is_none() {
        *slot = Some(default.clone());
    }
}

fn merge_headers(init: &mut RequestInit, defaults: &HeaderMap) {
    if defaults.is_empty() {
        return;
    }

    let headers = init.headers.get_or_insert_with(HeaderMap::new);
    for name in defaults.keys() {
        if headers.contains_key(name) {
            continue;
        }
        for value in defaults.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
}

/// Ordered init defaults of a configuration.
#[derive(Debug, Clone, Default)]
pub struct InitDefaults {
    resolvers: Vec<InitDefault>,
}

impl InitDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, default: InitDefault) -> Self {
        self.resolvers.push(default);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InitDefault> {
        self.resolvers.iter()
    }

    /// Apply every default, in order, to the caller's options.
    pub fn resolve(&self, mut init: RequestInit) -> RequestInit {
        for resolver in &self.resolvers {
            resolver.apply(&mut init);
        }
        init
    }
}

impl FromIterator<InitDefault> for InitDefaults {
    fn from_iter<I: IntoIterator<Item = InitDefault>>(iter: I) -> Self {
        Self {
            resolvers: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};

    fn defaults() -> InitDefaults {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("refetch"));

        InitDefaults::new()
            .with(InitDefault::Method(Method::POST))
            .with(InitDefault::Credentials("include".into()))
            .with(InitDefault::Headers(headers))
    }

    #[test]
    fn test_defaults_fill_missing_options() {
        let init = defaults().resolve(RequestInit::new());

        assert_eq!(init.method, Some(Method::POST));
        assert_eq!(init.credentials.as_deref(), Some("include"));
        let headers = init.headers.unwrap();
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers[USER_AGENT], "refetch");
    }

    #[test]
    fn test_caller_options_win() {
        let init = RequestInit::new()
            .method(Method::GET)
            .header(ACCEPT, HeaderValue::from_static("text/plain"))
            .header(AUTHORIZATION, HeaderValue::from_static("Bearer t"));

        let init = defaults().resolve(init);

        assert_eq!(init.method, Some(Method::GET));
        let headers = init.headers.unwrap();
        assert_eq!(headers.get_all(ACCEPT).iter().count(), 1);
        assert_eq!(headers[ACCEPT], "text/plain");
        assert_eq!(headers[AUTHORIZATION], "Bearer t");
        assert_eq!(headers[USER_AGENT], "refetch");
    }

    #[test]
    fn test_later_defaults_do_not_override_earlier() {
        let defaults = InitDefaults::new()
            .with(InitDefault::Mode("cors".into()))
            .with(InitDefault::Mode("no-cors".into()));

        let init = defaults.resolve(RequestInit::new());
        assert_eq!(init.mode.as_deref(), Some("cors"));
    }

    #[test]
    fn test_empty_defaults_leave_options_untouched() {
        let init = InitDefaults::new().resolve(RequestInit::new());
        assert!(init.headers.is_none());
        assert!(init.method.is_none());
    }
}
