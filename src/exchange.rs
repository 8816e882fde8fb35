//! Request/response model for intercepted traffic.
//!
//! Method, headers and status come from the `http` crate; the fetch-specific
//! knobs (mode, credentials, redirect, cache) are modelled here.

use bytes::Bytes;
use http::header::{HeaderName, CONTENT_TYPE, ORIGIN};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use url::Url;

/// Content type of every synthesized module response.
pub const JAVASCRIPT: &str = "text/javascript";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    #[default]
    Cors,
    NoCors,
    SameOrigin,
    Navigate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectPolicy {
    #[default]
    Follow,
    Manual,
    Error,
}

/// Transport-level caching directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// An intercepted (or re-issued) request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub mode: RequestMode,
    pub credentials: Credentials,
    pub redirect: RedirectPolicy,
    pub cache: CacheMode,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            mode: RequestMode::default(),
            credentials: Credentials::default(),
            redirect: RedirectPolicy::default(),
            cache: CacheMode::default(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parse `url` and build a GET request for it.
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::get(Url::parse(url)?))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cache(mut self, cache: CacheMode) -> Self {
        self.cache = cache;
        self
    }

    /// Identity under which responses for this request are cached.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }

    /// `http:` and `https:` requests; everything else bypasses caching.
    pub fn is_network_scheme(&self) -> bool {
        self.url.scheme().starts_with("http")
    }

    /// Whether the page marked this request as cross-origin.
    pub fn has_origin_header(&self) -> bool {
        self.headers.contains_key(ORIGIN)
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, Bytes::new())
    }

    /// A synthesized `200 OK` module response.
    pub fn javascript(source: impl Into<String>) -> Self {
        Self::ok(source.into()).with_content_type(JAVASCRIPT)
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self
    }

    /// Only an exact `200` counts as cacheable success.
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
