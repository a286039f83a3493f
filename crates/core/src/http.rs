//! Request and response values that flow through the worker.
//!
//! A [`StoredResponse`] is a full snapshot: status, headers and the whole body
//! buffered as [`Bytes`]. Cloning one yields an independent copy, so the
//! response returned to a caller and the one written to the cache never
//! consume each other.

use bytes::Bytes;
use url::Url;

use crate::cache::hash::compute_cache_key;

/// Status text of the synthesized unavailability response.
pub const SERVICE_UNAVAILABLE: &str = "Service Unavailable";

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Upper-case HTTP method.
    pub method: String,
    /// Absolute request URL.
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl Request {
    /// A bodiless `GET` request for `url`.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".into(), url, headers: Vec::new(), body: None }
    }

    /// A request with an arbitrary method. The method is upper-cased.
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.to_ascii_uppercase(), url, headers: Vec::new(), body: None }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// URL as used for cache matching: the fragment never takes part.
    pub fn cache_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }

    /// Identity of this request inside a cache generation.
    pub fn cache_key(&self) -> String {
        compute_cache_key(&self.method, &self.cache_url())
    }
}

/// A buffered response, as returned to callers and as persisted in a
/// generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl StoredResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: status_text.into(), headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The 503 returned when neither the network nor the cache can serve a
    /// request.
    pub fn unavailable(body: &str) -> Self {
        Self::new(503, SERVICE_UNAVAILABLE, body.to_string()).with_header("Content-Type", "text/plain")
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Status in the 200-299 range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
