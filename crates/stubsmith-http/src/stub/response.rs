//! Response side of a stub, plus the optional outbound callback.

use bytes::Bytes;
use std::path::PathBuf;

/// Configured response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Literal(String),
    /// Content read from `path` at load time; empty if it was unreadable
    File { path: PathBuf, content: Bytes },
}

impl Default for ResponseBody {
    fn default() -> Self {
        ResponseBody::Literal(String::new())
    }
}

/// One configured response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubResponse {
    pub status: u16,
    /// Insertion order and case preserved
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
    pub latency_ms: Option<u64>,
}

impl Default for StubResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: ResponseBody::default(),
            latency_ms: None,
        }
    }
}

impl StubResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = ResponseBody::Literal(body.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    /// Configured `Location` header, if any (case-insensitive).
    pub fn location(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("location"))
            .map(|(_, value)| value.as_str())
    }

    /// Upstream URL when the literal body starts with `http` (any case).
    /// Only the prefix is checked. File-backed bodies are never recorded.
    pub fn record_target(&self) -> Option<&str> {
        match &self.body {
            ResponseBody::Literal(body)
                if body
                    .get(..4)
                    .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http")) =>
            {
                Some(body.trim())
            }
            _ => None,
        }
    }
}

/// Outbound HTTP call fired after a matched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub latency_ms: Option<u64>,
}

impl Callback {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: String::new(),
            latency_ms: None,
        }
    }
}
