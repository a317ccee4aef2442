//! Request/response pairing with round-robin response cycling.

use super::request::StubRequest;
use super::response::{Callback, StubResponse};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free round-robin position over a fixed number of responses.
#[derive(Default)]
pub struct ResponseCycler(AtomicU64);

impl ResponseCycler {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Index to serve now; the cycle moves on to the next one.
    #[must_use]
    pub fn advance(&self, response_count: usize) -> usize {
        let count = response_count.max(1) as u64;
        let old_value = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some((v % count + 1) % count)
            })
            .unwrap_or_else(|e| {
                debug_assert!(false, "we never return None from fetch_update");
                e
            });
        (old_value % count) as usize
    }
}

impl fmt::Debug for ResponseCycler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResponseCycler")
            .field(&self.0.load(Ordering::Relaxed))
            .finish()
    }
}

/// A configured request paired with one or more responses.
///
/// Two lifecycles are the same stub when their requests are equal; the
/// responses, callback and description do not take part in equality.
#[derive(Debug)]
pub struct StubHttpLifecycle {
    pub description: Option<String>,
    pub request: StubRequest,
    responses: Vec<StubResponse>,
    pub callback: Option<Callback>,
    cycle: ResponseCycler,
}

impl StubHttpLifecycle {
    /// Pair `request` with `responses`. An empty response list is replaced by
    /// a single default `200` response.
    pub fn new(request: StubRequest, mut responses: Vec<StubResponse>) -> Self {
        if responses.is_empty() {
            responses.push(StubResponse::default());
        }
        Self {
            description: None,
            request,
            responses,
            callback: None,
            cycle: ResponseCycler::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_callback(mut self, callback: Callback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn responses(&self) -> &[StubResponse] {
        &self.responses
    }

    /// Response to serve for this match, advancing the round-robin cycle.
    pub fn next_response(&self) -> &StubResponse {
        let index = self.cycle.advance(self.responses.len());
        &self.responses[index]
    }

    /// Label for log lines.
    pub fn label(&self) -> String {
        match &self.description {
            Some(description) => description.clone(),
            None => format!("{:?} {}", self.request.methods, self.request.url),
        }
    }
}

impl PartialEq for StubHttpLifecycle {
    fn eq(&self, other: &Self) -> bool {
        self.request == other.request
    }
}
