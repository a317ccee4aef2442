//! Turns a match outcome into a concrete response.
//!
//! Strategies, in order of precedence for a matched stub:
//! unauthorized (credential missing or wrong), redirect (`Location`
//! configured), record-and-replay (body starts with `http`), normal.
//! Unmatched requests get a diagnostic 404.

mod callback;
pub mod template;

pub use callback::CallbackDispatcher;

use crate::matching::{MatchOutcome, RegexGroups};
use crate::request::IncomingRequest;
use crate::stub::{ResponseBody, StubHttpLifecycle, StubResponse};
use crate::transport::{HttpTransport, OutboundRequest};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use template::substitute;
use tracing::{debug, warn};

/// Which strategy produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Normal,
    Redirect,
    Record,
    Unauthorized,
    NotFound,
}

impl ResponseKind {
    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Normal => "matched",
            ResponseKind::Redirect => "redirect",
            ResponseKind::Record => "record",
            ResponseKind::Unauthorized => "unauthorized",
            ResponseKind::NotFound => "not_found",
        }
    }
}

/// Response handed back to the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDescriptor {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl ResponseDescriptor {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Resolves match outcomes into [`ResponseDescriptor`]s.
#[derive(Clone)]
pub struct ResponseResolver {
    transport: Arc<dyn HttpTransport>,
    callbacks: CallbackDispatcher,
}

impl ResponseResolver {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            callbacks: CallbackDispatcher::new(Arc::clone(&transport)),
            transport,
        }
    }

    pub async fn resolve(
        &self,
        outcome: MatchOutcome,
        request: &IncomingRequest,
    ) -> ResponseDescriptor {
        let (lifecycle, groups) = match outcome {
            MatchOutcome::Matched {
                lifecycle, groups, ..
            } => (lifecycle, groups),
            MatchOutcome::Unmatched => return not_found(request),
        };

        if let Some(required) = &lifecycle.request.authorization {
            if !required.is_satisfied_by(request.header("authorization")) {
                debug!("Authorization failed for stub {}", lifecycle.label());
                return unauthorized(required.challenge());
            }
        }

        let response = lifecycle.next_response();

        if let Some(callback) = &lifecycle.callback {
            self.callbacks.dispatch(callback, &groups);
        }

        if response.location().is_some() {
            return redirect(response, &groups).await;
        }
        if let Some(target) = response.record_target() {
            return self.record(&lifecycle, target, request, &groups).await;
        }
        normal(response, &groups).await
    }

    async fn record(
        &self,
        lifecycle: &StubHttpLifecycle,
        target: &str,
        request: &IncomingRequest,
        groups: &RegexGroups,
    ) -> ResponseDescriptor {
        let url = substitute(target, groups).trim().to_string();
        debug!("Recording {} {} from {}", request.method, request.url, url);

        let outbound = OutboundRequest {
            method: request.method.clone(),
            url,
            headers: request
                .headers
                .iter()
                .filter(|(name, _)| name != "host" && name != "content-length")
                .cloned()
                .collect(),
            body: request.body.clone(),
        };

        match self.transport.send(outbound).await {
            Ok(upstream) => ResponseDescriptor {
                status: upstream.status,
                headers: Vec::new(),
                body: upstream.body,
                kind: ResponseKind::Record,
            },
            Err(e) => {
                warn!("Record-and-replay for stub {} failed: {}", lifecycle.label(), e);
                ResponseDescriptor {
                    status: 502,
                    headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
                    body: Bytes::from(e.to_string()),
                    kind: ResponseKind::Record,
                }
            }
        }
    }
}

async fn apply_latency(response: &StubResponse) {
    if let Some(ms) = response.latency_ms.filter(|ms| *ms > 0) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

fn substitute_headers(headers: &[(String, String)], groups: &RegexGroups) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| (name.clone(), substitute(value, groups).into_owned()))
        .collect()
}

async fn redirect(response: &StubResponse, groups: &RegexGroups) -> ResponseDescriptor {
    apply_latency(response).await;

    let mut headers: Vec<(String, String)> = substitute_headers(&response.headers, groups)
        .into_iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case("connection"))
        .collect();
    headers.push(("Connection".to_string(), "close".to_string()));

    ResponseDescriptor {
        status: response.status,
        headers,
        body: Bytes::new(),
        kind: ResponseKind::Redirect,
    }
}

async fn normal(response: &StubResponse, groups: &RegexGroups) -> ResponseDescriptor {
    apply_latency(response).await;

    let body = match &response.body {
        ResponseBody::Literal(text) => Bytes::from(substitute(text, groups).into_owned()),
        ResponseBody::File { content, .. } => match std::str::from_utf8(content) {
            Ok(text) if template::has_tokens(text) => {
                Bytes::from(substitute(text, groups).into_owned())
            }
            _ => content.clone(),
        },
    };

    ResponseDescriptor {
        status: response.status,
        headers: substitute_headers(&response.headers, groups),
        body,
        kind: ResponseKind::Normal,
    }
}

fn unauthorized(challenge: Option<&str>) -> ResponseDescriptor {
    let mut headers = vec![("Content-Type".to_string(), "text/plain".to_string())];
    if let Some(challenge) = challenge {
        headers.push(("WWW-Authenticate".to_string(), challenge.to_string()));
    }
    ResponseDescriptor {
        status: 401,
        headers,
        body: Bytes::from_static(b"Unauthorized"),
        kind: ResponseKind::Unauthorized,
    }
}

fn not_found(request: &IncomingRequest) -> ResponseDescriptor {
    let mut body = format!("No stub matched: {} {}", request.method, request.url);
    if !request.query.is_empty() {
        body.push('?');
        body.push_str(&request.query_string());
    }
    if let Some(sent) = request.body.as_deref().filter(|b| !b.is_empty()) {
        body.push_str("\nRequest body: ");
        body.push_str(sent);
    }
    ResponseDescriptor {
        status: 404,
        headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
        body: Bytes::from(body),
        kind: ResponseKind::NotFound,
    }
}
