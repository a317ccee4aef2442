//! Request side of a stub.

use super::authorization::Authorization;
use super::pattern::Pattern;
use serde_json::Value;
use std::path::PathBuf;

/// How a request body is compared.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BodyPattern {
    /// No body constraint
    #[default]
    Absent,
    /// Literal equality or full-match regex
    Text(Pattern),
    /// Structural JSON pattern document
    Json(Value),
}

/// Request body loaded from disk. `content` is `None` when the file could
/// not be read, which makes the whole stub unmatchable.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalBody {
    pub path: PathBuf,
    pub content: Option<BodyPattern>,
}

/// One configured request pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct StubRequest {
    /// Accepted methods, upper-cased and never empty
    pub methods: Vec<String>,
    pub url: Pattern,
    /// Sparse query constraints in configuration order
    pub query: Vec<(String, Pattern)>,
    /// Header constraints, names lower-cased
    pub headers: Vec<(String, Pattern)>,
    pub body: BodyPattern,
    /// Supersedes `body` when present
    pub body_file: Option<ExternalBody>,
    pub authorization: Option<Authorization>,
}

impl StubRequest {
    /// A `GET` request for `url` with no other constraints.
    pub fn new(url: Pattern) -> Self {
        Self {
            methods: vec!["GET".to_string()],
            url,
            query: Vec::new(),
            headers: Vec::new(),
            body: BodyPattern::Absent,
            body_file: None,
            authorization: None,
        }
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let methods: Vec<String> = methods
            .into_iter()
            .map(|m| m.as_ref().trim().to_ascii_uppercase())
            .filter(|m| !m.is_empty())
            .collect();
        if !methods.is_empty() {
            self.methods = methods;
        }
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.query.push((name.into(), pattern));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.headers
            .push((name.into().to_ascii_lowercase(), pattern));
        self
    }

    pub fn with_body(mut self, body: BodyPattern) -> Self {
        self.body = body;
        self
    }

    pub fn with_body_file(mut self, body_file: ExternalBody) -> Self {
        self.body_file = Some(body_file);
        self
    }

    pub fn with_authorization(mut self, authorization: Authorization) -> Self {
        self.authorization = Some(authorization);
        self
    }

    pub fn accepts_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    /// Body constraint in effect, or `None` if it lives in an unreadable file.
    pub fn effective_body(&self) -> Option<&BodyPattern> {
        match &self.body_file {
            Some(file) => file.content.as_ref(),
            None => Some(&self.body),
        }
    }
}
