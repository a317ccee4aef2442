//! Regex-group map collected while matching a request.

use std::collections::HashMap;

/// Capture values keyed by namespaced names such as `url.1`,
/// `query.status.0` or `header.x-id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegexGroups {
    values: HashMap<String, String>,
}

impl RegexGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Record every group of `captures` under `prefix`: numbered groups as
    /// `prefix.<n>` (0 is the whole match) and named groups as `prefix.<name>`.
    pub fn record_captures(&mut self, prefix: &str, regex: &regex::Regex, captures: &regex::Captures) {
        for (index, group) in captures.iter().enumerate() {
            if let Some(m) = group {
                self.insert(format!("{prefix}.{index}"), m.as_str());
            }
        }
        for name in regex.capture_names().flatten() {
            if let Some(m) = captures.name(name) {
                self.insert(format!("{prefix}.{name}"), m.as_str());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
