//! Raw YAML shapes accepted by the stub configuration front-end.
//!
//! These mirror the on-disk document closely; [`super::parser`] converts them
//! into the stub model.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

/// Mapping form of a configuration document.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawComposite {
    /// Files with more stubs, relative to the configuration directory
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub stubs: Vec<RawStub>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStub {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub request: Option<RawRequest>,
    #[serde(default)]
    pub response: Option<RawResponses>,
    #[serde(default)]
    pub callback: Option<RawCallback>,
}

/// A single value or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RawRequest {
    #[serde(default)]
    pub method: Option<OneOrMany<String>>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub query: Option<Mapping>,
    #[serde(default)]
    pub headers: Option<Mapping>,
    #[serde(default)]
    pub post: Option<String>,
    #[serde(default)]
    pub post_regex: Option<String>,
    /// JSON pattern: an inline YAML structure or a JSON string
    #[serde(default)]
    pub json: Option<Value>,
    #[serde(default)]
    pub file: Option<String>,
}

/// One response or a round-robin list. `Many` comes first: a struct whose
/// fields all default would also accept a sequence positionally.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawResponses {
    Many(Vec<RawResponse>),
    One(RawResponse),
}

impl RawResponses {
    pub fn into_vec(self) -> Vec<RawResponse> {
        match self {
            RawResponses::One(response) => vec![response],
            RawResponses::Many(responses) => responses,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawResponse {
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub headers: Option<Mapping>,
    /// Text, or a structure serialized to JSON
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub latency: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCallback {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: Option<Mapping>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub latency: Option<Value>,
}

/// Text form of a YAML scalar; `None` for sequences, mappings and null.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Non-negative integer from a number or numeric string.
pub fn scalar_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// String pairs from a mapping, in document order.
pub fn mapping_pairs(mapping: &Mapping) -> Result<Vec<(String, String)>, String> {
    mapping
        .iter()
        .map(|(key, value)| {
            let key = scalar_to_string(key).ok_or_else(|| format!("invalid key {key:?}"))?;
            let value = match value {
                Value::Null => String::new(),
                other => scalar_to_string(other)
                    .ok_or_else(|| format!("value of '{key}' must be a scalar"))?,
            };
            Ok((key, value))
        })
        .collect()
}

/// Response or callback body: text as-is, structures serialized to JSON.
pub fn body_to_string(value: &Value) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Sequence(_) | Value::Mapping(_) => {
            let json: serde_json::Value =
                serde_json::to_value(value).map_err(|e| format!("body is not valid JSON: {e}"))?;
            Ok(json.to_string())
        }
        other => scalar_to_string(other).ok_or_else(|| "unsupported body".to_string()),
    }
}
