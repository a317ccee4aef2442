//! Error types for configuration loading, live reload and outbound HTTP.
//!
//! Matching itself never fails: an unmatched request is a normal outcome and a
//! broken stub pattern only makes that one stub unreachable.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn configuration text into stub lifecycles.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration document: {0}")]
    InvalidDocument(String),
    #[error("stub #{index}: {reason}")]
    InvalidStub { index: usize, reason: String },
    #[error("failed to read included file {path}: {source}")]
    Include {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in included file {path}: {source}")]
    IncludeYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ParseError {
    pub(crate) fn stub(index: usize, reason: impl Into<String>) -> Self {
        ParseError::InvalidStub {
            index,
            reason: reason.into(),
        }
    }
}

/// Failure of a single reload attempt. The previous snapshot stays in effect.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// Failure of an outbound request (record-and-replay or callback).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },
    #[error("failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },
}
