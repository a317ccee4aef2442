//! Authorization requirements attached to stub requests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Credential a request must present in its `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Base64 credential, sent as `Basic <credential>`
    Basic(String),
    /// Token, sent as `Bearer <token>`
    Bearer(String),
    /// Raw header value
    Custom(String),
}

impl Authorization {
    /// Basic credential from configuration. `user:password` is encoded once
    /// here; anything else is assumed to be encoded already.
    pub fn basic_from_config(value: &str) -> Self {
        let value = value.trim();
        if value.contains(':') {
            Authorization::Basic(STANDARD.encode(value))
        } else {
            Authorization::Basic(value.to_string())
        }
    }

    /// Exact header value a request must carry.
    pub fn header_value(&self) -> String {
        match self {
            Authorization::Basic(credential) => format!("Basic {credential}"),
            Authorization::Bearer(token) => format!("Bearer {token}"),
            Authorization::Custom(raw) => raw.clone(),
        }
    }

    /// Byte-for-byte comparison against the incoming header.
    pub fn is_satisfied_by(&self, header: Option<&str>) -> bool {
        header.is_some_and(|value| value.as_bytes() == self.header_value().as_bytes())
    }

    /// `WWW-Authenticate` challenge for a failed check, if any.
    pub fn challenge(&self) -> Option<&'static str> {
        match self {
            Authorization::Basic(_) => Some("Basic realm=\"stubsmith\""),
            Authorization::Bearer(_) | Authorization::Custom(_) => None,
        }
    }
}
