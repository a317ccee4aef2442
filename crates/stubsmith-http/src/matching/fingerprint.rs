//! Stable request fingerprint used as the match-cache key.

use crate::request::IncomingRequest;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Everything the matching engine looks at, in a canonical form.
///
/// Query pairs and headers are sorted so arrival order does not matter; the
/// body is reduced to a hash to avoid keeping large payloads in the cache.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Fingerprint {
    method: String,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body_hash: u64,
}

impl Fingerprint {
    pub fn of(request: &IncomingRequest) -> Self {
        let mut query = request.query.clone();
        query.sort();

        let mut headers: Vec<(String, String)> = request
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        headers.sort();

        Self {
            method: request.method.to_ascii_uppercase(),
            url: request.url.clone(),
            query,
            headers,
            body_hash: Self::hash_body(request.body.as_deref()),
        }
    }

    fn hash_body(body: Option<&str>) -> u64 {
        let mut hasher = DefaultHasher::new();
        body.hash(&mut hasher);
        hasher.finish()
    }
}
