//! Request-to-stub matching.
//!
//! Stubs are evaluated in configuration order and the first one whose
//! method, URL, query, header and body constraints all hold wins. Repeated
//! identical requests are answered from the [`MatchCache`] after checking
//! that the cached entry still belongs to the current snapshot.

mod cache;
mod fingerprint;
mod groups;
pub mod json;
mod regex_cache;

pub use cache::{CacheMetrics, CachedMatch, MatchCache, MatchCacheConfig};
pub use fingerprint::Fingerprint;
pub use groups::RegexGroups;
pub use regex_cache::RegexCache;

use crate::metrics::MATCH_CACHE_LOOKUPS_TOTAL;
use crate::request::{normalize_url, IncomingRequest};
use crate::store::StubStore;
use crate::stub::{BodyPattern, Pattern, StubHttpLifecycle, StubRequest};
use std::sync::Arc;
use tracing::{debug, trace};

/// Result of matching one request.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched {
        lifecycle: Arc<StubHttpLifecycle>,
        /// Position in the snapshot the match was made against
        index: usize,
        groups: Arc<RegexGroups>,
        /// Served from the match cache
        cached: bool,
    },
    Unmatched,
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }
}

/// Finds the first stub in the current snapshot that accepts a request.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    store: Arc<StubStore>,
    regexes: Arc<RegexCache>,
}

impl MatchingEngine {
    pub fn new(store: Arc<StubStore>, regexes: Arc<RegexCache>) -> Self {
        Self { store, regexes }
    }

    pub fn resolve(&self, request: &IncomingRequest) -> MatchOutcome {
        let snapshot = self.store.snapshot();
        let cache = self.store.cache();
        let fingerprint = cache.is_enabled().then(|| Fingerprint::of(request));

        if let Some(key) = &fingerprint {
            let hit = cache
                .get(key)
                .filter(|hit| hit.generation == snapshot.generation)
                .and_then(|hit| snapshot.get(hit.index).map(|l| (hit, Arc::clone(l))));
            if let Some((hit, lifecycle)) = hit {
                MATCH_CACHE_LOOKUPS_TOTAL.with_label_values(&["hit"]).inc();
                trace!("Match cache hit for {} {}", request.method, request.url);
                return MatchOutcome::Matched {
                    lifecycle,
                    index: hit.index,
                    groups: hit.groups,
                    cached: true,
                };
            }
            MATCH_CACHE_LOOKUPS_TOTAL.with_label_values(&["miss"]).inc();
        }

        for (index, lifecycle) in snapshot.lifecycles.iter().enumerate() {
            let Some(groups) = match_request(&lifecycle.request, request, &self.regexes) else {
                continue;
            };
            debug!(
                "{} {} matched stub #{} ({})",
                request.method,
                request.url,
                index,
                lifecycle.label()
            );
            let groups = Arc::new(groups);
            if let Some(key) = fingerprint {
                cache.put(
                    key,
                    CachedMatch {
                        generation: snapshot.generation,
                        index,
                        groups: Arc::clone(&groups),
                    },
                );
            }
            return MatchOutcome::Matched {
                lifecycle: Arc::clone(lifecycle),
                index,
                groups,
                cached: false,
            };
        }

        debug!(
            "{} {} matched none of {} stubs",
            request.method,
            request.url,
            snapshot.len()
        );
        MatchOutcome::Unmatched
    }
}

/// Regex groups captured if `stub` accepts `request`, `None` otherwise.
pub fn match_request(
    stub: &StubRequest,
    request: &IncomingRequest,
    regexes: &RegexCache,
) -> Option<RegexGroups> {
    if !stub.accepts_method(&request.method) {
        return None;
    }

    let mut groups = RegexGroups::new();

    let url_matches = match &stub.url {
        Pattern::Literal(url) => normalize_url(url) == normalize_url(&request.url),
        regex => regex.capture(&request.url, "url", &mut groups),
    };
    if !url_matches {
        return None;
    }

    for (name, pattern) in &stub.query {
        let value = request.query_param(name)?;
        let prefix = format!("query.{name}");
        if !pattern.capture(value, &prefix, &mut groups) {
            return None;
        }
        groups.insert(prefix, value);
    }

    for (name, pattern) in &stub.headers {
        let value = request.header(name)?;
        let prefix = format!("header.{name}");
        if !pattern.capture(value, &prefix, &mut groups) {
            return None;
        }
        groups.insert(prefix, value);
    }

    let body_matches = match stub.effective_body()? {
        BodyPattern::Absent => true,
        BodyPattern::Text(pattern) => pattern.capture(request.body_text(), "post", &mut groups),
        BodyPattern::Json(document) => json::json_body_matches(document, request.body_text(), regexes),
    };
    body_matches.then_some(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{Authorization, ExternalBody, StubResponse};
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::PathBuf;

    struct Fixture {
        store: Arc<StubStore>,
        engine: MatchingEngine,
        regexes: Arc<RegexCache>,
    }

    impl Fixture {
        fn new() -> Self {
            let cache = Arc::new(MatchCache::new(MatchCacheConfig::default()));
            let store = Arc::new(StubStore::new(cache));
            let regexes = Arc::new(RegexCache::new());
            let engine = MatchingEngine::new(Arc::clone(&store), Arc::clone(&regexes));
            Self {
                store,
                engine,
                regexes,
            }
        }

        fn pattern(&self, source: &str) -> Pattern {
            Pattern::classify(source, &self.regexes)
        }

        fn load(&self, requests: Vec<StubRequest>) {
            let lifecycles = requests
                .into_iter()
                .map(|r| StubHttpLifecycle::new(r, vec![StubResponse::new(200)]))
                .collect();
            self.store.replace(lifecycles, HashMap::new());
        }

        fn matched_index(&self, request: &IncomingRequest) -> Option<usize> {
            match self.engine.resolve(request) {
                MatchOutcome::Matched { index, .. } => Some(index),
                MatchOutcome::Unmatched => None,
            }
        }

        fn groups(&self, request: &IncomingRequest) -> Arc<RegexGroups> {
            match self.engine.resolve(request) {
                MatchOutcome::Matched { groups, .. } => groups,
                MatchOutcome::Unmatched => panic!("expected a match for {}", request.url),
            }
        }
    }

    #[test]
    fn test_literal_url_match() {
        let f = Fixture::new();
        f.load(vec![
            StubRequest::new(f.pattern("/a")),
            StubRequest::new(f.pattern("/b")),
        ]);
        assert_eq!(f.matched_index(&IncomingRequest::new("GET", "/a")), Some(0));
        assert_eq!(f.matched_index(&IncomingRequest::new("GET", "/b")), Some(1));
        assert_eq!(f.matched_index(&IncomingRequest::new("GET", "/c")), None);
    }

    #[test]
    fn test_literal_url_trailing_slash_insensitive() {
        let f = Fixture::new();
        f.load(vec![StubRequest::new(f.pattern("/users"))]);
        assert_eq!(f.matched_index(&IncomingRequest::new("GET", "/users/")), Some(0));
    }

    #[test]
    fn test_method_filter() {
        let f = Fixture::new();
        f.load(vec![
            StubRequest::new(f.pattern("/items")).with_methods(["POST", "PUT"])
        ]);
        assert_eq!(f.matched_index(&IncomingRequest::new("GET", "/items")), None);
        assert_eq!(f.matched_index(&IncomingRequest::new("PUT", "/items")), Some(0));
    }

    #[test]
    fn test_url_regex_groups() {
        let f = Fixture::new();
        f.load(vec![StubRequest::new(f.pattern(r"/invoice/(\d+)"))]);
        let groups = f.groups(&IncomingRequest::new("GET", "/invoice/123"));
        assert_eq!(groups.get("url.1"), Some("123"));
        assert_eq!(f.matched_index(&IncomingRequest::new("GET", "/invoice/x")), None);
    }

    #[test]
    fn test_sparse_query_match_with_groups() {
        let f = Fixture::new();
        f.load(vec![StubRequest::new(f.pattern("/search"))
            .with_query("type", f.pattern("book"))
            .with_query("page", f.pattern(r"(\d+)"))]);

        let request = IncomingRequest::new("GET", "/search")
            .with_query("page", "7")
            .with_query("type", "book")
            .with_query("extra", "ignored");
        let groups = f.groups(&request);
        assert_eq!(groups.get("query.type"), Some("book"));
        assert_eq!(groups.get("query.page"), Some("7"));
        assert_eq!(groups.get("query.page.1"), Some("7"));

        let missing = IncomingRequest::new("GET", "/search").with_query("type", "book");
        assert_eq!(f.matched_index(&missing), None);
    }

    #[test]
    fn test_header_match_case_insensitive() {
        let f = Fixture::new();
        f.load(vec![
            StubRequest::new(f.pattern("/h")).with_header("X-Tenant", f.pattern(r"t-(\w+)"))
        ]);
        let request = IncomingRequest::new("GET", "/h").with_header("x-TENANT", "t-acme");
        let groups = f.groups(&request);
        assert_eq!(groups.get("header.x-tenant"), Some("t-acme"));
        assert_eq!(groups.get("header.x-tenant.1"), Some("acme"));

        let wrong = IncomingRequest::new("GET", "/h").with_header("X-Tenant", "other");
        assert_eq!(f.matched_index(&wrong), None);
    }

    #[test]
    fn test_body_literal_regex_and_json() {
        let f = Fixture::new();
        f.load(vec![
            StubRequest::new(f.pattern("/literal"))
                .with_methods(["POST"])
                .with_body(BodyPattern::Text(Pattern::literal("exact body"))),
            StubRequest::new(f.pattern("/regex"))
                .with_methods(["POST"])
                .with_body(BodyPattern::Text(Pattern::regex(r"name=(\w+)", &f.regexes))),
            StubRequest::new(f.pattern("/json"))
                .with_methods(["POST"])
                .with_body(BodyPattern::Json(json!({"a": "^x.*"}))),
        ]);

        let post = |url: &str, body: &str| IncomingRequest::new("POST", url).with_body(body);

        assert_eq!(f.matched_index(&post("/literal", "exact body")), Some(0));
        assert_eq!(f.matched_index(&post("/literal", "exact body!")), None);

        let groups = f.groups(&post("/regex", "name=ada"));
        assert_eq!(groups.get("post.1"), Some("ada"));

        assert_eq!(f.matched_index(&post("/json", r#"{"a":"xyz","b":1}"#)), Some(2));
        assert_eq!(f.matched_index(&post("/json", r#"{"a":"yz"}"#)), None);
        assert_eq!(f.matched_index(&post("/json", "not json")), None);
    }

    #[test]
    fn test_json_body_contributes_no_groups() {
        let f = Fixture::new();
        f.load(vec![StubRequest::new(f.pattern("/json"))
            .with_methods(["POST"])
            .with_body(BodyPattern::Json(json!({"id": "(\\d+)"})))]);
        let groups = f.groups(&IncomingRequest::new("POST", "/json").with_body(r#"{"id":"5"}"#));
        assert!(groups.is_empty());
    }

    #[test]
    fn test_unreadable_body_file_is_unmatchable() {
        let f = Fixture::new();
        f.load(vec![
            StubRequest::new(f.pattern("/file"))
                .with_methods(["POST"])
                .with_body_file(ExternalBody {
                    path: PathBuf::from("missing.txt"),
                    content: None,
                }),
            StubRequest::new(f.pattern("/file")).with_methods(["POST"]),
        ]);
        let request = IncomingRequest::new("POST", "/file").with_body("anything");
        assert_eq!(f.matched_index(&request), Some(1));
    }

    #[test]
    fn test_first_match_wins_for_duplicates() {
        let f = Fixture::new();
        f.load(vec![
            StubRequest::new(f.pattern("/dup")),
            StubRequest::new(f.pattern("/dup")),
        ]);
        for _ in 0..3 {
            assert_eq!(f.matched_index(&IncomingRequest::new("GET", "/dup")), Some(0));
        }
    }

    #[test]
    fn test_invalid_regex_is_unreachable_but_harmless() {
        let f = Fixture::new();
        f.load(vec![
            StubRequest::new(f.pattern("/broken/(")),
            StubRequest::new(f.pattern("/ok")),
        ]);
        assert_eq!(f.matched_index(&IncomingRequest::new("GET", "/broken/x")), None);
        assert_eq!(f.matched_index(&IncomingRequest::new("GET", "/ok")), Some(1));
    }

    #[test]
    fn test_authorization_does_not_affect_matching() {
        let f = Fixture::new();
        f.load(vec![StubRequest::new(f.pattern("/secure"))
            .with_authorization(Authorization::Basic("abc123".to_string()))]);
        assert_eq!(f.matched_index(&IncomingRequest::new("GET", "/secure")), Some(0));
    }

    #[test]
    fn test_second_identical_request_served_from_cache() {
        let f = Fixture::new();
        f.load(vec![StubRequest::new(f.pattern(r"/invoice/(\d+)"))]);
        let request = IncomingRequest::new("GET", "/invoice/9");

        let first = f.engine.resolve(&request);
        let second = f.engine.resolve(&request);
        assert!(matches!(first, MatchOutcome::Matched { cached: false, .. }));
        match second {
            MatchOutcome::Matched { cached, groups, .. } => {
                assert!(cached);
                assert_eq!(groups.get("url.1"), Some("9"));
            }
            MatchOutcome::Unmatched => panic!("expected a match"),
        }
        assert_eq!(f.store.cache().metrics().hits, 1);
    }

    #[test]
    fn test_cache_does_not_outlive_replace() {
        let f = Fixture::new();
        f.load(vec![StubRequest::new(f.pattern("/a"))]);
        let request = IncomingRequest::new("GET", "/a");
        assert!(f.engine.resolve(&request).is_matched());
        assert!(f.engine.resolve(&request).is_matched());

        f.load(vec![StubRequest::new(f.pattern("/b"))]);
        assert!(!f.engine.resolve(&request).is_matched());
        assert_eq!(f.matched_index(&IncomingRequest::new("GET", "/b")), Some(0));
    }

    #[test]
    fn test_stale_generation_entry_is_ignored() {
        let f = Fixture::new();
        f.load(vec![StubRequest::new(f.pattern("/a"))]);
        let request = IncomingRequest::new("GET", "/a");
        f.store.cache().put(
            Fingerprint::of(&request),
            CachedMatch {
                generation: 999,
                index: 42,
                groups: Arc::new(RegexGroups::new()),
            },
        );
        match f.engine.resolve(&request) {
            MatchOutcome::Matched { index, cached, .. } => {
                assert_eq!(index, 0);
                assert!(!cached);
            }
            MatchOutcome::Unmatched => panic!("expected a match"),
        }
    }
}
