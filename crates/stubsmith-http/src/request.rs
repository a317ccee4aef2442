//! Inbound request representation handed to the matching engine.

/// An inbound HTTP request, decoupled from the listener that received it.
///
/// Header names are stored lower-cased. Query parameters keep their arrival
/// order; when a name repeats, lookups see the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingRequest {
    pub method: String,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl IncomingRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// First value of query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body text, or the empty string when no body was sent.
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }

    /// Re-encoded query string, without the leading `?`.
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    urlencoding::encode(k).into_owned()
                } else {
                    format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Parse a raw query string into ordered, percent-decoded pairs.
pub fn parse_query_string(query: Option<&str>) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(q) = query {
        for pair in q.split('&') {
            if let Some((key, value)) = pair.split_once('=') {
                params.push((decode_component(key), decode_component(value)));
            } else if !pair.is_empty() {
                params.push((decode_component(pair), String::new()));
            }
        }
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

/// Strip a trailing slash so `/users/` and `/users` compare equal. The root
/// path and the empty path both normalize to `/`.
pub fn normalize_url(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_string() {
        let params = parse_query_string(Some("name=John%20Doe&age=30&flag&q=a+b"));
        assert_eq!(
            params,
            vec![
                ("name".to_string(), "John Doe".to_string()),
                ("age".to_string(), "30".to_string()),
                ("flag".to_string(), String::new()),
                ("q".to_string(), "a b".to_string()),
            ]
        );
        assert!(parse_query_string(None).is_empty());
        assert!(parse_query_string(Some("")).is_empty());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("/users/"), "/users");
        assert_eq!(normalize_url("/users"), "/users");
        assert_eq!(normalize_url("/"), "/");
        assert_eq!(normalize_url(""), "/");
        assert_eq!(normalize_url("/a//"), "/a");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = IncomingRequest::new("GET", "/").with_header("Content-Type", "text/plain");
        assert_eq!(req.header("content-type"), Some("text/plain"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(req.headers[0].0, "content-type");
    }

    #[test]
    fn test_query_param_first_occurrence_wins() {
        let req = IncomingRequest::new("GET", "/")
            .with_query("id", "1")
            .with_query("id", "2");
        assert_eq!(req.query_param("id"), Some("1"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn test_query_string_round_trip() {
        let req = IncomingRequest::new("GET", "/")
            .with_query("name", "a b")
            .with_query("flag", "");
        assert_eq!(req.query_string(), "name=a%20b&flag");
    }
}
