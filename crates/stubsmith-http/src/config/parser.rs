//! YAML configuration front-end: text in, ordered stub lifecycles out.

use super::yaml::{
    body_to_string, mapping_pairs, scalar_to_u64, RawCallback, RawComposite,
    RawRequest, RawResponse, RawStub,
};
use crate::error::ParseError;
use crate::fs::FileSystem;
use crate::matching::RegexCache;
use crate::store::ExternalFiles;
use crate::stub::{
    Authorization, BodyPattern, Callback, ExternalBody, Pattern, ResponseBody, StubHttpLifecycle,
    StubRequest, StubResponse,
};
use bytes::Bytes;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of parsing one configuration document.
#[derive(Debug, Default)]
pub struct ParsedConfig {
    /// Stubs in configuration order
    pub lifecycles: Vec<StubHttpLifecycle>,
    /// Every referenced file with its modification time at parse time
    pub external_files: ExternalFiles,
}

/// Turns configuration text into stub lifecycles. File references are
/// resolved relative to `base_path`, the directory of the configuration.
pub trait StubParser: Send + Sync {
    fn parse(&self, base_path: &Path, text: &str) -> Result<ParsedConfig, ParseError>;
}

/// [`StubParser`] for the YAML stub format.
pub struct YamlParser {
    fs: Arc<dyn FileSystem>,
    regexes: Arc<RegexCache>,
}

impl YamlParser {
    pub fn new(fs: Arc<dyn FileSystem>, regexes: Arc<RegexCache>) -> Self {
        Self { fs, regexes }
    }
}

impl StubParser for YamlParser {
    fn parse(&self, base_path: &Path, text: &str) -> Result<ParsedConfig, ParseError> {
        let document: Value = serde_yaml::from_str(text)?;
        let mut context = ParseContext {
            base_path,
            fs: self.fs.as_ref(),
            regexes: &self.regexes,
            parsed: ParsedConfig::default(),
        };

        match document {
            Value::Null => {}
            Value::Sequence(_) => {
                let stubs: Vec<RawStub> = serde_yaml::from_value(document)?;
                context.add_stubs(stubs)?;
            }
            Value::Mapping(_) => {
                let composite: RawComposite = serde_yaml::from_value(document)?;
                context.add_stubs(composite.stubs)?;
                for include in &composite.includes {
                    let stubs = context.read_include(include)?;
                    context.add_stubs(stubs)?;
                }
            }
            _ => {
                return Err(ParseError::InvalidDocument(
                    "expected a sequence of stubs or a mapping with 'includes'/'stubs'".to_string(),
                ))
            }
        }

        debug!(
            "Parsed {} stubs referencing {} external files",
            context.parsed.lifecycles.len(),
            context.parsed.external_files.len()
        );
        Ok(context.parsed)
    }
}

struct ParseContext<'a> {
    base_path: &'a Path,
    fs: &'a dyn FileSystem,
    regexes: &'a RegexCache,
    parsed: ParsedConfig,
}

impl ParseContext<'_> {
    fn resolve(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative.trim());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Record `path` as watched (mtime first, so an edit racing with the
    /// read is seen on the next scan) and return its content.
    fn read_watched(&mut self, path: &Path) -> std::io::Result<Vec<u8>> {
        let mtime = self.fs.mtime(path).ok();
        self.parsed.external_files.insert(path.to_path_buf(), mtime);
        self.fs.read_file(path)
    }

    fn read_include(&mut self, include: &str) -> Result<Vec<RawStub>, ParseError> {
        let path = self.resolve(include);
        let bytes = self.read_watched(&path).map_err(|source| ParseError::Include {
            path: path.clone(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let stubs: Option<Vec<RawStub>> =
            serde_yaml::from_str(&text).map_err(|source| ParseError::IncludeYaml {
                path: path.clone(),
                source,
            })?;
        Ok(stubs.unwrap_or_default())
    }

    fn add_stubs(&mut self, stubs: Vec<RawStub>) -> Result<(), ParseError> {
        for raw in stubs {
            let index = self.parsed.lifecycles.len();
            let lifecycle = self.lifecycle(index, raw)?;
            self.parsed.lifecycles.push(lifecycle);
        }
        Ok(())
    }

    fn lifecycle(&mut self, index: usize, raw: RawStub) -> Result<StubHttpLifecycle, ParseError> {
        let raw_request = raw
            .request
            .ok_or_else(|| ParseError::stub(index, "missing 'request'"))?;
        let request = self.request(index, raw_request)?;

        let responses = match raw.response {
            Some(responses) => responses
                .into_vec()
                .into_iter()
                .map(|r| self.response(index, r))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let mut lifecycle = StubHttpLifecycle::new(request, responses);
        if let Some(description) = raw.description {
            lifecycle = lifecycle.with_description(description);
        }
        if let Some(callback) = raw.callback {
            lifecycle = lifecycle.with_callback(callback_from(index, callback)?);
        }
        Ok(lifecycle)
    }

    fn request(&mut self, index: usize, mut raw: RawRequest) -> Result<StubRequest, ParseError> {
        let url = raw
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ParseError::stub(index, "request is missing 'url'"))?;

        let mut request = StubRequest::new(Pattern::classify(url, self.regexes));
        if let Some(methods) = raw.method.take() {
            request = request.with_methods(methods.into_vec());
        }

        if let Some(query) = &raw.query {
            for (name, value) in mapping_pairs(query).map_err(|e| ParseError::stub(index, e))? {
                request = request.with_query(name, Pattern::classify(&value, self.regexes));
            }
        }

        if let Some(headers) = &raw.headers {
            for (name, value) in mapping_pairs(headers).map_err(|e| ParseError::stub(index, e))? {
                request = match name.to_ascii_lowercase().as_str() {
                    "authorization-basic" => {
                        request.with_authorization(Authorization::basic_from_config(&value))
                    }
                    "authorization-bearer" => request
                        .with_authorization(Authorization::Bearer(value.trim().to_string())),
                    "authorization-custom" => request
                        .with_authorization(Authorization::Custom(value.trim().to_string())),
                    _ => request.with_header(name, Pattern::classify(&value, self.regexes)),
                };
            }
        }

        let kind = BodyKind::declared(index, &raw)?;
        request = request.with_body(kind.inline(index, &raw, self.regexes)?);

        if let Some(file) = raw.file.as_deref() {
            let path = self.resolve(file);
            let content = match self.read_watched(&path) {
                Ok(bytes) => kind.from_file(&path, &bytes, self.regexes),
                Err(e) => {
                    warn!(
                        "Stub #{}: request file {} is unreadable, stub disabled: {}",
                        index,
                        path.display(),
                        e
                    );
                    None
                }
            };
            request = request.with_body_file(ExternalBody { path, content });
        }

        Ok(request)
    }

    fn response(&mut self, index: usize, raw: RawResponse) -> Result<StubResponse, ParseError> {
        let status = match &raw.status {
            None | Some(Value::Null) => 200,
            Some(value) => scalar_to_u64(value)
                .filter(|s| (100..=999).contains(s))
                .ok_or_else(|| ParseError::stub(index, format!("invalid status {value:?}")))?
                as u16,
        };

        let headers = match &raw.headers {
            Some(mapping) => mapping_pairs(mapping).map_err(|e| ParseError::stub(index, e))?,
            None => Vec::new(),
        };

        let latency_ms = latency(index, raw.latency.as_ref())?;

        let body = match raw.file.as_deref() {
            Some(file) => {
                let path = self.resolve(file);
                let content = match self.read_watched(&path) {
                    Ok(bytes) => Bytes::from(bytes),
                    Err(e) => {
                        warn!(
                            "Stub #{}: response file {} is unreadable, serving an empty body: {}",
                            index,
                            path.display(),
                            e
                        );
                        Bytes::new()
                    }
                };
                ResponseBody::File { path, content }
            }
            None => ResponseBody::Literal(match &raw.body {
                Some(body) => body_to_string(body).map_err(|e| ParseError::stub(index, e))?,
                None => String::new(),
            }),
        };

        Ok(StubResponse {
            status,
            headers,
            body,
            latency_ms,
        })
    }
}

fn latency(index: usize, value: Option<&Value>) -> Result<Option<u64>, ParseError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_to_u64(value)
            .map(Some)
            .ok_or_else(|| ParseError::stub(index, format!("invalid latency {value:?}"))),
    }
}

fn callback_from(index: usize, raw: RawCallback) -> Result<Callback, ParseError> {
    let url = raw
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ParseError::stub(index, "callback is missing 'url'"))?;

    let mut callback = Callback::new(raw.method.as_deref().unwrap_or("POST").trim(), url);
    if let Some(headers) = &raw.headers {
        callback.headers = mapping_pairs(headers).map_err(|e| ParseError::stub(index, e))?;
    }
    if let Some(body) = &raw.body {
        callback.body = body_to_string(body).map_err(|e| ParseError::stub(index, e))?;
    }
    callback.latency_ms = latency(index, raw.latency.as_ref())?;
    Ok(callback)
}

/// How a request body (inline or from file) is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Literal,
    Regex,
    Json,
}

impl BodyKind {
    fn declared(index: usize, raw: &RawRequest) -> Result<Self, ParseError> {
        let declared = [
            raw.post.is_some(),
            raw.post_regex.is_some(),
            raw.json.is_some(),
        ];
        if declared.iter().filter(|d| **d).count() > 1 {
            return Err(ParseError::stub(
                index,
                "only one of 'post', 'post-regex' and 'json' may be given",
            ));
        }
        Ok(if raw.json.is_some() {
            BodyKind::Json
        } else if raw.post_regex.is_some() {
            BodyKind::Regex
        } else {
            BodyKind::Literal
        })
    }

    fn inline(
        self,
        index: usize,
        raw: &RawRequest,
        regexes: &RegexCache,
    ) -> Result<BodyPattern, ParseError> {
        Ok(match self {
            BodyKind::Literal => match &raw.post {
                Some(post) => BodyPattern::Text(Pattern::literal(post.as_str())),
                None => BodyPattern::Absent,
            },
            BodyKind::Regex => match &raw.post_regex {
                Some(source) => BodyPattern::Text(Pattern::regex(source, regexes)),
                None => BodyPattern::Absent,
            },
            BodyKind::Json => match &raw.json {
                Some(Value::String(text)) => BodyPattern::Json(
                    serde_json::from_str(text)
                        .map_err(|e| ParseError::stub(index, format!("invalid 'json': {e}")))?,
                ),
                Some(structured) => BodyPattern::Json(
                    serde_json::to_value(structured)
                        .map_err(|e| ParseError::stub(index, format!("invalid 'json': {e}")))?,
                ),
                None => BodyPattern::Absent,
            },
        })
    }

    /// Body pattern from file content, trailing line endings removed.
    /// `None` when a JSON file does not hold valid JSON.
    fn from_file(self, path: &Path, bytes: &[u8], regexes: &RegexCache) -> Option<BodyPattern> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.trim_end_matches(['\r', '\n']);
        match self {
            BodyKind::Literal => Some(BodyPattern::Text(Pattern::literal(text))),
            BodyKind::Regex => Some(BodyPattern::Text(Pattern::regex(text, regexes))),
            BodyKind::Json => match serde_json::from_str(text) {
                Ok(document) => Some(BodyPattern::Json(document)),
                Err(e) => {
                    warn!(
                        "Request file {} is not valid JSON, stub disabled: {}",
                        path.display(),
                        e
                    );
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn parser() -> YamlParser {
        YamlParser::new(Arc::new(OsFileSystem), Arc::new(RegexCache::new()))
    }

    fn parse(dir: &TempDir, text: &str) -> ParsedConfig {
        parser().parse(dir.path(), text).unwrap()
    }

    #[test]
    fn test_parse_sequence_in_order() {
        let dir = TempDir::new().unwrap();
        let parsed = parse(
            &dir,
            r#"
- request:
    url: /first
  response:
    body: one
- description: second stub
  request:
    method: [post, PUT]
    url: ^/invoice/(\d+)$
  response:
    status: 201
    headers:
      content-type: application/json
    body: '{"id": "{{url.1}}"}'
    latency: 25
"#,
        );

        assert_eq!(parsed.lifecycles.len(), 2);
        let first = &parsed.lifecycles[0];
        assert_eq!(first.request.methods, vec!["GET"]);
        assert!(!first.request.url.is_regex());

        let second = &parsed.lifecycles[1];
        assert_eq!(second.description.as_deref(), Some("second stub"));
        assert_eq!(second.request.methods, vec!["POST", "PUT"]);
        assert!(second.request.url.is_regex());
        let response = &second.responses()[0];
        assert_eq!(response.status, 201);
        assert_eq!(response.latency_ms, Some(25));
        assert_eq!(
            response.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        assert!(parsed.external_files.is_empty());
    }

    #[test]
    fn test_parse_query_headers_and_authorization() {
        let dir = TempDir::new().unwrap();
        let parsed = parse(
            &dir,
            r#"
- request:
    url: /secure
    query:
      page: 2
      q: "[a-z]+"
    headers:
      X-Tenant: acme
      authorization-basic: "bob:secret"
"#,
        );
        let request = &parsed.lifecycles[0].request;
        assert_eq!(request.query[0], ("page".to_string(), Pattern::literal("2")));
        assert!(request.query[1].1.is_regex());
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.headers[0].0, "x-tenant");
        assert_eq!(
            request.authorization,
            Some(Authorization::Basic("Ym9iOnNlY3JldA==".to_string()))
        );
    }

    #[test]
    fn test_parse_body_kinds() {
        let dir = TempDir::new().unwrap();
        let parsed = parse(
            &dir,
            r#"
- request: { url: /a, method: POST, post: "{\"plain\": true}" }
- request: { url: /b, method: POST, post-regex: "name=(\\w+)" }
- request:
    url: /c
    method: POST
    json: { a: "^x.*" }
- request: { url: /d, method: POST, json: '{"b": [1, 2]}' }
"#,
        );
        assert_eq!(
            parsed.lifecycles[0].request.body,
            BodyPattern::Text(Pattern::literal("{\"plain\": true}"))
        );
        assert!(matches!(
            &parsed.lifecycles[1].request.body,
            BodyPattern::Text(p) if p.is_regex()
        ));
        assert_eq!(
            parsed.lifecycles[2].request.body,
            BodyPattern::Json(json!({"a": "^x.*"}))
        );
        assert_eq!(
            parsed.lifecycles[3].request.body,
            BodyPattern::Json(json!({"b": [1, 2]}))
        );
    }

    #[test]
    fn test_round_robin_responses() {
        let dir = TempDir::new().unwrap();
        let parsed = parse(
            &dir,
            r#"
- request: { url: /rr }
  response:
    - body: R1
    - status: "503"
      body: R2
"#,
        );
        let responses = parsed.lifecycles[0].responses();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1].status, 503);
    }

    #[test]
    fn test_parse_callback() {
        let dir = TempDir::new().unwrap();
        let parsed = parse(
            &dir,
            r#"
- request: { url: /cb }
  callback:
    url: http://localhost:9000/hook/{{url.0}}
    headers: { x-source: stubsmith }
    body: { id: "{{url.0}}" }
    latency: 100
"#,
        );
        let callback = parsed.lifecycles[0].callback.as_ref().unwrap();
        assert_eq!(callback.method, "POST");
        assert_eq!(callback.latency_ms, Some(100));
        assert_eq!(callback.body, r#"{"id":"{{url.0}}"}"#);
    }

    #[test]
    fn test_file_backed_bodies_are_watched() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("req.json"), "{\"id\": \"\\\\d+\"}\n").unwrap();
        fs::write(dir.path().join("resp.txt"), "from file").unwrap();

        let parsed = parse(
            &dir,
            r#"
- request:
    url: /files
    method: POST
    json: {}
    file: req.json
  response:
    file: resp.txt
"#,
        );
        let lifecycle = &parsed.lifecycles[0];
        let body_file = lifecycle.request.body_file.as_ref().unwrap();
        assert_eq!(body_file.content, Some(BodyPattern::Json(json!({"id": "\\d+"}))));
        assert_eq!(
            lifecycle.responses()[0].body,
            ResponseBody::File {
                path: dir.path().join("resp.txt"),
                content: Bytes::from_static(b"from file"),
            }
        );
        assert_eq!(parsed.external_files.len(), 2);
        assert!(parsed
            .external_files
            .values()
            .all(|mtime| mtime.is_some()));
    }

    #[test]
    fn test_missing_files_do_not_abort_loading() {
        let dir = TempDir::new().unwrap();
        let parsed = parse(
            &dir,
            r#"
- request: { url: /a, file: missing-request.txt }
  response: { file: missing-response.txt }
- request: { url: /b }
"#,
        );
        assert_eq!(parsed.lifecycles.len(), 2);
        let first = &parsed.lifecycles[0];
        assert_eq!(first.request.effective_body(), None);
        assert_eq!(
            first.responses()[0].body,
            ResponseBody::File {
                path: dir.path().join("missing-response.txt"),
                content: Bytes::new(),
            }
        );
        assert_eq!(parsed.external_files.len(), 2);
        assert!(parsed.external_files.values().all(|mtime| mtime.is_none()));
    }

    #[test]
    fn test_includes_append_after_inline_stubs() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("more.yaml"),
            "- request: { url: /included }\n",
        )
        .unwrap();
        let parsed = parse(
            &dir,
            r#"
includes: [more.yaml]
stubs:
  - request: { url: /inline }
"#,
        );
        let urls: Vec<&str> = parsed
            .lifecycles
            .iter()
            .map(|l| l.request.url.source())
            .collect();
        assert_eq!(urls, vec!["/inline", "/included"]);
        assert!(parsed
            .external_files
            .contains_key(&dir.path().join("more.yaml")));
    }

    #[test]
    fn test_structural_errors_reject_document() {
        let dir = TempDir::new().unwrap();
        let parser = parser();
        let cases = [
            "- response: { body: no request }",
            "- request: { method: GET }",
            "- request: { url: /a }\n  response: { status: ok }",
            "- request: { url: /a, post: x, json: {} }",
            "- request: { url: /a, json: '{broken' }",
            "just a string",
            "includes: [nope.yaml]",
            "- request: [",
        ];
        for case in cases {
            assert!(parser.parse(dir.path(), case).is_err(), "accepted: {case}");
        }
    }

    #[test]
    fn test_empty_document_is_empty_config() {
        let dir = TempDir::new().unwrap();
        assert!(parse(&dir, "").lifecycles.is_empty());
    }
}
