#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use stubsmith_http::fs::{FileSystem, OsFileSystem};
use stubsmith_http::matching::{MatchCacheConfig, RegexCache};
use stubsmith_http::{
    HttpTransport, OutboundRequest, ReloadSource, Reloader, StubService, TransportError,
    TransportResponse, YamlParser,
};
use tempfile::TempDir;

/// Transport that records outbound requests and answers with a fixed reply.
#[derive(Default)]
pub struct FakeTransport {
    sent: Mutex<Vec<OutboundRequest>>,
    reply: Option<(u16, String)>,
}

impl FakeTransport {
    pub fn answering(status: u16, body: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reply: Some((status, body.to_string())),
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: OutboundRequest) -> Result<TransportResponse, TransportError> {
        let url = request.url.clone();
        self.sent.lock().push(request);
        match &self.reply {
            Some((status, body)) => Ok(TransportResponse {
                status: *status,
                headers: Vec::new(),
                body: Bytes::from(body.clone()),
            }),
            None => Err(TransportError::Request {
                url,
                reason: "connection refused".to_string(),
            }),
        }
    }
}

/// A stub server wired against a configuration file in a temp directory.
pub struct Harness {
    pub dir: TempDir,
    pub reloader: Arc<Reloader>,
    pub transport: Arc<FakeTransport>,
}

impl Harness {
    pub fn new(yaml: &str) -> Self {
        Self::with_transport(yaml, FakeTransport::unreachable())
    }

    pub fn with_transport(yaml: &str, transport: FakeTransport) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stubs.yaml");
        std::fs::write(&path, yaml).unwrap();

        let transport = Arc::new(transport);
        let regexes = Arc::new(RegexCache::new());
        let fs: Arc<dyn FileSystem> = Arc::new(OsFileSystem);
        let service = Arc::new(StubService::new(
            MatchCacheConfig::default(),
            Arc::clone(&regexes),
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
        ));
        let parser = Arc::new(YamlParser::new(Arc::clone(&fs), regexes));
        let reloader = Arc::new(Reloader::new(path, parser, fs, service));
        reloader.reload(ReloadSource::Config).unwrap();

        Self {
            dir,
            reloader,
            transport,
        }
    }

    pub fn service(&self) -> &Arc<StubService> {
        self.reloader.service()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Rewrite `path` with its mtime pushed `bump_secs` into the future.
pub fn rewrite(path: &Path, content: &str, bump_secs: u64) {
    std::fs::write(path, content).unwrap();
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(bump_secs))
        .unwrap();
}

pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..300 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
