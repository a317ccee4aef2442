//! Facade used by the listeners, the admin API and the reload scanners.

use crate::config::{ParsedConfig, StubParser};
use crate::error::ReloadError;
use crate::fs::FileSystem;
use crate::matching::{CacheMetrics, MatchCache, MatchCacheConfig, MatchingEngine, RegexCache};
use crate::metrics;
use crate::request::IncomingRequest;
use crate::resolver::{ResponseDescriptor, ResponseResolver};
use crate::store::{ExternalFiles, Snapshot, StubStore};
use crate::transport::HttpTransport;
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{info, warn};

/// Matching engine, response resolver and store behind one entry point.
pub struct StubService {
    store: Arc<StubStore>,
    engine: MatchingEngine,
    resolver: ResponseResolver,
}

impl StubService {
    /// Service with an empty store.
    pub fn new(
        cache_config: MatchCacheConfig,
        regexes: Arc<RegexCache>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let cache = Arc::new(MatchCache::new(cache_config));
        let store = Arc::new(StubStore::new(cache));
        Self {
            engine: MatchingEngine::new(Arc::clone(&store), regexes),
            resolver: ResponseResolver::new(transport),
            store,
        }
    }

    /// Resolve one inbound request into the response to send.
    pub async fn resolve(&self, request: IncomingRequest) -> ResponseDescriptor {
        let start = Instant::now();
        let outcome = self.engine.resolve(&request);
        let response = self.resolver.resolve(outcome, &request).await;
        metrics::record_request(
            response.kind.as_str(),
            start.elapsed().as_secs_f64() * 1000.0,
        );
        response
    }

    /// Atomically swap in a parsed configuration and return its generation.
    pub fn replace_store(&self, config: ParsedConfig) -> u64 {
        metrics::set_stubs_loaded(config.lifecycles.len());
        self.store.replace(config.lifecycles, config.external_files)
    }

    pub fn current_external_file_watermarks(&self) -> ExternalFiles {
        self.store.external_file_watermarks()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.snapshot()
    }

    pub fn cache_metrics(&self) -> CacheMetrics {
        self.store.cache().metrics()
    }
}

/// What triggered a reload; used in logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadSource {
    Config,
    ExternalFile,
    Admin,
}

impl ReloadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadSource::Config => "config",
            ReloadSource::ExternalFile => "external",
            ReloadSource::Admin => "admin",
        }
    }
}

/// Read, parse and swap. A failed attempt leaves the current snapshot alone.
pub struct Reloader {
    config_path: PathBuf,
    parser: Arc<dyn StubParser>,
    fs: Arc<dyn FileSystem>,
    service: Arc<StubService>,
    /// Config mtime observed just before the most recent read.
    loaded_mtime: Mutex<Option<SystemTime>>,
}

impl Reloader {
    pub fn new(
        config_path: impl Into<PathBuf>,
        parser: Arc<dyn StubParser>,
        fs: Arc<dyn FileSystem>,
        service: Arc<StubService>,
    ) -> Self {
        Self {
            config_path: config_path.into(),
            parser,
            fs,
            service,
            loaded_mtime: Mutex::new(None),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Directory file references are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn config_mtime(&self) -> io::Result<SystemTime> {
        self.fs.mtime(&self.config_path)
    }

    /// Mtime of the configuration text last read by [`load`](Self::load).
    pub fn loaded_config_mtime(&self) -> Option<SystemTime> {
        *self.loaded_mtime.lock()
    }

    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    pub fn service(&self) -> &Arc<StubService> {
        &self.service
    }

    /// Read and parse the main configuration without applying it.
    ///
    /// The file is stat'ed before it is read, so an edit landing during the
    /// read leaves the recorded mtime behind and is seen by the next scan.
    pub fn load(&self) -> Result<ParsedConfig, ReloadError> {
        if let Ok(mtime) = self.config_mtime() {
            *self.loaded_mtime.lock() = Some(mtime);
        }
        let text = self
            .fs
            .read_to_string(&self.config_path)
            .map_err(|source| ReloadError::Read {
                path: self.config_path.clone(),
                source,
            })?;
        self.parse(&text)
    }

    fn parse(&self, text: &str) -> Result<ParsedConfig, ReloadError> {
        self.parser
            .parse(&self.base_dir(), text)
            .map_err(|source| ReloadError::Parse {
                path: self.config_path.clone(),
                source,
            })
    }

    /// Reparse the main configuration and swap it in. Returns the stub count.
    pub fn reload(&self, source: ReloadSource) -> Result<usize, ReloadError> {
        let result = self.load().map(|parsed| self.apply(parsed, source));
        self.finish(result, source)
    }

    /// Swap in configuration text supplied directly (admin upload).
    pub fn replace_from_text(&self, text: &str, source: ReloadSource) -> Result<usize, ReloadError> {
        let result = self.parse(text).map(|parsed| self.apply(parsed, source));
        self.finish(result, source)
    }

    fn apply(&self, parsed: ParsedConfig, source: ReloadSource) -> usize {
        let stubs = parsed.lifecycles.len();
        let generation = self.service.replace_store(parsed);
        info!(
            "Reloaded {} stubs from {} (source={}, generation={})",
            stubs,
            self.config_path.display(),
            source.as_str(),
            generation
        );
        stubs
    }

    fn finish(
        &self,
        result: Result<usize, ReloadError>,
        source: ReloadSource,
    ) -> Result<usize, ReloadError> {
        metrics::record_reload(source.as_str(), result.is_ok());
        if let Err(e) = &result {
            warn!(
                "Reload ({}) failed, keeping previous configuration: {}",
                source.as_str(),
                e
            );
        }
        result
    }
}
