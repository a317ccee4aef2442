//! Authoritative stub configuration, replaced wholesale on reload.
//!
//! Readers take one [`Arc<Snapshot>`] per request and never see a partially
//! replaced configuration. [`StubStore::replace`] clears the match cache while
//! holding the write lock, so a reader sees either the old snapshot with the
//! old cache or the new snapshot with an empty cache.

use crate::matching::MatchCache;
use crate::stub::StubHttpLifecycle;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;

/// Watched external files and their last observed modification time.
/// `None` means the file could not be examined at load time.
pub type ExternalFiles = HashMap<PathBuf, Option<SystemTime>>;

/// One immutable configuration generation.
#[derive(Debug)]
pub struct Snapshot {
    pub generation: u64,
    pub lifecycles: Vec<Arc<StubHttpLifecycle>>,
    pub external_files: ExternalFiles,
    pub loaded_at: DateTime<Utc>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            generation: 0,
            lifecycles: Vec::new(),
            external_files: HashMap::new(),
            loaded_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.lifecycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lifecycles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<StubHttpLifecycle>> {
        self.lifecycles.get(index)
    }
}

/// Holder of the current [`Snapshot`].
#[derive(Debug)]
pub struct StubStore {
    current: RwLock<Arc<Snapshot>>,
    next_generation: AtomicU64,
    cache: Arc<MatchCache>,
}

impl StubStore {
    /// Empty store (generation 0) wired to `cache`.
    pub fn new(cache: Arc<MatchCache>) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty())),
            next_generation: AtomicU64::new(1),
            cache,
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a new configuration and return its generation.
    pub fn replace(
        &self,
        lifecycles: Vec<StubHttpLifecycle>,
        external_files: ExternalFiles,
    ) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let snapshot = Arc::new(Snapshot {
            generation,
            lifecycles: lifecycles.into_iter().map(Arc::new).collect(),
            external_files,
            loaded_at: Utc::now(),
        });
        let stubs = snapshot.len();
        let watched = snapshot.external_files.len();

        {
            let mut current = self.current.write();
            self.cache.invalidate_all();
            *current = snapshot;
        }

        info!(
            "Stub store replaced: generation={}, stubs={}, external_files={}",
            generation, stubs, watched
        );
        generation
    }

    /// Copy of the current external-file watermarks.
    pub fn external_file_watermarks(&self) -> ExternalFiles {
        self.current.read().external_files.clone()
    }

    pub fn cache(&self) -> &Arc<MatchCache> {
        &self.cache
    }
}
