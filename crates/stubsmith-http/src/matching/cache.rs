//! TTL-bounded cache of resolved matches keyed by request fingerprint.
//!
//! Entries point into a specific store snapshot (generation + index), so a
//! hit must be re-validated against the current snapshot before use. The
//! store calls [`MatchCache::invalidate_all`] under its write lock whenever a
//! snapshot is replaced.

use super::fingerprint::Fingerprint;
use super::groups::RegexGroups;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Configuration for the match cache
#[derive(Clone, Debug)]
pub struct MatchCacheConfig {
    /// Maximum number of entries; 0 disables the cache
    pub max_entries: usize,
    /// TTL for entries in seconds (0 = no expiration)
    pub ttl_seconds: u64,
}

impl Default for MatchCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            ttl_seconds: 60,
        }
    }
}

/// A previously resolved match.
#[derive(Clone, Debug)]
pub struct CachedMatch {
    /// Generation of the snapshot the index refers to
    pub generation: u64,
    /// Position of the lifecycle in that snapshot
    pub index: usize,
    /// Regex groups captured when the match was computed
    pub groups: Arc<RegexGroups>,
}

#[derive(Clone, Debug)]
struct CacheEntry {
    value: CachedMatch,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        !ttl.is_zero() && self.created_at.elapsed() > ttl
    }
}

/// Counters describing cache behaviour
#[derive(Clone, Debug, Default, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub invalidations: u64,
    pub size: usize,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Entries and metrics behind a single lock.
#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<Fingerprint, CacheEntry>,
    metrics: CacheMetrics,
}

/// Thread-safe match cache; callers never hold an external lock.
#[derive(Debug)]
pub struct MatchCache {
    config: MatchCacheConfig,
    state: Mutex<CacheState>,
}

impl MatchCache {
    pub fn new(config: MatchCacheConfig) -> Self {
        debug!(
            "Creating match cache: max_entries={}, ttl={}s",
            config.max_entries, config.ttl_seconds
        );
        Self {
            config,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.max_entries > 0
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.ttl_seconds)
    }

    /// Cached match for `key`, unless absent or expired.
    pub fn get(&self, key: &Fingerprint) -> Option<CachedMatch> {
        if !self.is_enabled() {
            return None;
        }

        let ttl = self.ttl();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let expired = match state.entries.get(key) {
            Some(entry) if entry.is_expired(ttl) => true,
            Some(entry) => {
                let value = entry.value.clone();
                state.metrics.hits += 1;
                trace!("Match cache hit (index {})", value.index);
                return Some(value);
            }
            None => false,
        };

        if expired {
            state.entries.remove(key);
            state.metrics.expirations += 1;
            state.metrics.size = state.entries.len();
        }
        state.metrics.misses += 1;
        None
    }

    /// Record a match. At capacity, expired entries are dropped first and
    /// then the oldest entry is overwritten.
    pub fn put(&self, key: Fingerprint, value: CachedMatch) {
        if !self.is_enabled() {
            return;
        }

        let ttl = self.ttl();
        let mut state = self.state.lock();

        if state.entries.len() >= self.config.max_entries && !state.entries.contains_key(&key) {
            Self::evict(&mut state, ttl);
        }

        state.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );
        state.metrics.inserts += 1;
        state.metrics.size = state.entries.len();
    }

    fn evict(state: &mut CacheState, ttl: Duration) {
        let before = state.entries.len();
        state.entries.retain(|_, entry| !entry.is_expired(ttl));
        let expired = before - state.entries.len();
        if expired > 0 {
            state.metrics.expirations += expired as u64;
            return;
        }

        let oldest = state
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.created_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            state.entries.remove(&key);
            state.metrics.evictions += 1;
        }
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.metrics.invalidations += 1;
        state.metrics.size = 0;
        debug!("Match cache invalidated");
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.state.lock().metrics.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::IncomingRequest;
    use std::thread;

    fn key(path: &str) -> Fingerprint {
        Fingerprint::of(&IncomingRequest::new("GET", path))
    }

    fn entry(index: usize) -> CachedMatch {
        CachedMatch {
            generation: 1,
            index,
            groups: Arc::new(RegexGroups::new()),
        }
    }

    #[test]
    fn test_cache_basic_operations() {
        let cache = MatchCache::new(MatchCacheConfig {
            max_entries: 10,
            ttl_seconds: 0,
        });

        assert!(cache.get(&key("/a")).is_none());
        cache.put(key("/a"), entry(3));

        let cached = cache.get(&key("/a")).unwrap();
        assert_eq!(cached.index, 3);
        assert_eq!(cached.generation, 1);

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.inserts, 1);
        assert_eq!(metrics.size, 1);
        assert_eq!(metrics.hit_rate(), 0.5);
    }

    #[test]
    fn test_cache_expiration() {
        let cache = MatchCache::new(MatchCacheConfig {
            max_entries: 10,
            ttl_seconds: 1,
        });
        cache.put(key("/a"), entry(0));
        assert!(cache.get(&key("/a")).is_some());

        thread::sleep(Duration::from_millis(1100));

        assert!(cache.get(&key("/a")).is_none());
        assert_eq!(cache.metrics().expirations, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_capacity_overwrites_oldest() {
        let cache = MatchCache::new(MatchCacheConfig {
            max_entries: 3,
            ttl_seconds: 0,
        });
        for i in 0..3 {
            cache.put(key(&format!("/p{i}")), entry(i));
            thread::sleep(Duration::from_millis(2));
        }
        cache.put(key("/p3"), entry(3));

        assert_eq!(cache.len(), 3);
        assert!(cache.get(&key("/p0")).is_none());
        assert!(cache.get(&key("/p3")).is_some());
        assert_eq!(cache.metrics().evictions, 1);
    }

    #[test]
    fn test_cache_update_existing_key_does_not_evict() {
        let cache = MatchCache::new(MatchCacheConfig {
            max_entries: 1,
            ttl_seconds: 0,
        });
        cache.put(key("/a"), entry(0));
        cache.put(key("/a"), entry(1));
        assert_eq!(cache.get(&key("/a")).unwrap().index, 1);
        assert_eq!(cache.metrics().evictions, 0);
    }

    #[test]
    fn test_cache_invalidate_all() {
        let cache = MatchCache::new(MatchCacheConfig::default());
        for i in 0..5 {
            cache.put(key(&format!("/p{i}")), entry(i));
        }
        assert_eq!(cache.len(), 5);

        cache.invalidate_all();
        assert!(cache.is_empty());
        assert_eq!(cache.metrics().invalidations, 1);
    }

    #[test]
    fn test_cache_disabled() {
        let cache = MatchCache::new(MatchCacheConfig {
            max_entries: 0,
            ttl_seconds: 0,
        });
        cache.put(key("/a"), entry(0));
        assert!(cache.get(&key("/a")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_concurrent_access() {
        let cache = Arc::new(MatchCache::new(MatchCacheConfig::default()));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..50 {
                        let k = key(&format!("/t{t}/{i}"));
                        cache.put(k.clone(), entry(i));
                        assert!(cache.get(&k).is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 200);
    }
}
