//! LRU result cache with TTL, tag and pattern invalidation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use super::clock::{Clock, SystemClock};
use super::key::cache_key;
use crate::config::CacheSettings;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// When false every lookup misses and nothing is stored.
    pub enabled: bool,

    /// Maximum number of entries; inserting beyond it evicts the least
    /// recently used entry.
    pub max_size: usize,

    /// TTL for writes that do not give one.
    pub default_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::from(&CacheSettings::default())
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_size: settings.max_size,
            default_ttl: Duration::from_secs(settings.default_ttl_seconds),
        }
    }
}

impl CacheConfig {
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ============================================================================
// Entries and statistics
// ============================================================================

/// A cached value and its bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    /// SHA-256 of `original_key`.
    pub key: String,
    /// Normalized request text plus canonical parameters.
    pub original_key: String,
    pub created_at: DateTime<Utc>,
    /// `None` when the TTL is too large to represent.
    pub expires_at: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub tags: Vec<String>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Counters since creation or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_queries: u64,
}

impl CacheMetrics {
    /// Fraction of lookups that hit, in `[0, 1]`; 0 when there were none.
    pub fn hit_rate(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_queries as f64
        }
    }
}

/// Snapshot reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
    pub evictions: u64,
    pub total_queries: u64,
    pub ttl_seconds: u64,
    pub backend_kind: &'static str,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Counters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheMetrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheMetrics {
            hits,
            misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            total_queries: hits + misses,
        }
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

// ============================================================================
// Query cache
// ============================================================================

struct Inner<V> {
    entries: LruCache<String, CacheEntry<V>>,
    /// tag -> keys of entries carrying it
    tags: HashMap<String, HashSet<String>>,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.pop(key)?;
        self.unindex(key, &entry.tags);
        Some(entry)
    }

    fn unindex(&mut self, key: &str, tags: &[String]) {
        for tag in tags {
            if let Some(keys) = self.tags.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
    }
}

/// Thread-safe result cache.
///
/// Every operation takes one lock. Expired entries are dropped when read;
/// there is no background sweep.
pub struct QueryCache<V = Value> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner<V>>,
    counters: Counters,
}

impl<V: Clone> QueryCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                tags: HashMap::new(),
            }),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a value. Counts a hit or a miss and refreshes recency.
    pub fn get(&self, text: &str, params: Option<&Value>) -> Option<V> {
        if !self.config.enabled {
            return None;
        }
        let (key, _) = cache_key(text, params);
        let now = self.clock.now();

        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get_mut(&key) {
            if !entry.is_expired(now) {
                entry.access_count += 1;
                self.counters.hit();
                return Some(entry.value.clone());
            }
            inner.remove(&key);
            tracing::debug!(key = %key, "cache entry expired");
        }
        self.counters.miss();
        None
    }

    /// Store a value. Returns false when the cache is disabled or has no
    /// capacity.
    pub fn set(
        &self,
        text: &str,
        params: Option<&Value>,
        value: V,
        ttl: Option<Duration>,
        tags: &[String],
    ) -> bool {
        if !self.config.enabled || self.config.max_size == 0 {
            return false;
        }
        let (key, original_key) = cache_key(text, params);
        let now = self.clock.now();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|d| now.checked_add_signed(d));

        let mut tags = tags.to_vec();
        tags.sort();
        tags.dedup();

        let mut inner = self.inner.lock();
        inner.remove(&key);
        for tag in &tags {
            inner.tags.entry(tag.clone()).or_default().insert(key.clone());
        }
        inner.entries.push(
            key.clone(),
            CacheEntry {
                value,
                key,
                original_key,
                created_at: now,
                expires_at,
                access_count: 0,
                tags,
            },
        );

        while inner.entries.len() > self.config.max_size {
            let Some((evicted, entry)) = inner.entries.pop_lru() else {
                break;
            };
            inner.unindex(&evicted, &entry.tags);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %evicted, "evicted least recently used entry");
        }
        true
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, text: &str, params: Option<&Value>) -> bool {
        let (key, _) = cache_key(text, params);
        self.inner.lock().remove(&key).is_some()
    }

    /// Same as [`delete`](Self::delete).
    pub fn invalidate(&self, text: &str, params: Option<&Value>) -> bool {
        self.delete(text, params)
    }

    /// Remove every entry whose original key matches a glob pattern.
    ///
    /// Original keys are lower-cased. An invalid pattern removes nothing.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        let pattern = match glob::Pattern::new(pattern) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(pattern, error = %e, "invalid invalidation pattern");
                return 0;
            }
        };
        let mut inner = self.inner.lock();
        let doomed: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| pattern.matches(&entry.original_key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            inner.remove(key);
        }
        tracing::info!(pattern = %pattern, removed = doomed.len(), "invalidated by pattern");
        doomed.len()
    }

    /// Remove every entry carrying `tag`.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let mut inner = self.inner.lock();
        let Some(keys) = inner.tags.remove(tag) else {
            return 0;
        };
        let removed = keys.iter().filter(|key| inner.remove(key).is_some()).count();
        tracing::info!(tag, removed, "invalidated by tag");
        removed
    }

    /// Drop every entry. Metrics are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.tags.clear();
    }

    /// Whether a live entry exists. Does not count as a lookup.
    pub fn contains(&self, text: &str, params: Option<&Value>) -> bool {
        self.entry(text, params).is_some()
    }

    /// A copy of a live entry without touching recency or metrics.
    pub fn entry(&self, text: &str, params: Option<&Value>) -> Option<CacheEntry<V>> {
        let (key, _) = cache_key(text, params);
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .peek(&key)
            .filter(|entry| !entry.is_expired(now))
            .cloned()
    }

    /// Entries currently held, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries carrying `tag`.
    pub fn tagged(&self, tag: &str) -> usize {
        self.inner.lock().tags.get(tag).map_or(0, HashSet::len)
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.counters.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.counters.reset();
    }

    pub fn stats(&self) -> CacheStats {
        let metrics = self.metrics();
        CacheStats {
            size: self.len(),
            max_size: self.config.max_size,
            hits: metrics.hits,
            misses: metrics.misses,
            hit_rate_percent: (metrics.hit_rate() * 10_000.0).round() / 100.0,
            evictions: metrics.evictions,
            total_queries: metrics.total_queries,
            ttl_seconds: self.config.default_ttl.as_secs(),
            backend_kind: "memory",
        }
    }
}

impl<V: Clone> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
