//! Permission cache abstraction and in-memory backend
//!
//! Cached values are derived permission-key arrays, keyed by
//! `perms:{org}:{project}:{user}` or `gperms:{org}:{user}` and TTL-bound.
//! They are never authoritative: absence or expiry always falls back to
//! recomputation from the store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{AuthzError, Result};

/// Key-value cache used for resolved permission sets
///
/// Implementations are injected into the engine rather than reached through
/// process-wide state, so tests can substitute a deterministic in-memory
/// backend. A hard backend failure must surface as `Err`, never as a miss.
#[async_trait]
pub trait PermissionCache: Send + Sync {
    /// Get a cached value, `None` on miss or expiry
    async fn get(&self, key: &str) -> Result<Option<Vec<String>>>;

    /// Store a value with a time-to-live
    async fn set(&self, key: &str, value: &[String], ttl: Duration) -> Result<()>;

    /// Delete a single key (no-op if absent)
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key matching a pattern with `*` wildcard segments
    ///
    /// Returns the number of keys removed. Patterns may carry a trailing or
    /// embedded wildcard (e.g. `perms:org-1:*:user-1`).
    async fn delete_pattern(&self, pattern: &str) -> Result<u64>;
}

/// Cached entry with TTL
#[derive(Clone)]
struct CachedEntry {
    value: Vec<String>,
    cached_at: Instant,
    ttl: Duration,
}

impl CachedEntry {
    fn new(value: Vec<String>, ttl: Duration) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// In-memory permission cache
///
/// Provides:
/// - Thread-safe storage via DashMap (lock-free reads)
/// - Per-entry TTL, enforced on read
/// - Wildcard pattern deletion for invalidation hooks
#[derive(Default)]
pub struct MemoryPermissionCache {
    entries: Arc<DashMap<String, CachedEntry>>,

    /// Cache statistics
    stats: Arc<DashMap<String, usize>>,
}

impl MemoryPermissionCache {
    /// Create an empty in-memory cache
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            stats: Arc::new(DashMap::new()),
        }
    }

    /// Number of live entries (expired entries may still be counted until read)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            entries: self.entries.len(),
        }
    }

    /// Compile a `*` wildcard pattern into an anchored regex
    fn compile_pattern(pattern: &str) -> Result<regex::Regex> {
        let escaped = regex::escape(pattern).replace(r"\*", ".*");
        regex::Regex::new(&format!("^{}$", escaped))
            .map_err(|e| AuthzError::CacheError(format!("Invalid key pattern: {}", e)))
    }

    fn increment_stat(&self, key: &str) {
        self.stats
            .entry(key.to_string())
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

#[async_trait]
impl PermissionCache for MemoryPermissionCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<String>>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                self.increment_stat("expirations");
                return Ok(None);
            }

            self.increment_stat("hits");
            return Ok(Some(entry.value.clone()));
        }

        self.increment_stat("misses");
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[String], ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), CachedEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let regex = Self::compile_pattern(pattern)?;
        let mut removed = 0u64;

        self.entries.retain(|key, _| {
            if regex.is_match(key) {
                removed += 1;
                false
            } else {
                true
            }
        });

        Ok(removed)
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub entries: usize,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
