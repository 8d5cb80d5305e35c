//! The exact-match TTL cache layer.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
    last_used: u64,
    hits: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    tick: u64,
    hits: u64,
    misses: u64,
    expirations: u64,
    evictions: u64,
}

/// Point-in-time counters for one cache layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct LayerStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
}

impl LayerStats {
    /// Hits over total lookups, 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// TTL cache keyed by exact call identity, with LRU eviction at capacity.
///
/// Expired entries are evicted lazily on lookup; nothing runs in the
/// background.
#[derive(Debug)]
pub struct ExactCache {
    inner: RwLock<Inner>,
    max_entries: usize,
}

impl ExactCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_entries: max_entries.max(1),
        }
    }

    /// Look up a key, lazily evicting it when expired.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;
        inner.tick += 1;
        let tick = inner.tick;

        match inner.entries.get_mut(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                entry.last_used = tick;
                entry.hits += 1;
                let value = entry.value.clone();
                inner.hits += 1;
                Some(value)
            }
            Some(_) => {
                inner.entries.remove(key);
                inner.expirations += 1;
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Remaining TTL of a live entry.
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let inner = self.inner.read().unwrap();
        let entry = inner.entries.get(key)?;
        entry.expires_at.checked_duration_since(Instant::now())
    }

    /// Insert a value. At capacity, expired entries go first, then the
    /// least recently used live entry.
    pub fn put(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let key = key.into();
        let mut inner = self.inner.write().unwrap();
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            let now = Instant::now();
            let expired: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, e)| e.expires_at <= now)
                .map(|(k, _)| k.clone())
                .collect();
            if expired.is_empty() {
                if let Some(lru) = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_used)
                    .map(|(k, _)| k.clone())
                {
                    inner.entries.remove(&lru);
                    inner.evictions += 1;
                    debug!(key = %lru, "evicted least recently used entry");
                }
            } else {
                inner.expirations += expired.len() as u64;
                for k in expired {
                    inner.entries.remove(&k);
                }
            }
        }

        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
                last_used: tick,
                hits: 0,
            },
        );
    }

    /// Remove one key.
    pub fn invalidate(&self, key: &str) -> bool {
        self.inner.write().unwrap().entries.remove(key).is_some()
    }

    /// Drop all entries, keeping counters.
    pub fn clear(&self) {
        self.inner.write().unwrap().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().entries.is_empty()
    }

    pub fn stats(&self) -> LayerStats {
        let inner = self.inner.read().unwrap();
        LayerStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            expirations: inner.expirations,
            evictions: inner.evictions,
        }
    }
}
