//! # sockagent Cache
//!
//! TTL response caching for safe (idempotent) API calls.
//!
//! Two layers: an exact layer keyed by a sha256 digest of the call
//! identity, and an optional semantic layer that matches paraphrased
//! intents by embedding similarity. The semantic layer is consulted only
//! on an exact miss, and its hits are promoted into the exact layer.
//! Each layer owns its own lock; there is no global cache lock.

pub mod exact;
pub mod semantic;

pub use exact::{ExactCache, LayerStats};
pub use semantic::{SemanticCache, SemanticHit};

use serde_json::Value;
use sha2::{Digest, Sha256};
use sockagent_core::Embedder;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Derive the exact-layer key for a call.
///
/// The argument map is already sorted (`BTreeMap`), so serialization is
/// canonical: the same call always produces the same key regardless of
/// argument insertion order.
pub fn cache_key(endpoint: &str, version: &str, args: &BTreeMap<String, Value>) -> String {
    let canonical = serde_json::to_string(args).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    hasher.update(b":");
    hasher.update(version.as_bytes());
    hasher.update(b":");
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Combined hit/miss counters across both layers.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CacheStats {
    pub exact: LayerStats,
    pub semantic: Option<LayerStats>,
}

impl CacheStats {
    /// Total hits across layers.
    pub fn hits(&self) -> u64 {
        self.exact.hits + self.semantic.map_or(0, |s| s.hits)
    }
}

/// The multi-level cache front the client talks to.
pub struct CacheLayer {
    exact: ExactCache,
    semantic: Option<SemanticCache>,
}

impl CacheLayer {
    /// An exact-only cache.
    pub fn new(max_entries: usize) -> Self {
        Self {
            exact: ExactCache::new(max_entries),
            semantic: None,
        }
    }

    /// Enable the semantic layer with the given embedder and similarity
    /// radius.
    pub fn with_semantic(mut self, embedder: Arc<dyn Embedder>, radius: f64, max_entries: usize) -> Self {
        self.semantic = Some(SemanticCache::new(embedder, radius, max_entries));
        self
    }

    /// Whether the semantic layer is active.
    pub fn semantic_enabled(&self) -> bool {
        self.semantic.is_some()
    }

    /// Look up a call: exact first, then (on miss) the semantic layer.
    /// Semantic hits are promoted into the exact layer with their
    /// remaining TTL.
    pub fn get(&self, key: &str, text: &str) -> Option<Value> {
        if let Some(value) = self.exact.get(key) {
            return Some(value);
        }
        let semantic = self.semantic.as_ref()?;
        let hit = semantic.get(text)?;
        debug!(similarity = hit.similarity, "semantic cache hit, promoting");
        self.exact
            .put(hit.exact_key.clone(), hit.value.clone(), hit.remaining_ttl);
        // The original exact key may differ from `key` (paraphrased
        // intent); promote under the queried key too so the exact layer
        // answers this phrasing next time.
        if hit.exact_key != key {
            self.exact.put(key, hit.value.clone(), hit.remaining_ttl);
        }
        Some(hit.value)
    }

    /// Store a result in both layers.
    pub fn put(&self, key: impl Into<String>, text: &str, value: Value, ttl: Duration) {
        let key = key.into();
        if let Some(semantic) = &self.semantic {
            semantic.put(text, key.clone(), value.clone(), ttl);
        }
        self.exact.put(key, value, ttl);
    }

    /// Remove one exact entry.
    pub fn invalidate(&self, key: &str) -> bool {
        self.exact.invalidate(key)
    }

    /// Drop everything in both layers.
    pub fn clear(&self) {
        self.exact.clear();
        if let Some(semantic) = &self.semantic {
            semantic.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            exact: self.exact.stats(),
            semantic: self.semantic.as_ref().map(|s| s.stats()),
        }
    }
}
