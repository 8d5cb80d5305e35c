//! The optional semantic cache layer.
//!
//! Entries are keyed by an embedding of the original intent text; lookup
//! returns the nearest live entry by cosine similarity within a radius.
//! Exists only when an [`Embedder`] is supplied — there is no built-in
//! embedding model.

use crate::exact::LayerStats;
use serde_json::Value;
use sockagent_core::Embedder;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

struct Entry {
    embedding: Vec<f32>,
    exact_key: String,
    value: Value,
    expires_at: Instant,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    hits: u64,
    misses: u64,
    expirations: u64,
    evictions: u64,
}

/// A semantic hit: the stored value plus the exact key it was cached
/// under, so callers can promote it into the exact layer.
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub exact_key: String,
    pub value: Value,
    pub similarity: f64,
    pub remaining_ttl: Duration,
}

/// Nearest-neighbor cache over intent embeddings.
pub struct SemanticCache {
    embedder: Arc<dyn Embedder>,
    radius: f64,
    max_entries: usize,
    inner: RwLock<Inner>,
}

impl SemanticCache {
    pub fn new(embedder: Arc<dyn Embedder>, radius: f64, max_entries: usize) -> Self {
        Self {
            embedder,
            radius: radius.clamp(0.0, 1.0),
            max_entries: max_entries.max(1),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Nearest live entry within the radius, if any.
    pub fn get(&self, text: &str) -> Option<SemanticHit> {
        let query = self.embedder.embed(text);
        let now = Instant::now();
        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;

        let before = inner.entries.len();
        inner.entries.retain(|e| e.expires_at > now);
        inner.expirations += (before - inner.entries.len()) as u64;

        let best = inner
            .entries
            .iter()
            .map(|e| (cosine(&query, &e.embedding), e))
            .filter(|(similarity, _)| *similarity >= self.radius)
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((similarity, entry)) => {
                let hit = SemanticHit {
                    exact_key: entry.exact_key.clone(),
                    value: entry.value.clone(),
                    similarity,
                    remaining_ttl: entry.expires_at.saturating_duration_since(now),
                };
                inner.hits += 1;
                Some(hit)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a value under the embedding of its intent text.
    pub fn put(&self, text: &str, exact_key: impl Into<String>, value: Value, ttl: Duration) {
        let embedding = self.embedder.embed(text);
        let mut inner = self.inner.write().unwrap();
        if inner.entries.len() >= self.max_entries {
            // Oldest-first: entries are insertion ordered.
            inner.entries.remove(0);
            inner.evictions += 1;
        }
        inner.entries.push(Entry {
            embedding,
            exact_key: exact_key.into(),
            value,
            expires_at: Instant::now() + ttl,
        });
    }

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

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic bag-of-letters embedder, good enough to separate
    /// unrelated texts in tests.
    struct LetterEmbedder;
    impl Embedder for LetterEmbedder {
        fn embed(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; 26];
            for c in text.to_lowercase().chars() {
                if c.is_ascii_lowercase() {
                    v[(c as u8 - b'a') as usize] += 1.0;
                }
            }
            v
        }
    }

    fn cache(radius: f64) -> SemanticCache {
        SemanticCache::new(Arc::new(LetterEmbedder), radius, 10)
    }

    #[test]
    fn similar_text_hits_within_radius() {
        let cache = cache(0.85);
        cache.put(
            "list all todos",
            "key-1",
            serde_json::json!(["milk"]),
            Duration::from_secs(60),
        );

        let hit = cache.get("list all the todos").expect("should hit");
        assert_eq!(hit.exact_key, "key-1");
        assert_eq!(hit.value, serde_json::json!(["milk"]));
        assert!(hit.similarity >= 0.85);
    }

    #[test]
    fn unrelated_text_misses() {
        let cache = cache(0.85);
        cache.put(
            "list all todos",
            "key-1",
            serde_json::json!([]),
            Duration::from_secs(60),
        );
        assert!(cache.get("purchase quarterly xyzzy").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn expired_entries_never_hit() {
        let cache = cache(0.5);
        cache.put(
            "list all todos",
            "key-1",
            serde_json::json!([]),
            Duration::from_millis(10),
        );
        std::thread::sleep(Duration::from_millis(25));

        assert!(cache.get("list all todos").is_none());
        assert_eq!(cache.stats().expirations, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn cosine_identity_and_orthogonality() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine(&[], &[]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
    }
}
