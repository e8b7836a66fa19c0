//! Embedding cache.
//!
//! [`CachedEmbedder`] wraps any [`EmbeddingProvider`] and consults an
//! [`EmbeddingCache`] before calling it. Results are identical on hit and
//! miss; the cache only saves provider round-trips.
//!
//! Keys are `embed:{model}:{sha256(text)}`, so two models never share an
//! entry and long texts never collide on a common prefix.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use crate::embedding::EmbeddingProvider;

/// Key-value storage for embedding vectors.
pub trait EmbeddingCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<f32>>;
    fn put(&self, key: &str, vector: &[f32]);
}

/// Build the cache key for `text` embedded with `model`.
pub fn cache_key(model: &str, text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("embed:{}:{}", model, hex::encode(digest))
}

struct CacheEntry {
    vector: Vec<f32>,
    expires_at: DateTime<Utc>,
}

/// Process-local cache with a time-to-live and a size cap.
///
/// When full, expired entries are purged first; if that frees nothing the
/// entry closest to expiry is evicted.
pub struct InMemoryEmbeddingCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl InMemoryEmbeddingCache {
    pub fn new(ttl_secs: u64, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs.min(u64::from(u32::MAX)) as i64),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EmbeddingCache for InMemoryEmbeddingCache {
    fn get(&self, key: &str) -> Option<Vec<f32>> {
        let mut entries = self.entries.lock().ok()?;
        let now = Utc::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.vector.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, vector: &[f32]) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        let now = Utc::now();
        if entries.len() >= self.capacity && !entries.contains_key(key) {
            entries.retain(|_, e| e.expires_at > now);
            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(k) = oldest {
                    entries.remove(&k);
                }
            }
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                vector: vector.to_vec(),
                expires_at: now + self.ttl,
            },
        );
    }
}

/// An [`EmbeddingProvider`] that serves repeated texts from a cache.
pub struct CachedEmbedder<P> {
    inner: P,
    cache: Box<dyn EmbeddingCache>,
}

impl<P: EmbeddingProvider> CachedEmbedder<P> {
    pub fn new(inner: P, cache: Box<dyn EmbeddingCache>) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbedder<P> {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = cache_key(self.inner.model_name(), text);
        if let Some(hit) = self.cache.get(&key) {
            tracing::trace!(%key, "embedding cache hit");
            return Ok(hit);
        }
        let vector = self.inner.embed(text).await?;
        self.cache.put(&key, &vector);
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let keys: Vec<String> = texts
            .iter()
            .map(|t| cache_key(self.inner.model_name(), t))
            .collect();
        let mut out: Vec<Option<Vec<f32>>> = keys.iter().map(|k| self.cache.get(k)).collect();

        let misses: Vec<usize> = (0..texts.len()).filter(|&i| out[i].is_none()).collect();
        if !misses.is_empty() {
            let pending: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed_batch(&pending).await?;
            if fresh.len() != pending.len() {
                anyhow::bail!(
                    "embedding provider returned {} vectors for {} inputs",
                    fresh.len(),
                    pending.len()
                );
            }
            for (&i, vector) in misses.iter().zip(fresh) {
                self.cache.put(&keys[i], &vector);
                out[i] = Some(vector);
            }
        }

        Ok(out.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
        texts_seen: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn model_name(&self) -> &str {
            "test-model"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts_seen.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 1.0])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts_seen.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn cached() -> CachedEmbedder<CountingEmbedder> {
        CachedEmbedder::new(
            CountingEmbedder {
                calls: AtomicUsize::new(0),
                texts_seen: AtomicUsize::new(0),
            },
            Box::new(InMemoryEmbeddingCache::new(3600, 100)),
        )
    }

    #[test]
    fn test_cache_key_is_model_scoped() {
        assert_ne!(cache_key("a", "hello"), cache_key("b", "hello"));
        assert_eq!(cache_key("a", "hello"), cache_key("a", "hello"));
        assert!(cache_key("a", "hello").starts_with("embed:a:"));
    }

    #[tokio::test]
    async fn test_hit_and_miss_agree() {
        let e = cached();
        let first = e.embed("commission").await.unwrap();
        let second = e.embed("commission").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(e.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_only_embeds_misses_in_order() {
        let e = cached();
        e.embed("bb").await.unwrap();
        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let out = e.embed_batch(&texts).await.unwrap();
        assert_eq!(out, vec![vec![1.0, 1.0], vec![2.0, 1.0], vec![3.0, 1.0]]);
        // one single call + one batch call covering the two misses
        assert_eq!(e.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(e.inner().texts_seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let cache = InMemoryEmbeddingCache::new(0, 10);
        cache.put("k", &[1.0]);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_capacity_evicts() {
        let cache = InMemoryEmbeddingCache::new(3600, 2);
        cache.put("a", &[1.0]);
        cache.put("b", &[2.0]);
        cache.put("c", &[3.0]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("c"), Some(vec![3.0]));
    }
}
