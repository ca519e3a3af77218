// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding helpers: a bounded cache in front of any provider, and the
//! deadline/cancellation guard used around every embedding call.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use mnemo_core::MnemoError;
use mnemo_core::traits::{EmbeddingAdapter, PluginAdapter};
use mnemo_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};

/// Run `embedder.embed(text)` under a timeout and an optional cancel token.
///
/// Returns `Timeout` if the deadline passes first and `Cancelled` if the
/// token fires first. Nothing else in the engine suspends.
pub async fn embed_with_deadline(
    embedder: &dyn EmbeddingAdapter,
    text: &str,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<f32>, MnemoError> {
    let call = tokio::time::timeout(timeout, embedder.embed(text));
    let result = match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(MnemoError::Cancelled),
                r = call => r,
            }
        }
        None => call.await,
    };
    match result {
        Ok(inner) => inner,
        Err(_) => Err(MnemoError::Timeout { duration: timeout }),
    }
}

#[derive(Debug, Default)]
struct Cache {
    entries: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

/// Embedding provider wrapper with a bounded FIFO cache of single-text
/// embeddings.
pub struct CachedEmbedder {
    inner: Arc<dyn EmbeddingAdapter>,
    capacity: usize,
    cache: Mutex<Cache>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn EmbeddingAdapter>, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            cache: Mutex::new(Cache::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.with_cache(|c| c.entries.len()),
            capacity: self.capacity,
        }
    }

    pub fn clear(&self) {
        self.with_cache(|c| {
            c.entries.clear();
            c.order.clear();
        });
    }

    fn lookup(&self, text: &str) -> Option<Vec<f32>> {
        self.with_cache(|c| c.entries.get(text).cloned())
    }

    fn insert(&self, text: String, vector: Vec<f32>) {
        let capacity = self.capacity;
        self.with_cache(|c| {
            if c.entries.insert(text.clone(), vector).is_none() {
                c.order.push_back(text);
            }
            while c.entries.len() > capacity {
                match c.order.pop_front() {
                    Some(oldest) => {
                        c.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        });
    }

    /// The cache holds plain data, so a poisoned lock is still usable.
    fn with_cache<R>(&self, f: impl FnOnce(&mut Cache) -> R) -> R {
        let mut guard = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

#[async_trait]
impl PluginAdapter for CachedEmbedder {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn version(&self) -> semver::Version {
        self.inner.version()
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemoError> {
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), MnemoError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl EmbeddingAdapter for CachedEmbedder {
    async fn embed_batch(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError> {
        let mut slots: Vec<Option<Vec<f32>>> = input.texts.iter().map(|t| self.lookup(t)).collect();
        let missing: Vec<String> = input
            .texts
            .iter()
            .zip(&slots)
            .filter(|(_, hit)| hit.is_none())
            .map(|(t, _)| t.clone())
            .collect();

        let hit_count = (input.texts.len() - missing.len()) as u64;
        self.hits.fetch_add(hit_count, Ordering::Relaxed);
        self.misses.fetch_add(missing.len() as u64, Ordering::Relaxed);

        let mut dimensions = slots.iter().flatten().map(Vec::len).next().unwrap_or(0);
        if !missing.is_empty() {
            let output = self
                .inner
                .embed_batch(EmbeddingInput {
                    texts: missing.clone(),
                })
                .await?;
            if output.embeddings.len() != missing.len() {
                return Err(MnemoError::provider(format!(
                    "embedding provider returned {} vectors for {} texts",
                    output.embeddings.len(),
                    missing.len()
                )));
            }
            dimensions = output.dimensions;
            let mut fresh = output.embeddings.into_iter();
            for (slot, text) in slots.iter_mut().zip(&input.texts) {
                if slot.is_none() {
                    if let Some(vector) = fresh.next() {
                        self.insert(text.clone(), vector.clone());
                        *slot = Some(vector);
                    }
                }
            }
        }
        debug!(hits = hit_count, misses = missing.len(), "embedding cache lookup");

        Ok(EmbeddingOutput {
            embeddings: slots.into_iter().flatten().collect(),
            dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use mnemo_test_utils::{MockEmbedder, SlowEmbedder};

    use super::*;

    #[tokio::test]
    async fn repeated_text_hits_cache() {
        let mock = Arc::new(MockEmbedder::new(16));
        let cached = CachedEmbedder::new(mock.clone(), 10);
        let a = cached.embed("hello world").await.unwrap();
        let b = cached.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(mock.texts_embedded(), 1);
        let stats = cached.stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
    }

    #[tokio::test]
    async fn batch_only_sends_misses_and_keeps_order() {
        let mock = Arc::new(MockEmbedder::new(16));
        let cached = CachedEmbedder::new(mock.clone(), 10);
        cached.embed("b").await.unwrap();
        let out = cached
            .embed_batch(EmbeddingInput {
                texts: vec!["a".into(), "b".into(), "c".into()],
            })
            .await
            .unwrap();
        assert_eq!(out.embeddings.len(), 3);
        assert_eq!(out.embeddings[0], mock.vector_for("a"));
        assert_eq!(out.embeddings[1], mock.vector_for("b"));
        assert_eq!(mock.texts_embedded(), 3);
    }

    #[tokio::test]
    async fn cache_evicts_first_inserted() {
        let mock = Arc::new(MockEmbedder::new(8));
        let cached = CachedEmbedder::new(mock.clone(), 2);
        for text in ["one", "two", "three"] {
            cached.embed(text).await.unwrap();
        }
        assert_eq!(cached.stats().entries, 2);
        cached.embed("one").await.unwrap();
        assert_eq!(mock.texts_embedded(), 4, "evicted entry is re-embedded");
        cached.embed("three").await.unwrap();
        assert_eq!(mock.texts_embedded(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_produces_timeout() {
        let slow = SlowEmbedder::new(Duration::from_secs(30));
        let err = embed_with_deadline(&slow, "q", Duration::from_secs(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MnemoError::Timeout { duration } if duration == Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_wins_over_slow_provider() {
        let slow = SlowEmbedder::new(Duration::from_secs(30));
        let token = CancellationToken::new();
        token.cancel();
        let err = embed_with_deadline(&slow, "q", Duration::from_secs(60), Some(&token))
            .await
            .unwrap_err();
        assert!(matches!(err, MnemoError::Cancelled));
    }

    #[tokio::test]
    async fn fast_provider_passes_through() {
        let mock = MockEmbedder::new(4).with_fixed("q", vec![1.0, 0.0, 0.0, 0.0]);
        let token = CancellationToken::new();
        let v = embed_with_deadline(&mock, "q", Duration::from_secs(5), Some(&token))
            .await
            .unwrap();
        assert_eq!(v, vec![1.0, 0.0, 0.0, 0.0]);
    }
}
