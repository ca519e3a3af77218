// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock embedding adapters for deterministic testing.
//!
//! `MockEmbedder` maps each lower-cased word to a fixed dimension, so texts
//! sharing words score high cosine similarity and texts sharing none score
//! zero. Exact vectors can be pinned per text with [`MockEmbedder::with_fixed`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use mnemo_core::MnemoError;
use mnemo_core::traits::{EmbeddingAdapter, PluginAdapter};
use mnemo_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};

/// Bag-of-words embedder with a stable word → dimension mapping.
pub struct MockEmbedder {
    dimension: usize,
    fixed: HashMap<String, Vec<f32>>,
    texts_embedded: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            fixed: HashMap::new(),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    /// Always return `vector` for exactly `text`.
    pub fn with_fixed(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.fixed.insert(text.into(), vector);
        self
    }

    /// Number of texts embedded so far (cache hits upstream do not count).
    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    /// The vector this embedder produces for `text`.
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.fixed.get(text) {
            return v.clone();
        }
        let mut v = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let slot = (fnv1a(&word.to_lowercase()) % self.dimension as u64) as usize;
            v[slot] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed_batch(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError> {
        self.texts_embedded
            .fetch_add(input.texts.len(), Ordering::SeqCst);
        let embeddings = input.texts.iter().map(|t| self.vector_for(t)).collect();
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: self.dimension,
        })
    }
}

/// Embedder whose every call fails with a provider error.
#[derive(Default)]
pub struct FailingEmbedder;

#[async_trait]
impl PluginAdapter for FailingEmbedder {
    fn name(&self) -> &str {
        "failing-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemoError> {
        Ok(HealthStatus::Unhealthy("embedding model unavailable".into()))
    }
}

#[async_trait]
impl EmbeddingAdapter for FailingEmbedder {
    async fn embed_batch(&self, _input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError> {
        Err(MnemoError::provider("embedding model unavailable"))
    }
}

/// Wraps [`MockEmbedder`], sleeping before each call.
pub struct SlowEmbedder {
    inner: MockEmbedder,
    delay: Duration,
}

impl SlowEmbedder {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockEmbedder::default(),
            delay,
        }
    }
}

#[async_trait]
impl PluginAdapter for SlowEmbedder {
    fn name(&self) -> &str {
        "slow-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }
}

#[async_trait]
impl EmbeddingAdapter for SlowEmbedder {
    async fn embed_batch(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError> {
        tokio::time::sleep(self.delay).await;
        self.inner.embed_batch(input).await
    }
}

#[cfg(test)]
mod tests {
    use mnemo_core::vector::cosine_similarity;

    use super::*;

    #[tokio::test]
    async fn shared_words_score_higher() {
        let embedder = MockEmbedder::new(128);
        let a = embedder.embed("rust borrow checker").await.unwrap();
        let b = embedder.embed("the Rust borrow checker").await.unwrap();
        let c = embedder.embed("gardening tips").await.unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
        assert_eq!(embedder.texts_embedded(), 3);
    }

    #[tokio::test]
    async fn fixed_vectors_win() {
        let embedder = MockEmbedder::new(2).with_fixed("q", vec![1.0, 0.0]);
        assert_eq!(embedder.embed("q").await.unwrap(), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn failing_embedder_is_provider_failure() {
        let err = FailingEmbedder.embed("x").await.unwrap_err();
        assert!(err.is_provider_failure());
    }
}
