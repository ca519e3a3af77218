// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait for vector embedding generation.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Adapter for generating vector embeddings from text.
///
/// Embeddings power recall ranking and similarity consolidation. Every
/// vector returned by one adapter has the same dimension.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Generates one embedding per input text, in input order.
    async fn embed_batch(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemoError>;

    /// Generates the embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MnemoError> {
        let output = self
            .embed_batch(EmbeddingInput {
                texts: vec![text.to_string()],
            })
            .await?;
        output
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| MnemoError::provider("embedding returned no results"))
    }
}
