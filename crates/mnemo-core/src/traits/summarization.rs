// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Summarization adapter trait.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::traits::adapter::PluginAdapter;
use crate::types::SummarizationRequest;

/// Adapter for abstractive summarization models.
///
/// Optional: without one the engine falls back to an extractive heuristic.
#[async_trait]
pub trait SummarizationAdapter: PluginAdapter {
    /// Summarizes `request.text` within the requested length bounds.
    async fn summarize(&self, request: SummarizationRequest) -> Result<String, MnemoError>;
}
