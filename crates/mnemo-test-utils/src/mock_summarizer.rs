// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock summarization adapters.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use mnemo_core::MnemoError;
use mnemo_core::traits::{PluginAdapter, SummarizationAdapter};
use mnemo_core::types::{AdapterType, SummarizationRequest};

/// Returns `"summary: "` followed by the first `max_length` characters.
#[derive(Default)]
pub struct MockSummarizer {
    calls: AtomicUsize,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for MockSummarizer {
    fn name(&self) -> &str {
        "mock-summarizer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Summarization
    }
}

#[async_trait]
impl SummarizationAdapter for MockSummarizer {
    async fn summarize(&self, request: SummarizationRequest) -> Result<String, MnemoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let head: String = request.text.chars().take(request.max_length).collect();
        Ok(format!("summary: {head}"))
    }
}

/// Summarizer whose every call fails.
#[derive(Default)]
pub struct FailingSummarizer;

#[async_trait]
impl PluginAdapter for FailingSummarizer {
    fn name(&self) -> &str {
        "failing-summarizer"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Summarization
    }
}

#[async_trait]
impl SummarizationAdapter for FailingSummarizer {
    async fn summarize(&self, _request: SummarizationRequest) -> Result<String, MnemoError> {
        Err(MnemoError::provider("summarization model unavailable"))
    }
}
