// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Mnemo.
//!
//! Provides mock collaborators and record fixtures for fast, deterministic,
//! CI-runnable tests without model downloads or external services.
//!
//! # Components
//!
//! - [`MockEmbedder`] - Bag-of-words embedder with pinnable vectors
//! - [`FailingEmbedder`] / [`SlowEmbedder`] - Provider failure and timeout drivers
//! - [`MockSummarizer`] / [`FailingSummarizer`] - Summarization doubles
//! - [`FailingBackend`] - Unreachable persistence backend
//! - [`fixtures`] - Record constructors

pub mod fixtures;
pub mod mock_backend;
pub mod mock_embedder;
pub mod mock_summarizer;

pub use mock_backend::FailingBackend;
pub use mock_embedder::{FailingEmbedder, MockEmbedder, SlowEmbedder};
pub use mock_summarizer::{FailingSummarizer, MockSummarizer};
