// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits plugged into the memory engine.
//!
//! All collaborators extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod backend;
pub mod embedding;
pub mod summarization;

pub use adapter::PluginAdapter;
pub use backend::PersistenceBackend;
pub use embedding::EmbeddingAdapter;
pub use summarization::SummarizationAdapter;
