// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Mnemo memory engine.
//!
//! This crate provides the memory record schema, the shared vector math,
//! the error type, and the collaborator traits (embedding, summarization,
//! persistence) that the rest of the workspace builds on.

pub mod error;
pub mod record;
pub mod traits;
pub mod types;
pub mod vector;

// Re-export key items at crate root for ergonomic imports.
pub use error::MnemoError;
pub use record::{
    ForgetCriteria, MemoryKind, MemoryRecord, MemorySummary, Metadata, Priority, TimeRange,
};
pub use types::{AdapterType, HealthStatus, SessionId};

pub use traits::{EmbeddingAdapter, PersistenceBackend, PluginAdapter, SummarizationAdapter};
