// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory engine for conversational agents.
//!
//! Holds short-term, long-term, and file memories in process, ranks them
//! against a query by embedding similarity, and ages them out through
//! expiry, decay, and rule-based forgetting.
//!
//! ## Architecture
//!
//! - **ShortTermStore**: Capacity-bounded, most-recent-first, evicts the oldest write
//! - **LongTermStore**: Capacity-bounded with tag and time indices, rejects when full
//! - **FileStore**: Metadata for files on disk, optionally managed copies
//! - **forget**: Pure selection of records to drop, decay, and consolidation
//! - **recall**: Similarity scoring and ranking of candidates
//! - **CachedEmbedder**: Bounded embedding cache in front of any provider
//! - **Summarizer**: Provider summaries with an extractive fallback
//! - **backend**: In-memory and SQLite persistence backends
//! - **MemoryManager**: Owns the stores and collaborators
//! - **MemoryApi**: Chat-facing façade with a uniform response envelope

pub mod api;
pub mod backend;
pub mod embedder;
pub mod file_store;
pub mod forget;
pub mod long_term;
pub mod manager;
pub mod recall;
pub mod short_term;
pub mod stats;
pub mod summarizer;

pub use api::{MemoryApi, MemoryResponse, RecallRequest};
pub use backend::{InMemoryBackend, SqliteBackend};
pub use embedder::{CacheStats, CachedEmbedder, embed_with_deadline};
pub use file_store::{FileQuery, FileRecord, FileStore};
pub use long_term::{LongTermQuery, LongTermStore};
pub use manager::{
    MaintenanceReport, MemoryManager, MemoryManagerBuilder, MemoryUpdate, RememberRequest,
    SummaryQuery,
};
pub use recall::{NoContextReason, RecallHit, RecallOutcome, RecallQuery, RecallSource};
pub use short_term::ShortTermStore;
pub use stats::{FileStoreStats, MemoryStats, StoreStats};
pub use summarizer::Summarizer;
