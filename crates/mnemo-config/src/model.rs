// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Mnemo memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level Mnemo configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MnemoConfig {
    /// Store capacities and retention.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Recall ranking settings.
    #[serde(default)]
    pub recall: RecallConfig,

    /// Embedding provider settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Summarization settings.
    #[serde(default)]
    pub summarization: SummarizationConfig,

    /// Decay and automatic forgetting.
    #[serde(default)]
    pub forget: ForgetConfig,

    /// Persistence backend selection.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log filtering for the host process.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MnemoConfig {
    /// Small stores and no embedding cache, for constrained hosts.
    pub fn lightweight() -> Self {
        let mut config = Self::default();
        config.memory.short_term_capacity = 100;
        config.memory.long_term_capacity = 1000;
        config.memory.file_storage_capacity = 100;
        config.embedding.batch_size = 16;
        config.embedding.cache_enabled = false;
        config
    }

    /// Large stores and a bigger embedding cache.
    pub fn performance() -> Self {
        let mut config = Self::default();
        config.memory.short_term_capacity = 5000;
        config.memory.long_term_capacity = 50000;
        config.memory.file_storage_capacity = 5000;
        config.embedding.batch_size = 64;
        config.embedding.cache_size = 10000;
        config
    }
}

/// Store capacity and retention configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Maximum short-term records before the oldest is evicted.
    #[serde(default = "default_short_term_capacity")]
    pub short_term_capacity: usize,

    /// Maximum long-term records. New ids are rejected beyond this.
    #[serde(default = "default_long_term_capacity")]
    pub long_term_capacity: usize,

    /// Maximum file records.
    #[serde(default = "default_file_storage_capacity")]
    pub file_storage_capacity: usize,

    /// Default lifetime of short-term records. Unset means no expiry.
    #[serde(default = "default_short_term_ttl_days")]
    pub short_term_ttl_days: Option<u32>,

    /// Default lifetime of long-term records. Unset means no expiry.
    #[serde(default)]
    pub long_term_ttl_days: Option<u32>,

    /// Summarize with the configured model when one is available.
    #[serde(default = "default_true")]
    pub auto_summarize: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_capacity: default_short_term_capacity(),
            long_term_capacity: default_long_term_capacity(),
            file_storage_capacity: default_file_storage_capacity(),
            short_term_ttl_days: default_short_term_ttl_days(),
            long_term_ttl_days: None,
            auto_summarize: true,
        }
    }
}

fn default_short_term_capacity() -> usize {
    1000
}

fn default_long_term_capacity() -> usize {
    10000
}

fn default_file_storage_capacity() -> usize {
    1000
}

fn default_short_term_ttl_days() -> Option<u32> {
    Some(7)
}

fn default_true() -> bool {
    true
}

/// Recall configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecallConfig {
    /// Minimum clamped cosine similarity for a recall hit (0.0-1.0).
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Result limit when the caller does not give one.
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    /// Newest short-term records returned next to ranked hits.
    /// 0 turns the continuity window off.
    #[serde(default)]
    pub recent_window: usize,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            max_search_results: default_max_search_results(),
            recent_window: 0,
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.5
}

fn default_max_search_results() -> usize {
    10
}

/// Embedding provider configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Name of the embedding model the host wires in.
    #[serde(default = "default_embedding_model")]
    pub model_name: String,

    /// Expected vector dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Texts per provider call when embedding in bulk.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Deadline for a single embedding call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Cache single-text embeddings in front of the provider.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Maximum cached embeddings.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: default_embedding_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            cache_enabled: true,
            cache_size: default_cache_size(),
        }
    }
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_batch_size() -> usize {
    32
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_cache_size() -> usize {
    1000
}

/// Summarization configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SummarizationConfig {
    /// Name of the summarization model the host wires in.
    #[serde(default = "default_summarization_model")]
    pub model_name: String,

    /// Upper bound passed to the summarization model.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Lower bound passed to the summarization model.
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Sentences kept by the extractive fallback.
    #[serde(default = "default_num_sentences")]
    pub num_sentences: usize,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            model_name: default_summarization_model(),
            max_length: default_max_length(),
            min_length: default_min_length(),
            num_sentences: default_num_sentences(),
        }
    }
}

fn default_summarization_model() -> String {
    "bart-large-cnn".to_string()
}

fn default_max_length() -> usize {
    150
}

fn default_min_length() -> usize {
    50
}

fn default_num_sentences() -> usize {
    3
}

/// Decay and automatic forgetting configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ForgetConfig {
    /// Forget low-relevance records during maintenance.
    #[serde(default)]
    pub auto_forget: bool,

    /// Relevance below which maintenance forgets a record.
    #[serde(default = "default_forget_threshold")]
    pub forget_threshold: f64,

    /// Fraction of relevance lost per day.
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// Decay never drops relevance below this floor.
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,

    /// Similarity at which records are consolidation candidates.
    #[serde(default = "default_consolidation_threshold")]
    pub consolidation_threshold: f64,
}

impl Default for ForgetConfig {
    fn default() -> Self {
        Self {
            auto_forget: false,
            forget_threshold: default_forget_threshold(),
            decay_rate: default_decay_rate(),
            min_relevance: default_min_relevance(),
            consolidation_threshold: default_consolidation_threshold(),
        }
    }
}

fn default_forget_threshold() -> f64 {
    0.2
}

fn default_decay_rate() -> f64 {
    0.01
}

fn default_min_relevance() -> f64 {
    0.1
}

fn default_consolidation_threshold() -> f64 {
    0.9
}

/// Persistence backend kinds recognized at startup.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendKind {
    /// In-process stores only.
    #[default]
    Local,
    /// SQLite file mirrored next to the in-process stores.
    Sqlite,
    /// PostgreSQL with pgvector. The host injects the backend.
    Pgvector,
    /// Chroma vector database. The host injects the backend.
    Chroma,
}

impl BackendKind {
    /// Every accepted spelling, for diagnostics.
    pub const VARIANTS: &'static [&'static str] = &["local", "sqlite", "pgvector", "chroma"];

    /// Whether the backend talks to an external server.
    pub fn needs_connection_string(&self) -> bool {
        matches!(self, BackendKind::Pgvector | BackendKind::Chroma)
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Which backend mirrors the in-process stores.
    #[serde(default)]
    pub backend: BackendKind,

    /// SQLite database file, used when `backend = "sqlite"`.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Server connection string for `pgvector` and `chroma`.
    #[serde(default)]
    pub connection_string: Option<String>,

    /// Directory receiving managed copies of stored files.
    #[serde(default = "default_file_storage_dir")]
    pub file_storage_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            database_path: default_database_path(),
            connection_string: None,
            file_storage_dir: default_file_storage_dir(),
        }
    }
}

fn default_database_path() -> String {
    "./mnemo_memory.db".to_string()
}

fn default_file_storage_dir() -> String {
    "./mnemo_files".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
