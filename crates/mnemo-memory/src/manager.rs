// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The memory manager: one façade over every store and collaborator.
//!
//! Each store sits behind its own `RwLock`. No lock is held across an
//! embedding, summarization, backend, or filesystem call; cross-store
//! operations are therefore not globally atomic, and a record vanishing from
//! one store between two steps is treated as ordinary absence.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mnemo_config::model::{BackendKind, MnemoConfig};
use mnemo_config::validation::validate_config;
use mnemo_core::traits::{EmbeddingAdapter, PersistenceBackend, SummarizationAdapter};
use mnemo_core::{
    ForgetCriteria, HealthStatus, MemoryKind, MemoryRecord, MemorySummary, Metadata, MnemoError,
    Priority, SessionId, TimeRange,
};

use crate::backend::SqliteBackend;
use crate::embedder::{CacheStats, CachedEmbedder, embed_with_deadline};
use crate::file_store::{FileQuery, FileRecord, FileStore};
use crate::forget;
use crate::long_term::{LongTermQuery, LongTermStore};
use crate::recall::{self, NoContextReason, RecallOutcome, RecallQuery, RecallSource};
use crate::short_term::ShortTermStore;
use crate::stats::MemoryStats;
use crate::summarizer::Summarizer;

/// Input to [`MemoryManager::remember`].
#[derive(Debug, Clone, PartialEq)]
pub struct RememberRequest {
    pub content: String,
    pub kind: MemoryKind,
    pub tags: Vec<String>,
    pub priority: Priority,
    pub metadata: Metadata,
    /// Lifetime from now. Ignored when `expires_at` is set.
    pub ttl: Option<chrono::Duration>,
    pub expires_at: Option<DateTime<Utc>>,
    pub session: Option<SessionId>,
    pub role: Option<String>,
}

impl RememberRequest {
    pub fn new(content: impl Into<String>, kind: MemoryKind) -> Self {
        Self {
            content: content.into(),
            kind,
            tags: Vec::new(),
            priority: Priority::default(),
            metadata: Metadata::new(),
            ttl: None,
            expires_at: None,
            session: None,
            role: None,
        }
    }

    pub fn short_term(content: impl Into<String>) -> Self {
        Self::new(content, MemoryKind::ShortTerm)
    }

    pub fn long_term(content: impl Into<String>) -> Self {
        Self::new(content, MemoryKind::LongTerm)
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_ttl_days(self, days: u32) -> Self {
        self.with_ttl(chrono::Duration::days(i64::from(days)))
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Partial update applied by [`MemoryManager::update`]. `None` leaves a
/// field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
    pub priority: Option<Priority>,
    pub relevance: Option<f64>,
}

impl MemoryUpdate {
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn relevance(mut self, relevance: f64) -> Self {
        self.relevance = Some(relevance);
        self
    }
}

/// Filters for [`MemoryManager::summarize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryQuery {
    pub topic: Option<String>,
    pub kind: Option<MemoryKind>,
    pub tags: Vec<String>,
    pub time_range: Option<TimeRange>,
}

/// Outcome of [`MemoryManager::run_maintenance`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub expired_removed: usize,
    pub decayed: usize,
    pub forgotten: usize,
    /// Digest of the expired records, taken before they were dropped, when
    /// `memory.auto_summarize` is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expired_summary: Option<MemorySummary>,
}

/// Assembles a [`MemoryManager`] from configuration and collaborators.
pub struct MemoryManagerBuilder {
    config: MnemoConfig,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    summarizer: Option<Arc<dyn SummarizationAdapter>>,
    backend: Option<Arc<dyn PersistenceBackend>>,
}

impl MemoryManagerBuilder {
    fn new(config: MnemoConfig) -> Self {
        Self {
            config,
            embedder: None,
            summarizer: None,
            backend: None,
        }
    }

    /// Required: the embedding provider.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Optional: without one, summaries are extractive.
    pub fn summarizer(mut self, summarizer: Arc<dyn SummarizationAdapter>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Inject a persistence backend. Required for `pgvector` and `chroma`;
    /// overrides the built-in SQLite backend otherwise.
    pub fn backend(mut self, backend: Arc<dyn PersistenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validate the configuration, resolve the backend, and build.
    pub async fn build(self) -> Result<MemoryManager, MnemoError> {
        if let Err(errors) = validate_config(&self.config) {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(MnemoError::Config(joined));
        }

        let embedder = self
            .embedder
            .ok_or_else(|| MnemoError::Config("no embedding adapter configured".into()))?;
        let (embedder, cache) = if self.config.embedding.cache_enabled {
            let cached = Arc::new(CachedEmbedder::new(
                embedder,
                self.config.embedding.cache_size,
            ));
            (cached.clone() as Arc<dyn EmbeddingAdapter>, Some(cached))
        } else {
            (embedder, None)
        };

        let backend = match (self.backend, self.config.storage.backend) {
            (Some(injected), kind) => {
                info!(backend = %kind, adapter = injected.name(), "using injected persistence backend");
                Some(injected)
            }
            (None, BackendKind::Local) => None,
            (None, BackendKind::Sqlite) => {
                let sqlite = SqliteBackend::open(&self.config.storage.database_path).await?;
                Some(Arc::new(sqlite) as Arc<dyn PersistenceBackend>)
            }
            (None, kind) => {
                return Err(MnemoError::Config(format!(
                    "storage.backend = \"{kind}\" requires a backend adapter supplied by the host"
                )));
            }
        };

        let memory = &self.config.memory;
        let manager = MemoryManager {
            short_term: RwLock::new(ShortTermStore::new(memory.short_term_capacity)),
            long_term: RwLock::new(LongTermStore::new(memory.long_term_capacity)),
            files: RwLock::new(FileStore::new(memory.file_storage_capacity)),
            summarizer: Summarizer::new(self.summarizer, &self.config.summarization),
            embed_timeout: Duration::from_secs(self.config.embedding.timeout_secs),
            embedder,
            cache,
            backend,
            config: self.config,
        };
        info!(
            short_term_capacity = manager.config.memory.short_term_capacity,
            long_term_capacity = manager.config.memory.long_term_capacity,
            backend = %manager.config.storage.backend,
            "memory manager ready"
        );
        Ok(manager)
    }
}

/// Owner of the short-term, long-term, and file stores plus collaborators.
pub struct MemoryManager {
    config: MnemoConfig,
    embedder: Arc<dyn EmbeddingAdapter>,
    cache: Option<Arc<CachedEmbedder>>,
    summarizer: Summarizer,
    backend: Option<Arc<dyn PersistenceBackend>>,
    embed_timeout: Duration,
    short_term: RwLock<ShortTermStore>,
    long_term: RwLock<LongTermStore>,
    files: RwLock<FileStore>,
}

impl MemoryManager {
    pub fn builder(config: MnemoConfig) -> MemoryManagerBuilder {
        MemoryManagerBuilder::new(config)
    }

    pub fn config(&self) -> &MnemoConfig {
        &self.config
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    pub fn embedding_cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    async fn embed(
        &self,
        text: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<f32>, MnemoError> {
        embed_with_deadline(self.embedder.as_ref(), text, self.embed_timeout, cancel).await
    }

    /// Embed for storage: provider failures and timeouts leave the record
    /// unscored. Only cancellation is returned as an error.
    async fn embed_for_storage(
        &self,
        text: &str,
        id: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<Option<Vec<f32>>, MnemoError> {
        match self.embed(text, cancel).await {
            Ok(v) if !v.is_empty() => Ok(Some(v)),
            Ok(_) => {
                warn!(memory_id = %id, "embedding provider returned an empty vector; storing unscored");
                Ok(None)
            }
            Err(MnemoError::Cancelled) => Err(MnemoError::Cancelled),
            Err(err) => {
                warn!(memory_id = %id, error = %err, "embedding failed; storing unscored");
                Ok(None)
            }
        }
    }

    fn default_ttl_days(&self, kind: MemoryKind) -> Option<u32> {
        match kind {
            MemoryKind::ShortTerm => self.config.memory.short_term_ttl_days,
            MemoryKind::LongTerm => self.config.memory.long_term_ttl_days,
            MemoryKind::File => None,
        }
    }

    async fn backend_write(&self, record: &MemoryRecord) {
        if let Some(backend) = &self.backend {
            if let Err(err) = backend.store_memory(record).await {
                warn!(memory_id = %record.id, error = %err, "backend write failed");
            }
        }
    }

    // --- core operations ---

    /// Store new content and return its id.
    ///
    /// Embedding failure stores the record unscored. Fails only when the
    /// target store rejects the record.
    pub async fn remember(&self, request: RememberRequest) -> Result<String, MnemoError> {
        self.remember_inner(request, None).await
    }

    /// [`MemoryManager::remember`] that gives up once `cancel` fires.
    ///
    /// A cancelled embedding returns [`MnemoError::Cancelled`] and stores
    /// nothing; a timeout still stores the record unscored.
    pub async fn remember_with_cancel(
        &self,
        request: RememberRequest,
        cancel: &CancellationToken,
    ) -> Result<String, MnemoError> {
        self.remember_inner(request, Some(cancel)).await
    }

    async fn remember_inner(
        &self,
        request: RememberRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<String, MnemoError> {
        if request.kind == MemoryKind::File {
            return Err(MnemoError::InvalidRequest(
                "file memories are stored with store_file".into(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let embedding = self
            .embed_for_storage(&request.content, &id, cancel)
            .await?;

        // A TTL that runs past the calendar means no expiry.
        let expires_at = match (request.expires_at, request.ttl) {
            (Some(at), _) => Some(at),
            (None, Some(ttl)) => now.checked_add_signed(ttl),
            (None, None) => self.default_ttl_days(request.kind).and_then(|days| {
                now.checked_add_signed(chrono::Duration::days(i64::from(days)))
            }),
        };

        let mut record = MemoryRecord::new(id.clone(), request.content, request.kind)
            .with_tags(request.tags)
            .with_priority(request.priority)
            .with_created_at(now);
        record.embedding = embedding;
        record.metadata = request.metadata;
        record.session_id = request.session;
        record.role = request.role;
        record.expires_at = expires_at;
        record.validate()?;

        match request.kind {
            MemoryKind::ShortTerm => {
                self.short_term.write().await.add(record.clone());
            }
            MemoryKind::LongTerm => {
                let mut long = self.long_term.write().await;
                if !long.add(record.clone()) {
                    return Err(MnemoError::CapacityRejected {
                        kind: MemoryKind::LongTerm,
                        capacity: long.capacity(),
                    });
                }
            }
            MemoryKind::File => {}
        }

        self.backend_write(&record).await;
        debug!(memory_id = %id, kind = %record.kind, scored = record.is_scored(), "remembered");
        Ok(id)
    }

    /// Similarity-ranked recall. Never fails: problems yield a no-context
    /// outcome.
    pub async fn recall(&self, query: &RecallQuery) -> RecallOutcome {
        self.recall_inner(query, None).await
    }

    /// [`MemoryManager::recall`] that stops waiting on the embedding
    /// provider once `cancel` fires.
    pub async fn recall_with_cancel(
        &self,
        query: &RecallQuery,
        cancel: &CancellationToken,
    ) -> RecallOutcome {
        self.recall_inner(query, Some(cancel)).await
    }

    async fn recall_inner(
        &self,
        query: &RecallQuery,
        cancel: Option<&CancellationToken>,
    ) -> RecallOutcome {
        let recent = self.recent_context(query.session.as_ref()).await;
        let mut outcome = self.ranked(query, cancel).await;
        outcome.recent = recent;
        outcome
    }

    async fn ranked(
        &self,
        query: &RecallQuery,
        cancel: Option<&CancellationToken>,
    ) -> RecallOutcome {
        if query.query.trim().is_empty() {
            return RecallOutcome::no_context(NoContextReason::EmptyQuery);
        }

        let query_vec = match self.embed(&query.query, cancel).await {
            Ok(v) => v,
            Err(err) => {
                warn!(error = %err, "query embedding failed; recall has no context");
                let reason = match err {
                    MnemoError::Timeout { .. } => NoContextReason::Timeout,
                    MnemoError::Cancelled => NoContextReason::Cancelled,
                    other => NoContextReason::ProviderFailure(other.to_string()),
                };
                return RecallOutcome::no_context(reason);
            }
        };

        let min_similarity = query
            .min_similarity
            .unwrap_or(self.config.recall.similarity_threshold as f32);
        let limit = query
            .limit
            .unwrap_or(self.config.recall.max_search_results);

        let wants = |kind: MemoryKind| query.kind.is_none_or(|k| k == kind);
        let mut sources: Vec<Vec<MemoryRecord>> = Vec::new();
        if wants(MemoryKind::ShortTerm) {
            let short = self.short_term.read().await;
            sources.push(short.search(&query.tags, query.min_relevance, None));
        }
        if wants(MemoryKind::LongTerm) {
            let long = self.long_term.read().await;
            sources.push(long.search(&LongTermQuery {
                tags: query.tags.clone(),
                min_relevance: query.min_relevance,
                ..Default::default()
            }));
        }
        if let Some(backend) = &self.backend {
            match backend.search_memories(&query_vec, limit, min_similarity).await {
                Ok(found) => {
                    let now = Utc::now();
                    sources.push(
                        found
                            .into_iter()
                            .filter(|r| !r.is_expired_at(now) && wants(r.kind))
                            .filter(|r| query.tags.is_empty() || r.has_any_tag(&query.tags))
                            .filter(|r| query.min_relevance.is_none_or(|m| r.relevance_score >= m))
                            .collect(),
                    );
                }
                Err(err) => {
                    warn!(error = %err, "backend search failed; using in-process stores only");
                }
            }
        }

        let candidates = recall::merge_candidates(sources);
        if candidates.is_empty() {
            return RecallOutcome::no_context(NoContextReason::NoCandidates);
        }
        let considered = candidates.len();
        let hits = recall::rank_candidates(&query_vec, candidates, min_similarity, limit);
        info!(hits = hits.len(), candidates = considered, "recalled memories");
        RecallOutcome {
            hits,
            recent: Vec::new(),
            source: RecallSource::Semantic,
        }
    }

    /// The newest short-term records for the continuity list.
    async fn recent_context(&self, session: Option<&SessionId>) -> Vec<MemoryRecord> {
        let window = self.config.recall.recent_window;
        if window == 0 {
            return Vec::new();
        }
        let short = self.short_term.read().await;
        short
            .iter_recent()
            .filter(|r| session.is_none_or(|s| r.session_id.as_ref() == Some(s)))
            .take(window)
            .cloned()
            .collect()
    }

    /// Fetch a live record: short-term, then long-term, then the backend.
    pub async fn get(&self, id: &str) -> Option<MemoryRecord> {
        if let Some(record) = self.short_term.write().await.get(id) {
            return Some(record);
        }
        if let Some(record) = self.long_term.write().await.get(id) {
            return Some(record);
        }
        let backend = self.backend.as_ref()?;
        match backend.get_memory(id).await {
            Ok(found) => found.filter(|r| !r.is_expired()),
            Err(err) => {
                warn!(memory_id = %id, error = %err, "backend read failed");
                None
            }
        }
    }

    /// Apply `changes` to a record, re-embedding iff the content changed.
    ///
    /// Returns false for an unknown or expired id.
    pub async fn update(&self, id: &str, changes: MemoryUpdate) -> Result<bool, MnemoError> {
        let now = Utc::now();
        let mut current = self.short_term.read().await.peek(id).cloned();
        if current.is_none() {
            current = self.long_term.read().await.peek(id).cloned();
        }
        let (mut record, in_process) = match current {
            Some(r) if r.is_expired_at(now) => return Ok(false),
            Some(r) => (r, true),
            None => match &self.backend {
                Some(backend) => match backend.get_memory(id).await? {
                    Some(r) if !r.is_expired_at(now) => (r, false),
                    _ => return Ok(false),
                },
                None => return Ok(false),
            },
        };

        let content_changed = changes
            .content
            .as_ref()
            .is_some_and(|c| *c != record.content);
        if let Some(content) = changes.content {
            record.content = content;
        }
        if let Some(tags) = changes.tags {
            record.set_tags(tags);
        }
        if let Some(metadata) = changes.metadata {
            record.metadata = metadata;
        }
        if let Some(priority) = changes.priority {
            record.priority = priority;
        }
        if let Some(relevance) = changes.relevance {
            record.set_relevance(relevance);
        }
        if content_changed {
            record.embedding = self.embed_for_storage(&record.content, id, None).await?;
        }
        record.updated_at = Utc::now();
        record.validate()?;

        let written = if in_process {
            match record.kind {
                MemoryKind::ShortTerm => self.short_term.write().await.update(record.clone()),
                MemoryKind::LongTerm => self.long_term.write().await.update(record.clone()),
                MemoryKind::File => false,
            }
        } else {
            true
        };

        if let Some(backend) = &self.backend {
            match backend.update_memory(&record).await {
                Ok(found) if !in_process => return Ok(found),
                Ok(_) => {}
                Err(err) if in_process => {
                    warn!(memory_id = %id, error = %err, "backend update failed");
                }
                Err(err) => return Err(err),
            }
        }
        debug!(memory_id = %id, content_changed, written, "updated");
        Ok(written)
    }

    /// Remove `id` from every store. True if any store held it.
    pub async fn delete(&self, id: &str) -> bool {
        let short = self.short_term.write().await.remove(id).is_some();
        let long = self.long_term.write().await.remove(id).is_some();
        let file = self.remove_file_record(id, true).await;
        let backend = match &self.backend {
            Some(backend) => match backend.delete_memory(id).await {
                Ok(removed) => removed,
                Err(err) => {
                    warn!(memory_id = %id, error = %err, "backend delete failed");
                    false
                }
            },
            None => false,
        };
        let removed = short || long || file || backend;
        debug!(memory_id = %id, removed, "delete");
        removed
    }

    /// Delete every in-process record matching `criteria`. Returns how many
    /// were actually removed.
    pub async fn forget(&self, criteria: &ForgetCriteria) -> usize {
        let records = self.all_records().await;
        let doomed: Vec<String> = forget::filter_memories(&records, criteria)
            .into_iter()
            .map(|r| r.id.clone())
            .collect();
        let removed = self.delete_records(&doomed).await;
        info!(matched = doomed.len(), removed, "forget");
        removed
    }

    /// Purge expired records from the in-process stores.
    pub async fn cleanup(&self) -> usize {
        let short = self.short_term.write().await.remove_expired();
        let long = self.long_term.write().await.remove_expired();
        let total = short + long;
        info!(short_term = short, long_term = long, total, "cleanup");
        total
    }

    pub async fn get_stats(&self) -> MemoryStats {
        let short = self.short_term.read().await.stats();
        let long = self.long_term.read().await.stats();
        let files = self.files.read().await.stats();
        let mut stats = MemoryStats::aggregate(&short, &long, &files);
        if let Some(backend) = &self.backend {
            match backend.count().await {
                Ok(n) => stats.backend_count = Some(n),
                Err(err) => warn!(error = %err, "backend count failed"),
            }
        }
        stats
    }

    /// Summarize the live records selected by `query`.
    pub async fn summarize(&self, query: &SummaryQuery) -> MemorySummary {
        let wants = |kind: MemoryKind| query.kind.is_none_or(|k| k == kind);
        let mut records: Vec<MemoryRecord> = Vec::new();
        if wants(MemoryKind::ShortTerm) {
            records.extend(self.short_term.read().await.search(&query.tags, None, None));
        }
        if wants(MemoryKind::LongTerm) {
            records.extend(self.long_term.read().await.search(&LongTermQuery {
                tags: query.tags.clone(),
                ..Default::default()
            }));
        }
        if let Some(range) = &query.time_range {
            records.retain(|r| range.contains(r.created_at));
        }

        match &query.topic {
            Some(topic) => {
                let mut summary = self.summarizer.summarize_by_topic(&records, topic).await;
                if query.time_range.is_some() {
                    summary.time_range = query.time_range;
                }
                summary
            }
            None => self.summarizer.summarize_memories(&records).await,
        }
    }

    // --- files ---

    /// Register the file at `path`. With `copy`, the file is copied into
    /// `storage.file_storage_dir` first.
    pub async fn store_file(
        &self,
        path: &Path,
        tags: Vec<String>,
        metadata: Metadata,
        copy: bool,
    ) -> Result<String, MnemoError> {
        let storage_dir = copy.then(|| Path::new(&self.config.storage.file_storage_dir));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let summary = format!("File: {name}");

        let mut record =
            FileRecord::from_path(path, storage_dir, tags, metadata, Some(summary.clone())).await?;
        record.embedding = self
            .embed_for_storage(&summary, &record.id, None)
            .await
            .ok()
            .flatten();

        let id = record.id.clone();
        let managed = record.managed_copy.then(|| record.file_path.clone());
        let mut files = self.files.write().await;
        if !files.add(record) {
            let capacity = files.capacity();
            drop(files);
            if let Some(copy_path) = managed {
                if let Err(err) = tokio::fs::remove_file(&copy_path).await {
                    warn!(path = %copy_path.display(), error = %err, "could not remove rejected file copy");
                }
            }
            return Err(MnemoError::CapacityRejected {
                kind: MemoryKind::File,
                capacity,
            });
        }
        debug!(file_id = %id, "stored file");
        Ok(id)
    }

    /// Files matching the filters, newest first. A non-empty `query` reorders
    /// them by similarity of their summaries.
    pub async fn recall_files(
        &self,
        query: Option<&str>,
        file_type: Option<&str>,
        tags: &[String],
        limit: usize,
    ) -> Vec<FileRecord> {
        let mut found = self.files.read().await.search(&FileQuery {
            file_type: file_type.map(str::to_string),
            tags: tags.to_vec(),
            ..Default::default()
        });

        let query_vec = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => match self.embed(q, None).await {
                Ok(v) => Some(v),
                Err(err) => {
                    warn!(error = %err, "file query embedding failed; returning newest files");
                    None
                }
            },
            None => None,
        };

        if let Some(qv) = query_vec {
            let score = |f: &FileRecord| {
                f.embedding
                    .as_deref()
                    .map(|e| mnemo_core::vector::cosine_similarity(&qv, e))
                    .unwrap_or(-1.0)
            };
            found.sort_by(|a, b| {
                score(b)
                    .total_cmp(&score(a))
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
        found.truncate(limit);
        found
    }

    pub async fn get_file(&self, id: &str) -> Option<FileRecord> {
        self.files.read().await.get(id).cloned()
    }

    /// Remove a file record, deleting its managed copy when asked.
    pub async fn delete_file(&self, id: &str, delete_copy: bool) -> bool {
        self.remove_file_record(id, delete_copy).await
    }

    async fn remove_file_record(&self, id: &str, delete_copy: bool) -> bool {
        let Some(record) = self.files.write().await.remove(id) else {
            return false;
        };
        if delete_copy && record.managed_copy {
            match tokio::fs::remove_file(&record.file_path).await {
                Ok(()) => debug!(file_id = %id, "deleted managed copy"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(file_id = %id, path = %record.file_path.display(), error = %err, "could not delete managed copy");
                }
            }
        }
        true
    }

    // --- maintenance ---

    /// Lower every in-process record's relevance by `rate` per day of age,
    /// floored at `min`. Returns how many scores changed.
    pub async fn apply_decay(&self, rate: f64, min: f64) -> usize {
        let now = Utc::now();
        let mut changed = 0;
        let mut decay = |r: &mut MemoryRecord| {
            let next = forget::decay_relevance(r, rate, min, now);
            if (next - r.relevance_score).abs() > f64::EPSILON {
                r.relevance_score = next;
                changed += 1;
            }
        };
        self.short_term.write().await.for_each_mut(&mut decay);
        self.long_term.write().await.for_each_mut(&mut decay);
        debug!(changed, rate, min, "applied decay");
        changed
    }

    /// Delete near-duplicates, keeping the newest of each similar group.
    /// Returns the removed ids.
    pub async fn consolidate(&self, threshold: f32) -> Vec<String> {
        let records = self.all_records().await;
        let candidates = forget::consolidate_similar(&records, threshold);
        self.delete_records(&candidates).await;
        info!(removed = candidates.len(), threshold, "consolidated similar memories");
        candidates
    }

    /// Cleanup, decay, and (with `forget.auto_forget`) forgetting of records
    /// below `forget.forget_threshold`.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        if self.config.memory.auto_summarize {
            let now = Utc::now();
            let expired: Vec<MemoryRecord> = self
                .all_records()
                .await
                .into_iter()
                .filter(|r| r.is_expired_at(now))
                .collect();
            if !expired.is_empty() {
                report.expired_summary = Some(self.summarizer.summarize_memories(&expired).await);
            }
        }

        report.expired_removed = self.cleanup().await;
        let forget_config = &self.config.forget;
        report.decayed = self
            .apply_decay(forget_config.decay_rate, forget_config.min_relevance)
            .await;
        if forget_config.auto_forget {
            let criteria =
                ForgetCriteria::new().with_relevance_threshold(forget_config.forget_threshold);
            report.forgotten = self.forget(&criteria).await;
        }
        info!(
            expired = report.expired_removed,
            decayed = report.decayed,
            forgotten = report.forgotten,
            "maintenance complete"
        );
        report
    }

    /// Empty every store and the backend.
    pub async fn clear(&self) -> Result<(), MnemoError> {
        self.short_term.write().await.clear();
        self.long_term.write().await.clear();
        self.files.write().await.clear();
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        if let Some(backend) = &self.backend {
            backend.clear().await?;
        }
        info!("cleared all memories");
        Ok(())
    }

    /// Worst health across the embedder, summarizer, and backend.
    pub async fn health(&self) -> HealthStatus {
        let mut status = component_health(self.embedder.health_check().await, "embedder");
        if let Some(summarizer) = self.summarizer.provider() {
            status = status.merge(component_health(
                summarizer.health_check().await,
                "summarizer",
            ));
        }
        if let Some(backend) = &self.backend {
            status = status.merge(component_health(backend.health_check().await, "backend"));
        }
        status
    }

    /// Shut down every collaborator. Errors are logged, the first returned.
    pub async fn shutdown(&self) -> Result<(), MnemoError> {
        let mut first: Option<MnemoError> = None;
        let mut note = |what: &str, result: Result<(), MnemoError>| {
            if let Err(err) = result {
                warn!(adapter = what, error = %err, "shutdown failed");
                first.get_or_insert(err);
            }
        };
        note("embedder", self.embedder.shutdown().await);
        if let Some(summarizer) = self.summarizer.provider() {
            note("summarizer", summarizer.shutdown().await);
        }
        if let Some(backend) = &self.backend {
            note("backend", backend.shutdown().await);
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // --- helpers ---

    /// Every in-process record, expired ones included.
    async fn all_records(&self) -> Vec<MemoryRecord> {
        let mut records = self.short_term.read().await.all_records();
        records.extend(self.long_term.read().await.all_records());
        records
    }

    /// Delete `ids` from the in-process stores and the backend. Returns how
    /// many in-process records were removed.
    async fn delete_records(&self, ids: &[String]) -> usize {
        let mut removed = 0;
        {
            let mut short = self.short_term.write().await;
            let mut long = self.long_term.write().await;
            for id in ids {
                let a = short.remove(id).is_some();
                let b = long.remove(id).is_some();
                if a || b {
                    removed += 1;
                }
            }
        }
        if let Some(backend) = &self.backend {
            for id in ids {
                if let Err(err) = backend.delete_memory(id).await {
                    warn!(memory_id = %id, error = %err, "backend delete failed");
                }
            }
        }
        removed
    }
}

fn component_health(result: Result<HealthStatus, MnemoError>, what: &str) -> HealthStatus {
    match result {
        Ok(HealthStatus::Healthy) => HealthStatus::Healthy,
        Ok(HealthStatus::Degraded(msg)) => HealthStatus::Degraded(format!("{what}: {msg}")),
        Ok(HealthStatus::Unhealthy(msg)) => HealthStatus::Unhealthy(format!("{what}: {msg}")),
        Err(err) => HealthStatus::Unhealthy(format!("{what}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use mnemo_test_utils::{FailingBackend, FailingEmbedder, MockEmbedder, MockSummarizer};

    use super::*;

    async fn manager(config: MnemoConfig) -> MemoryManager {
        MemoryManager::builder(config)
            .embedder(Arc::new(MockEmbedder::new(32)))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn builder_requires_embedder() {
        let err = MemoryManager::builder(MnemoConfig::default())
            .build()
            .await
            .err()
            .expect("missing embedder");
        assert!(matches!(err, MnemoError::Config(_)));
    }

    #[tokio::test]
    async fn remote_backend_needs_injection() {
        let mut config = MnemoConfig::default();
        config.storage.backend = BackendKind::Chroma;
        config.storage.connection_string = Some("http://localhost:8000".into());
        let err = MemoryManager::builder(config.clone())
            .embedder(Arc::new(MockEmbedder::default()))
            .build()
            .await
            .err()
            .expect("chroma without adapter");
        assert!(err.to_string().contains("chroma"));

        let ok = MemoryManager::builder(config)
            .embedder(Arc::new(MockEmbedder::default()))
            .backend(Arc::new(crate::backend::InMemoryBackend::new()))
            .build()
            .await
            .unwrap();
        assert!(ok.has_backend());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_at_build() {
        let mut config = MnemoConfig::default();
        config.recall.similarity_threshold = 3.0;
        let err = MemoryManager::builder(config)
            .embedder(Arc::new(MockEmbedder::default()))
            .build()
            .await
            .err()
            .expect("invalid threshold");
        assert!(matches!(err, MnemoError::Config(msg) if msg.contains("similarity_threshold")));
    }

    #[tokio::test]
    async fn remember_applies_default_short_term_ttl() {
        let m = manager(MnemoConfig::default()).await;
        let id = m.remember(RememberRequest::short_term("hello")).await.unwrap();
        let record = m.get(&id).await.unwrap();
        let expires = record.expires_at.expect("ttl applied");
        let days = (expires - record.created_at).num_days();
        assert_eq!(days, 7);
        assert!(record.is_scored());

        let long = m.remember(RememberRequest::long_term("fact")).await.unwrap();
        assert!(m.get(&long).await.unwrap().expires_at.is_none());
    }

    #[tokio::test]
    async fn remember_file_kind_is_invalid() {
        let m = manager(MnemoConfig::default()).await;
        let err = m
            .remember(RememberRequest::new("x", MemoryKind::File))
            .await
            .unwrap_err();
        assert!(matches!(err, MnemoError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn embedding_failure_stores_unscored() {
        let m = MemoryManager::builder(MnemoConfig::default())
            .embedder(Arc::new(FailingEmbedder))
            .build()
            .await
            .unwrap();
        let id = m.remember(RememberRequest::long_term("kept anyway")).await.unwrap();
        let record = m.get(&id).await.unwrap();
        assert!(!record.is_scored());

        let outcome = m.recall(&RecallQuery::new("kept")).await;
        assert!(matches!(
            outcome.source,
            RecallSource::NoContext(NoContextReason::ProviderFailure(_))
        ));
    }

    #[tokio::test]
    async fn update_reembeds_only_on_content_change() {
        let mut config = MnemoConfig::default();
        config.embedding.cache_enabled = false;
        let embedder = Arc::new(MockEmbedder::new(32));
        let m = MemoryManager::builder(config)
            .embedder(embedder.clone())
            .build()
            .await
            .unwrap();
        let id = m.remember(RememberRequest::long_term("original text")).await.unwrap();
        assert_eq!(embedder.texts_embedded(), 1);

        assert!(m.update(&id, MemoryUpdate::default().tags(["t"])).await.unwrap());
        assert_eq!(embedder.texts_embedded(), 1);

        assert!(m
            .update(&id, MemoryUpdate::default().content("new text"))
            .await
            .unwrap());
        assert_eq!(embedder.texts_embedded(), 2);
        let record = m.get(&id).await.unwrap();
        assert_eq!(record.content, "new text");
        assert_eq!(record.tags, vec!["t"]);
        assert_eq!(record.embedding, Some(embedder.vector_for("new text")));

        assert!(!m.update("missing", MemoryUpdate::default()).await.unwrap());
    }

    #[tokio::test]
    async fn health_reports_summarizer_and_embedder() {
        let m = MemoryManager::builder(MnemoConfig::default())
            .embedder(Arc::new(FailingEmbedder))
            .summarizer(Arc::new(MockSummarizer::new()))
            .build()
            .await
            .unwrap();
        match m.health().await {
            HealthStatus::Unhealthy(msg) => assert!(msg.starts_with("embedder:")),
            other => panic!("expected unhealthy, got {other:?}"),
        }
        assert!(m.shutdown().await.is_ok());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn backend_failures_are_logged_not_returned() {
        let m = MemoryManager::builder(MnemoConfig::default())
            .embedder(Arc::new(MockEmbedder::default()))
            .backend(Arc::new(FailingBackend::new()))
            .build()
            .await
            .unwrap();
        let id = m.remember(RememberRequest::long_term("local copy")).await.unwrap();
        assert!(logs_contain("backend write failed"));

        let outcome = m.recall(&RecallQuery::new("local copy")).await;
        assert_eq!(outcome.hits.len(), 1);
        assert!(logs_contain("backend search failed"));

        assert!(m.delete(&id).await);
        assert!(logs_contain("backend delete failed"));
        assert!(m.clear().await.is_err());
    }
}
