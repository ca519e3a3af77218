// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Similarity-ranked recall.
//!
//! The manager gathers candidates and embeds the query; this module scores
//! and orders them. Ranking is a deterministic linear scan:
//!
//! 1. Candidates without an embedding are skipped.
//! 2. Cosine similarity, clamped to `[0, 1]`, against the query vector.
//! 3. Candidates below `min_similarity` are dropped.
//! 4. Sort by similarity desc, `created_at` desc, `id` asc.
//! 5. Ranks are 1-based; the list is truncated to `limit`.

use std::cmp::Ordering;
use std::collections::HashSet;

use mnemo_core::vector::cosine_similarity;
use mnemo_core::{MemoryKind, MemoryRecord, SessionId};
use serde::{Deserialize, Serialize};

/// Parameters of one recall.
#[derive(Debug, Clone, PartialEq)]
pub struct RecallQuery {
    pub query: String,
    /// Restrict to one tier. `None` searches short- and long-term.
    pub kind: Option<MemoryKind>,
    /// Candidate must carry any of these tags. Empty means no tag filter.
    pub tags: Vec<String>,
    pub min_relevance: Option<f64>,
    /// Overrides the configured `recall.similarity_threshold`.
    pub min_similarity: Option<f32>,
    /// Overrides the configured `recall.max_search_results`.
    pub limit: Option<usize>,
    /// Scopes the continuity list. Ranked hits are not session-filtered.
    pub session: Option<SessionId>,
}

impl RecallQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            kind: None,
            tags: Vec::new(),
            min_relevance: None,
            min_similarity: None,
            limit: None,
            session: None,
        }
    }
}

/// One ranked recall result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallHit {
    pub record: MemoryRecord,
    pub similarity: f32,
    /// 1-based position after sorting.
    pub rank: usize,
}

/// Why a recall produced no semantic context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum NoContextReason {
    EmptyQuery,
    NoCandidates,
    ProviderFailure(String),
    Timeout,
    Cancelled,
}

/// Where the hits of a [`RecallOutcome`] came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallSource {
    /// Similarity ranking ran. `hits` may still be empty if nothing passed
    /// the threshold.
    Semantic,
    NoContext(NoContextReason),
}

/// Result of [`crate::MemoryManager::recall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallOutcome {
    pub hits: Vec<RecallHit>,
    /// Newest short-term records, when `recall.recent_window > 0`.
    #[serde(default)]
    pub recent: Vec<MemoryRecord>,
    pub source: RecallSource,
}

impl RecallOutcome {
    pub fn no_context(reason: NoContextReason) -> Self {
        Self {
            hits: Vec::new(),
            recent: Vec::new(),
            source: RecallSource::NoContext(reason),
        }
    }

    pub fn is_no_context(&self) -> bool {
        matches!(self.source, RecallSource::NoContext(_))
    }

    pub fn records(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.hits.iter().map(|h| &h.record)
    }
}

/// Score, filter, sort, rank, and truncate `candidates`.
pub fn rank_candidates(
    query_vec: &[f32],
    candidates: Vec<MemoryRecord>,
    min_similarity: f32,
    limit: usize,
) -> Vec<RecallHit> {
    let mut scored: Vec<(MemoryRecord, f32)> = candidates
        .into_iter()
        .filter_map(|record| {
            let similarity = cosine_similarity(query_vec, record.embedding.as_deref()?);
            (similarity >= min_similarity).then_some((record, similarity))
        })
        .collect();

    scored.sort_by(|(a, sa), (b, sb)| {
        sb.partial_cmp(sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (record, similarity))| RecallHit {
            record,
            similarity,
            rank: i + 1,
        })
        .collect()
}

/// Concatenate candidate sources, keeping the first copy of each id.
///
/// In-process stores are passed first so their copy wins over a backend's.
pub fn merge_candidates(sources: impl IntoIterator<Item = Vec<MemoryRecord>>) -> Vec<MemoryRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    sources
        .into_iter()
        .flatten()
        .filter(|r| seen.insert(r.id.clone()))
        .collect()
}
