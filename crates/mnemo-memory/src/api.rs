// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-facing façade over [`MemoryManager`].
//!
//! Accepts loosely typed input (kinds and priorities as strings) and turns
//! every outcome, errors included, into a [`MemoryResponse`].

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use mnemo_core::{
    ForgetCriteria, HealthStatus, MemoryKind, MemoryRecord, MemorySummary, Metadata, MnemoError,
    Priority, SessionId, TimeRange,
};

use crate::file_store::FileRecord;
use crate::manager::{
    MaintenanceReport, MemoryManager, MemoryUpdate, RememberRequest, SummaryQuery,
};
use crate::recall::{RecallOutcome, RecallQuery, RecallSource};
use crate::stats::MemoryStats;

/// Uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: String,
}

impl<T> MemoryResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
        }
    }

    fn from_error(err: &MnemoError) -> Self {
        warn!(error = %err, "memory request failed");
        Self::fail(err.to_string())
    }
}

/// Fluent recall request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecallRequest {
    query: String,
    kind: Option<String>,
    tags: Vec<String>,
    limit: Option<usize>,
    min_similarity: Option<f32>,
    session: Option<String>,
}

impl RecallRequest {
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// `"short_term"`, `"long_term"`, or `"file"` (case-insensitive).
    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    pub fn session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Resolve into a typed [`RecallQuery`]. Fails on an unknown kind.
    pub fn into_query(self) -> Result<RecallQuery, MnemoError> {
        let kind = self.kind.as_deref().map(parse_kind).transpose()?;
        Ok(RecallQuery {
            query: self.query,
            kind,
            tags: self.tags,
            min_relevance: None,
            min_similarity: self.min_similarity,
            limit: self.limit,
            session: self.session.map(SessionId),
        })
    }
}

fn parse_kind(kind: &str) -> Result<MemoryKind, MnemoError> {
    MemoryKind::from_str(kind)
        .map_err(|_| MnemoError::InvalidRequest(format!("unknown memory kind `{kind}`")))
}

fn parse_priority(priority: &str) -> Result<Priority, MnemoError> {
    Priority::from_str(priority)
        .map_err(|_| MnemoError::InvalidRequest(format!("unknown priority `{priority}`")))
}

/// Façade handed to chat integrations.
#[derive(Clone)]
pub struct MemoryApi {
    manager: Arc<MemoryManager>,
}

impl MemoryApi {
    pub fn new(manager: Arc<MemoryManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<MemoryManager> {
        &self.manager
    }

    /// Store content. `kind` defaults to short-term, `priority` to medium.
    pub async fn store(
        &self,
        content: &str,
        kind: Option<&str>,
        tags: Vec<String>,
        priority: Option<&str>,
        ttl_days: Option<u32>,
    ) -> MemoryResponse<String> {
        let request = match build_remember(content, kind, tags, priority, ttl_days) {
            Ok(r) => r,
            Err(err) => return MemoryResponse::from_error(&err),
        };
        match self.manager.remember(request).await {
            Ok(id) => MemoryResponse::ok(id, "memory stored"),
            Err(err) => MemoryResponse::from_error(&err),
        }
    }

    pub async fn recall(&self, request: RecallRequest) -> MemoryResponse<RecallOutcome> {
        let query = match request.into_query() {
            Ok(q) => q,
            Err(err) => return MemoryResponse::from_error(&err),
        };
        let outcome = self.manager.recall(&query).await;
        let message = match &outcome.source {
            RecallSource::Semantic => format!("found {} memories", outcome.hits.len()),
            RecallSource::NoContext(reason) => format!("no relevant context: {reason:?}"),
        };
        MemoryResponse::ok(outcome, message)
    }

    pub async fn get(&self, id: &str) -> MemoryResponse<MemoryRecord> {
        match self.manager.get(id).await {
            Some(record) => MemoryResponse::ok(record, "memory found"),
            None => MemoryResponse::fail(format!("memory {id} not found")),
        }
    }

    pub async fn update(&self, id: &str, changes: MemoryUpdate) -> MemoryResponse<bool> {
        match self.manager.update(id, changes).await {
            Ok(true) => MemoryResponse::ok(true, "memory updated"),
            Ok(false) => MemoryResponse::fail(format!("memory {id} not found")),
            Err(err) => MemoryResponse::from_error(&err),
        }
    }

    pub async fn delete(&self, id: &str) -> MemoryResponse<bool> {
        if self.manager.delete(id).await {
            MemoryResponse::ok(true, "memory deleted")
        } else {
            MemoryResponse::fail(format!("memory {id} not found"))
        }
    }

    pub async fn forget(&self, criteria: &ForgetCriteria) -> MemoryResponse<usize> {
        let removed = self.manager.forget(criteria).await;
        MemoryResponse::ok(removed, format!("forgot {removed} memories"))
    }

    pub async fn cleanup(&self) -> MemoryResponse<usize> {
        let removed = self.manager.cleanup().await;
        MemoryResponse::ok(removed, format!("removed {removed} expired memories"))
    }

    pub async fn stats(&self) -> MemoryResponse<MemoryStats> {
        MemoryResponse::ok(self.manager.get_stats().await, "statistics collected")
    }

    pub async fn summarize(
        &self,
        topic: Option<&str>,
        kind: Option<&str>,
        tags: Vec<String>,
        time_range: Option<TimeRange>,
    ) -> MemoryResponse<MemorySummary> {
        let kind = match kind.map(parse_kind).transpose() {
            Ok(k) => k,
            Err(err) => return MemoryResponse::from_error(&err),
        };
        let query = SummaryQuery {
            topic: topic.map(str::to_string),
            kind,
            tags,
            time_range,
        };
        let summary = self.manager.summarize(&query).await;
        let message = format!("summarized {} memories", summary.num_memories);
        MemoryResponse::ok(summary, message)
    }

    pub async fn store_file(
        &self,
        path: &Path,
        tags: Vec<String>,
        copy: bool,
    ) -> MemoryResponse<String> {
        match self
            .manager
            .store_file(path, tags, Metadata::new(), copy)
            .await
        {
            Ok(id) => MemoryResponse::ok(id, "file stored"),
            Err(err) => MemoryResponse::from_error(&err),
        }
    }

    pub async fn search_files(
        &self,
        query: Option<&str>,
        file_type: Option<&str>,
        tags: &[String],
        limit: usize,
    ) -> MemoryResponse<Vec<FileRecord>> {
        let files = self.manager.recall_files(query, file_type, tags, limit).await;
        let message = format!("found {} files", files.len());
        MemoryResponse::ok(files, message)
    }

    pub async fn delete_file(&self, id: &str, delete_copy: bool) -> MemoryResponse<bool> {
        if self.manager.delete_file(id, delete_copy).await {
            MemoryResponse::ok(true, "file deleted")
        } else {
            MemoryResponse::fail(format!("file {id} not found"))
        }
    }

    pub async fn maintenance(&self) -> MemoryResponse<MaintenanceReport> {
        MemoryResponse::ok(self.manager.run_maintenance().await, "maintenance complete")
    }

    pub async fn health(&self) -> MemoryResponse<HealthStatus> {
        match self.manager.health().await {
            HealthStatus::Healthy => MemoryResponse::ok(HealthStatus::Healthy, "healthy"),
            other => {
                let message = format!("{other:?}");
                MemoryResponse {
                    success: false,
                    data: Some(other),
                    message,
                }
            }
        }
    }
}

fn build_remember(
    content: &str,
    kind: Option<&str>,
    tags: Vec<String>,
    priority: Option<&str>,
    ttl_days: Option<u32>,
) -> Result<RememberRequest, MnemoError> {
    let kind = kind.map(parse_kind).transpose()?.unwrap_or(MemoryKind::ShortTerm);
    let priority = priority.map(parse_priority).transpose()?.unwrap_or_default();
    let mut request = RememberRequest::new(content, kind)
        .with_tags(tags)
        .with_priority(priority);
    if let Some(days) = ttl_days {
        request = request.with_ttl_days(days);
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_request_parses_kind_case_insensitively() {
        let query = RecallRequest::default()
            .query("rust")
            .kind("Long_Term")
            .tags(["lang"])
            .limit(3)
            .min_similarity(0.4)
            .session("s1")
            .into_query()
            .unwrap();
        assert_eq!(query.kind, Some(MemoryKind::LongTerm));
        assert_eq!(query.limit, Some(3));
        assert_eq!(query.min_similarity, Some(0.4));
        assert_eq!(query.session, Some(SessionId("s1".into())));
    }

    #[test]
    fn unknown_kind_is_invalid_request() {
        let err = RecallRequest::default()
            .query("x")
            .kind("medium_term")
            .into_query()
            .unwrap_err();
        assert!(matches!(err, MnemoError::InvalidRequest(msg) if msg.contains("medium_term")));
    }

    #[test]
    fn remember_request_defaults() {
        let request = build_remember("hi", None, vec![], None, Some(3)).unwrap();
        assert_eq!(request.kind, MemoryKind::ShortTerm);
        assert_eq!(request.priority, Priority::Medium);
        assert_eq!(request.ttl, Some(chrono::Duration::days(3)));

        assert!(build_remember("hi", None, vec![], Some("urgent"), None).is_err());
        let high = build_remember("hi", Some("long_term"), vec![], Some("HIGH"), None).unwrap();
        assert_eq!(high.priority, Priority::High);
    }

    #[test]
    fn response_serializes_without_data_on_failure() {
        let response: MemoryResponse<String> = MemoryResponse::fail("nope");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["message"], "nope");
    }
}
