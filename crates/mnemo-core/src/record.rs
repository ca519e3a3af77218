// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory record schema shared by every store, backend, and policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::MnemoError;
use crate::types::SessionId;

/// Open metadata mapping attached to a record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Retention tier that owns a record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MemoryKind {
    ShortTerm,
    LongTerm,
    File,
}

/// Caller-assigned importance of a record.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// A single unit of remembered content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Opaque identifier, unique across every store.
    pub id: String,
    /// The remembered text.
    pub content: String,
    /// Tier that owns this record.
    pub kind: MemoryKind,
    /// Semantic vector. `None` until an embedding provider has scored the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Free-form metadata. Session and role live in their own fields.
    #[serde(default)]
    pub metadata: Metadata,
    /// Tags in insertion order, without duplicates.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Relevance in `[0, 1]`, lowered over time by decay.
    #[serde(default = "default_relevance")]
    pub relevance_score: f64,
    /// Successful reads of this record.
    #[serde(default)]
    pub access_count: u64,
    /// Conversation session that produced the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Speaker role (`user`, `assistant`, ...) for chat turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// After this instant the record is expired and invisible to reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_relevance() -> f64 {
    1.0
}

impl MemoryRecord {
    /// Create a record stamped with the current time and default scores.
    pub fn new(id: impl Into<String>, content: impl Into<String>, kind: MemoryKind) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            content: content.into(),
            kind,
            embedding: None,
            metadata: Metadata::new(),
            tags: Vec::new(),
            priority: Priority::default(),
            relevance_score: default_relevance(),
            access_count: 0,
            session_id: None,
            role: None,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            expires_at: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Replace the tag list, dropping duplicates but keeping first-seen order.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_tags(tags);
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

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Backdate the record. Resets `updated_at` and `last_accessed_at` too.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self.last_accessed_at = created_at;
        self
    }

    pub fn with_relevance(mut self, score: f64) -> Self {
        self.set_relevance(score);
        self
    }

    /// Replace the tag list with duplicates removed.
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = normalize_tags(tags);
    }

    /// Set relevance, clamped into `[0, 1]`. NaN becomes 0.
    pub fn set_relevance(&mut self, score: f64) {
        self.relevance_score = clamp_unit(score);
    }

    /// Whether the record is expired at the current instant.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the record is expired at `now`.
    ///
    /// Once true for some instant it stays true for every later instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Whether an embedding is present, i.e. the record can take part in recall.
    pub fn is_scored(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Whether any of `tags` is on this record.
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }

    /// Read-access bookkeeping.
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = now;
    }

    /// Whole days elapsed since creation, never negative.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days().max(0)
    }

    /// Check the schema invariants that construction alone cannot enforce.
    pub fn validate(&self) -> Result<(), MnemoError> {
        if self.id.trim().is_empty() {
            return Err(MnemoError::InvalidRequest("record id must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.relevance_score) {
            return Err(MnemoError::InvalidRequest(format!(
                "relevance_score {} is outside [0, 1]",
                self.relevance_score
            )));
        }
        if let Some(embedding) = &self.embedding {
            if embedding.is_empty() {
                return Err(MnemoError::InvalidRequest(format!(
                    "record {} has an empty embedding",
                    self.id
                )));
            }
            if embedding.iter().any(|v| !v.is_finite()) {
                return Err(MnemoError::InvalidRequest(format!(
                    "record {} has a non-finite embedding component",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Drop duplicate tags, keeping the first occurrence of each.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.into();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Derived digest of a set of records. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    pub summary_text: String,
    pub num_memories: usize,
    /// Distinct tags across the inputs, sorted.
    pub topics: Vec<String>,
    /// Most frequent content words, most frequent first.
    #[serde(default)]
    pub key_phrases: Vec<String>,
    /// Span of `created_at` across the inputs.
    pub time_range: Option<TimeRange>,
}

impl MemorySummary {
    /// Summary of nothing.
    pub fn empty() -> Self {
        Self {
            summary_text: "No memories to summarize.".to_string(),
            num_memories: 0,
            topics: Vec::new(),
            key_phrases: Vec::new(),
            time_range: None,
        }
    }
}

/// Declarative predicate used to select records for forgetting.
///
/// A record matches only if every populated field holds. An all-unset
/// criteria matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForgetCriteria {
    /// Created at least this many days ago.
    pub older_than_days: Option<u32>,
    /// Relevance strictly below this value.
    pub relevance_threshold: Option<f64>,
    /// Read at most this many times (`access_count <= max`), so rarely
    /// read records are the ones forgotten.
    pub max_access_count: Option<u64>,
    pub kind: Option<MemoryKind>,
    /// Carries at least one of these tags. Empty means unconstrained.
    #[serde(default)]
    pub tags: Vec<String>,
    pub priority: Option<Priority>,
}

impl ForgetCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_older_than_days(mut self, days: u32) -> Self {
        self.older_than_days = Some(days);
        self
    }

    pub fn with_relevance_threshold(mut self, threshold: f64) -> Self {
        self.relevance_threshold = Some(threshold);
        self
    }

    pub fn with_max_access_count(mut self, count: u64) -> Self {
        self.max_access_count = Some(count);
        self
    }

    pub fn with_kind(mut self, kind: MemoryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// True when no field is populated.
    pub fn is_unconstrained(&self) -> bool {
        self.older_than_days.is_none()
            && self.relevance_threshold.is_none()
            && self.max_access_count.is_none()
            && self.kind.is_none()
            && self.tags.is_empty()
            && self.priority.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn new_record_has_defaults() {
        let record = MemoryRecord::new("m1", "hello", MemoryKind::ShortTerm);
        assert_eq!(record.relevance_score, 1.0);
        assert_eq!(record.access_count, 0);
        assert_eq!(record.priority, Priority::Medium);
        assert!(record.embedding.is_none());
        assert!(!record.is_expired());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn tags_drop_duplicates_and_keep_order() {
        let record =
            MemoryRecord::new("m1", "x", MemoryKind::LongTerm).with_tags(["b", "a", "b", "c", "a"]);
        assert_eq!(record.tags, vec!["b", "a", "c"]);
    }

    #[test]
    fn relevance_is_clamped() {
        let mut record = MemoryRecord::new("m1", "x", MemoryKind::LongTerm).with_relevance(1.7);
        assert_eq!(record.relevance_score, 1.0);
        record.set_relevance(-0.2);
        assert_eq!(record.relevance_score, 0.0);
        record.set_relevance(f64::NAN);
        assert_eq!(record.relevance_score, 0.0);
    }

    #[test]
    fn expiry_is_strictly_before_now() {
        let now = Utc::now();
        let record = MemoryRecord::new("m1", "x", MemoryKind::ShortTerm).with_expires_at(now);
        assert!(!record.is_expired_at(now));
        assert!(record.is_expired_at(now + Duration::milliseconds(1)));
        let past = MemoryRecord::new("m2", "x", MemoryKind::ShortTerm)
            .with_expires_at(now - Duration::seconds(1));
        assert!(past.is_expired());
    }

    #[test]
    fn record_access_bumps_count_and_timestamp() {
        let mut record = MemoryRecord::new("m1", "x", MemoryKind::ShortTerm);
        let later = record.created_at + Duration::minutes(5);
        record.record_access(later);
        record.record_access(later);
        assert_eq!(record.access_count, 2);
        assert_eq!(record.last_accessed_at, later);
    }

    #[test]
    fn validate_rejects_bad_records() {
        let ok = MemoryRecord::new("m1", "x", MemoryKind::ShortTerm).with_embedding(vec![0.1, 0.2]);
        assert!(ok.validate().is_ok());

        let empty_id = MemoryRecord::new("  ", "x", MemoryKind::ShortTerm);
        assert!(empty_id.validate().is_err());

        let mut bad_relevance = MemoryRecord::new("m1", "x", MemoryKind::ShortTerm);
        bad_relevance.relevance_score = 2.0;
        assert!(bad_relevance.validate().is_err());

        let nan = MemoryRecord::new("m1", "x", MemoryKind::ShortTerm)
            .with_embedding(vec![f32::NAN, 1.0]);
        assert!(nan.validate().is_err());
    }

    #[test]
    fn kind_and_priority_parse_snake_case() {
        assert_eq!(MemoryKind::from_str("short_term").unwrap(), MemoryKind::ShortTerm);
        assert_eq!(MemoryKind::from_str("LONG_TERM").unwrap(), MemoryKind::LongTerm);
        assert_eq!(MemoryKind::File.to_string(), "file");
        assert_eq!(Priority::from_str("critical").unwrap(), Priority::Critical);
        assert!(Priority::from_str("urgent").is_err());
        assert!(Priority::Low < Priority::Medium && Priority::High < Priority::Critical);

        let json = serde_json::to_string(&MemoryKind::LongTerm).unwrap();
        assert_eq!(json, "\"long_term\"");
    }

    #[test]
    fn record_json_omits_unset_optionals() {
        let record = MemoryRecord::new("m1", "x", MemoryKind::ShortTerm);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("embedding").is_none());
        assert!(json.get("expires_at").is_none());
        let back: MemoryRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn forget_criteria_default_is_unconstrained() {
        assert!(ForgetCriteria::new().is_unconstrained());
        assert!(!ForgetCriteria::new().with_tags(["x"]).is_unconstrained());
        assert!(!ForgetCriteria::new().with_priority(Priority::Low).is_unconstrained());
    }

    #[test]
    fn time_range_is_inclusive() {
        let start = Utc::now();
        let end = start + Duration::hours(1);
        let range = TimeRange { start, end };
        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end + Duration::seconds(1)));
    }

    proptest! {
        #[test]
        fn expiry_never_reverts(offset_secs in -10_000i64..10_000, later_secs in 0i64..100_000) {
            let base = Utc::now();
            let record = MemoryRecord::new("m", "x", MemoryKind::ShortTerm)
                .with_expires_at(base + Duration::seconds(offset_secs));
            if record.is_expired_at(base) {
                prop_assert!(record.is_expired_at(base + Duration::seconds(later_secs)));
            }
        }
    }
}
