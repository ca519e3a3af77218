// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serializable statistics snapshots for stores and the manager.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mnemo_core::MemoryRecord;
use serde::{Deserialize, Serialize};

/// Point-in-time statistics of one record store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: usize,
    pub capacity: usize,
    /// `total / capacity`, 0 when capacity is 0.
    pub utilization: f64,
    /// Records past `expires_at` that cleanup has not removed yet.
    pub expired_count: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub avg_relevance: f64,
    pub total_accesses: u64,
    /// Distinct tags in the tag index (long-term store only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tags: Option<usize>,
}

impl StoreStats {
    /// Compute statistics over `records` for a store of the given capacity.
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = &'a MemoryRecord>,
        capacity: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let mut stats = StoreStats {
            capacity,
            ..Default::default()
        };
        let mut relevance_sum = 0.0;

        for record in records {
            stats.total += 1;
            relevance_sum += record.relevance_score;
            stats.total_accesses = stats.total_accesses.saturating_add(record.access_count);
            if record.is_expired_at(now) {
                stats.expired_count += 1;
            }
            stats.oldest = Some(match stats.oldest {
                Some(t) => t.min(record.created_at),
                None => record.created_at,
            });
            stats.newest = Some(match stats.newest {
                Some(t) => t.max(record.created_at),
                None => record.created_at,
            });
        }

        if stats.total > 0 {
            stats.avg_relevance = relevance_sum / stats.total as f64;
        }
        stats.utilization = utilization(stats.total, capacity);
        stats
    }
}

/// Statistics of the file store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileStoreStats {
    pub total_files: usize,
    pub capacity: usize,
    pub utilization: f64,
    pub total_size_bytes: u64,
    pub avg_size_bytes: f64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    /// File count per type, keyed by extension.
    pub file_types: BTreeMap<String, usize>,
}

/// Aggregate snapshot across every store, safe to serialize for reporting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Short-term plus long-term records.
    pub total_memories: usize,
    pub short_term_count: usize,
    pub long_term_count: usize,
    pub file_count: usize,
    /// Records held by the external backend, when one is attached and reachable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_count: Option<usize>,
    pub total_size_bytes: u64,
    pub short_term_utilization: f64,
    pub long_term_utilization: f64,
    pub file_utilization: f64,
    pub expired_count: usize,
    pub oldest_memory: Option<DateTime<Utc>>,
    pub newest_memory: Option<DateTime<Utc>>,
    /// Count-weighted mean relevance of short-term and long-term records.
    pub avg_relevance: f64,
}

impl MemoryStats {
    /// Combine per-store statistics into one snapshot.
    pub fn aggregate(short: &StoreStats, long: &StoreStats, files: &FileStoreStats) -> Self {
        let total = short.total + long.total;
        let avg_relevance = if total > 0 {
            (short.avg_relevance * short.total as f64 + long.avg_relevance * long.total as f64)
                / total as f64
        } else {
            0.0
        };

        MemoryStats {
            total_memories: total,
            short_term_count: short.total,
            long_term_count: long.total,
            file_count: files.total_files,
            backend_count: None,
            total_size_bytes: files.total_size_bytes,
            short_term_utilization: short.utilization,
            long_term_utilization: long.utilization,
            file_utilization: files.utilization,
            expired_count: short.expired_count + long.expired_count,
            oldest_memory: min_opt(short.oldest, long.oldest),
            newest_memory: max_opt(short.newest, long.newest),
            avg_relevance,
        }
    }
}

pub(crate) fn utilization(total: usize, capacity: usize) -> f64 {
    if capacity == 0 {
        0.0
    } else {
        total as f64 / capacity as f64
    }
}

fn min_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_opt(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
