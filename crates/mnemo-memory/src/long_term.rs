// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Indexed long-term store.
//!
//! Unlike the short-term store this one never evicts: a new id arriving at
//! capacity is rejected. Two secondary indices are kept in lockstep with the
//! primary map:
//!
//! - a tag index (tag → ids), with emptied tags dropped
//! - a time index ordered by `(created_at, id)`

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use mnemo_core::{MemoryKind, MemoryRecord};
use tracing::{debug, error, info, warn};

use crate::stats::StoreStats;

/// Filters accepted by [`LongTermStore::search`].
#[derive(Debug, Clone, Default)]
pub struct LongTermQuery {
    /// Match records with any of these tags. Empty matches all records.
    pub tags: Vec<String>,
    pub min_relevance: Option<f64>,
    /// Inclusive lower bound on `created_at`.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Capacity-bounded store with tag and time indices.
#[derive(Debug)]
pub struct LongTermStore {
    capacity: usize,
    records: HashMap<String, MemoryRecord>,
    tag_index: HashMap<String, HashSet<String>>,
    time_index: BTreeSet<(DateTime<Utc>, String)>,
}

impl LongTermStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: HashMap::new(),
            tag_index: HashMap::new(),
            time_index: BTreeSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Insert or replace a record.
    ///
    /// Returns false when the id is new and the store is full, or when the
    /// record fails validation. Replacing an existing id always succeeds.
    pub fn add(&mut self, mut record: MemoryRecord) -> bool {
        if let Err(err) = record.validate() {
            warn!(memory_id = %record.id, error = %err, "long-term store refused invalid record");
            return false;
        }
        if !self.records.contains_key(&record.id) && self.is_full() {
            warn!(
                memory_id = %record.id,
                capacity = self.capacity,
                "long-term store full; rejecting record"
            );
            return false;
        }
        record.kind = MemoryKind::LongTerm;
        if let Some(previous) = self.records.remove(&record.id) {
            self.unindex(&previous);
        }
        self.index(&record);
        debug!(memory_id = %record.id, "stored long-term record");
        self.records.insert(record.id.clone(), record);
        true
    }

    /// Fetch a live record with access bookkeeping.
    pub fn get(&mut self, id: &str) -> Option<MemoryRecord> {
        let now = Utc::now();
        let record = self.records.get_mut(id)?;
        if record.is_expired_at(now) {
            return None;
        }
        record.record_access(now);
        Some(record.clone())
    }

    /// Borrow a record without bookkeeping. Expired records are returned too.
    pub fn peek(&self, id: &str) -> Option<&MemoryRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Remove a record from the map and both indices.
    pub fn remove(&mut self, id: &str) -> Option<MemoryRecord> {
        let record = self.records.remove(id)?;
        self.unindex(&record);
        Some(record)
    }

    /// Replace an existing record, reconciling its tags and creation time.
    pub fn update(&mut self, mut record: MemoryRecord) -> bool {
        let Some(previous) = self.records.remove(&record.id) else {
            return false;
        };
        record.kind = MemoryKind::LongTerm;
        self.unindex(&previous);
        self.index(&record);
        self.records.insert(record.id.clone(), record);
        true
    }

    /// Live records matching `query`, newest-created first.
    pub fn search(&self, query: &LongTermQuery) -> Vec<MemoryRecord> {
        let now = Utc::now();
        let tagged: Option<HashSet<&str>> = if query.tags.is_empty() {
            None
        } else {
            Some(
                query
                    .tags
                    .iter()
                    .filter_map(|t| self.tag_index.get(t))
                    .flatten()
                    .map(String::as_str)
                    .collect(),
            )
        };

        self.time_index
            .iter()
            .rev()
            .filter(|(created_at, _)| {
                query.start.is_none_or(|s| *created_at >= s)
                    && query.end.is_none_or(|e| *created_at <= e)
            })
            .filter(|(_, id)| tagged.as_ref().is_none_or(|set| set.contains(id.as_str())))
            .filter_map(|(_, id)| self.records.get(id))
            .filter(|r| !r.is_expired_at(now))
            .filter(|r| query.min_relevance.is_none_or(|min| r.relevance_score >= min))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Live records carrying `tag`, newest first.
    pub fn by_tag(&self, tag: &str) -> Vec<MemoryRecord> {
        self.search(&LongTermQuery {
            tags: vec![tag.to_string()],
            ..Default::default()
        })
    }

    /// Up to `n` live records, oldest-created first. Ties by id ascending.
    pub fn oldest(&self, n: usize) -> Vec<MemoryRecord> {
        let now = Utc::now();
        self.time_index
            .iter()
            .filter_map(|(_, id)| self.records.get(id))
            .filter(|r| !r.is_expired_at(now))
            .take(n)
            .cloned()
            .collect()
    }

    /// Up to `n` live records, newest-created first. Ties by id ascending.
    pub fn newest(&self, n: usize) -> Vec<MemoryRecord> {
        let now = Utc::now();
        let mut out: Vec<MemoryRecord> = Vec::with_capacity(n.min(self.records.len()));
        // Reverse iteration flips id order within a timestamp, so regroup.
        let mut iter = self.time_index.iter().rev().peekable();
        while out.len() < n {
            let Some((ts, _)) = iter.peek().copied() else {
                break;
            };
            let ts = *ts;
            let mut group: Vec<&MemoryRecord> = Vec::new();
            while let Some((t, id)) = iter.peek().copied() {
                if *t != ts {
                    break;
                }
                if let Some(r) = self.records.get(id) {
                    if !r.is_expired_at(now) {
                        group.push(r);
                    }
                }
                iter.next();
            }
            group.reverse();
            out.extend(group.into_iter().take(n - out.len()).cloned());
        }
        out
    }

    /// Distinct tags currently indexed.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.tag_index.keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Ids indexed under `tag`.
    pub fn tag_members(&self, tag: &str) -> Option<&HashSet<String>> {
        self.tag_index.get(tag)
    }

    /// Every stored record, expired ones included, oldest first.
    pub fn all_records(&self) -> Vec<MemoryRecord> {
        self.time_index
            .iter()
            .filter_map(|(_, id)| self.records.get(id))
            .cloned()
            .collect()
    }

    pub fn remove_expired(&mut self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .records
            .values()
            .filter(|r| r.is_expired_at(now))
            .map(|r| r.id.clone())
            .collect();
        for id in &expired {
            self.remove(id);
        }
        if !expired.is_empty() {
            info!(removed = expired.len(), "removed expired long-term records");
        }
        expired.len()
    }

    /// Apply `f` to every record in place. Tags and `created_at` must not be
    /// changed this way; use [`LongTermStore::update`] for that.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut MemoryRecord)) {
        for record in self.records.values_mut() {
            f(record);
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.tag_index.clear();
        self.time_index.clear();
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::from_records(self.records.values(), self.capacity, Utc::now());
        stats.total_tags = Some(self.tag_index.len());
        stats
    }

    /// Verify both indices against the primary map, rebuilding them on drift.
    ///
    /// Returns true if a rebuild was needed.
    pub fn check_consistency(&mut self) -> bool {
        let (tag_index, time_index) = build_indices(&self.records);
        if tag_index == self.tag_index && time_index == self.time_index {
            return false;
        }
        error!(
            records = self.records.len(),
            indexed_times = self.time_index.len(),
            indexed_tags = self.tag_index.len(),
            "long-term indices out of sync with records; rebuilding"
        );
        self.tag_index = tag_index;
        self.time_index = time_index;
        true
    }

    fn index(&mut self, record: &MemoryRecord) {
        for tag in &record.tags {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(record.id.clone());
        }
        self.time_index
            .insert((record.created_at, record.id.clone()));
    }

    fn unindex(&mut self, record: &MemoryRecord) {
        for tag in &record.tags {
            if let Some(ids) = self.tag_index.get_mut(tag) {
                ids.remove(&record.id);
                if ids.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
        self.time_index
            .remove(&(record.created_at, record.id.clone()));
    }
}

type Indices = (
    HashMap<String, HashSet<String>>,
    BTreeSet<(DateTime<Utc>, String)>,
);

fn build_indices(records: &HashMap<String, MemoryRecord>) -> Indices {
    let mut tags: HashMap<String, HashSet<String>> = HashMap::new();
    let mut times = BTreeSet::new();
    for record in records.values() {
        for tag in &record.tags {
            tags.entry(tag.clone()).or_default().insert(record.id.clone());
        }
        times.insert((record.created_at, record.id.clone()));
    }
    (tags, times)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;

    fn rec(id: &str) -> MemoryRecord {
        MemoryRecord::new(id, format!("fact {id}"), MemoryKind::LongTerm)
    }

    fn ids(records: &[MemoryRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn rejects_new_id_at_capacity() {
        let mut store = LongTermStore::new(2);
        assert!(store.add(rec("a")));
        assert!(store.add(rec("b")));
        assert!(!store.add(rec("c")));
        assert_eq!(store.len(), 2);
        assert!(!store.contains("c"));

        // replacing an existing id is not a new slot
        assert!(store.add(MemoryRecord::new("a", "changed", MemoryKind::ShortTerm)));
        assert_eq!(store.peek("a").map(|r| r.kind), Some(MemoryKind::LongTerm));
    }

    #[test]
    fn removing_last_holder_prunes_tag() {
        let mut store = LongTermStore::new(10);
        store.add(rec("r").with_tags(["x", "y"]));
        assert!(store.tag_members("y").is_some());

        let mut changed = store.peek("r").cloned().expect("present");
        changed.set_tags(["x"]);
        assert!(store.update(changed));
        assert!(store.tag_members("y").is_none());
        assert_eq!(store.tags(), vec!["x"]);

        store.remove("r");
        assert!(store.tags().is_empty());
        assert!(!store.check_consistency());
    }

    #[test]
    fn search_combines_filters_newest_first() {
        let now = Utc::now();
        let mut store = LongTermStore::new(10);
        store.add(rec("old").with_tags(["a"]).with_created_at(now - Duration::days(10)));
        store.add(rec("mid").with_tags(["b"]).with_created_at(now - Duration::days(5)));
        store.add(
            rec("new")
                .with_tags(["a"])
                .with_created_at(now - Duration::days(1))
                .with_relevance(0.3),
        );
        store.add(
            rec("gone")
                .with_tags(["a"])
                .with_created_at(now)
                .with_expires_at(now - Duration::seconds(1)),
        );

        let all = store.search(&LongTermQuery::default());
        assert_eq!(ids(&all), vec!["new", "mid", "old"]);

        let tagged = store.search(&LongTermQuery {
            tags: vec!["a".into(), "b".into()],
            ..Default::default()
        });
        assert_eq!(ids(&tagged), vec!["new", "mid", "old"]);

        let relevant = store.search(&LongTermQuery {
            tags: vec!["a".into()],
            min_relevance: Some(0.5),
            ..Default::default()
        });
        assert_eq!(ids(&relevant), vec!["old"]);

        let window = store.search(&LongTermQuery {
            start: Some(now - Duration::days(6)),
            end: Some(now - Duration::days(2)),
            ..Default::default()
        });
        assert_eq!(ids(&window), vec!["mid"]);

        let limited = store.search(&LongTermQuery {
            limit: Some(1),
            ..Default::default()
        });
        assert_eq!(ids(&limited), vec!["new"]);
    }

    #[test]
    fn oldest_and_newest_break_ties_by_id() {
        let t = Utc::now() - Duration::days(1);
        let mut store = LongTermStore::new(10);
        for id in ["c", "a", "b"] {
            store.add(rec(id).with_created_at(t));
        }
        store.add(rec("z").with_created_at(t + Duration::hours(1)));

        assert_eq!(ids(&store.oldest(2)), vec!["a", "b"]);
        assert_eq!(ids(&store.newest(3)), vec!["z", "a", "b"]);
        assert_eq!(ids(&store.newest(10)), vec!["z", "a", "b", "c"]);
    }

    #[test]
    fn get_counts_accesses_and_hides_expired() {
        let mut store = LongTermStore::new(10);
        store.add(rec("a"));
        store.add(rec("x").with_expires_at(Utc::now() - Duration::seconds(1)));
        store.get("a");
        assert_eq!(store.get("a").map(|r| r.access_count), Some(2));
        assert!(store.get("x").is_none());
        assert_eq!(store.remove_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn check_consistency_rebuilds_drifted_indices() {
        let mut store = LongTermStore::new(10);
        store.add(rec("a").with_tags(["t"]));
        store.tag_index.clear();
        store.time_index.clear();
        assert!(store.check_consistency());
        assert_eq!(store.by_tag("t").len(), 1);
        assert!(!store.check_consistency());
    }

    #[test]
    fn stats_count_tags() {
        let mut store = LongTermStore::new(4);
        store.add(rec("a").with_tags(["x", "y"]));
        store.add(rec("b").with_tags(["y"]));
        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.total_tags, Some(2));
        assert_eq!(stats.utilization, 0.5);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8, Vec<u8>),
        Update(u8, Vec<u8>),
        Remove(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        let tags = prop::collection::vec(0u8..5, 0..4);
        prop_oneof![
            3 => (0u8..10, tags.clone()).prop_map(|(id, t)| Op::Add(id, t)),
            2 => (0u8..10, tags).prop_map(|(id, t)| Op::Update(id, t)),
            1 => (0u8..10).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn indices_stay_consistent(capacity in 1usize..8, ops in prop::collection::vec(op(), 0..50)) {
            let mut store = LongTermStore::new(capacity);
            for op in ops {
                match op {
                    Op::Add(id, tags) => {
                        let before = store.len();
                        let id = format!("m{id}");
                        let existed = store.contains(&id);
                        let added = store.add(rec(&id).with_tags(tags.iter().map(|t| format!("t{t}"))));
                        if !existed && before >= capacity {
                            prop_assert!(!added);
                            prop_assert_eq!(store.len(), before);
                        } else {
                            prop_assert!(added);
                        }
                    }
                    Op::Update(id, tags) => {
                        let id = format!("m{id}");
                        let existed = store.contains(&id);
                        let updated = store.update(rec(&id).with_tags(tags.iter().map(|t| format!("t{t}"))));
                        prop_assert_eq!(updated, existed);
                    }
                    Op::Remove(id) => {
                        store.remove(&format!("m{id}"));
                    }
                }
                prop_assert!(store.len() <= capacity);
                prop_assert!(!store.check_consistency());
                for ids in store.tag_index.values() {
                    prop_assert!(!ids.is_empty());
                }
            }
        }
    }
}
