// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Forgetting policy.
//!
//! Everything here is a pure function over record slices: it selects or
//! scores records and never deletes anything. The manager applies the
//! results to the stores.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use mnemo_core::vector::cosine_similarity;
use mnemo_core::{ForgetCriteria, MemoryKind, MemoryRecord};
use tracing::{debug, warn};

/// Whether `record` satisfies every populated field of `criteria`.
pub fn should_forget(record: &MemoryRecord, criteria: &ForgetCriteria) -> bool {
    should_forget_at(record, criteria, Utc::now())
}

/// [`should_forget`] evaluated at a fixed instant.
pub fn should_forget_at(
    record: &MemoryRecord,
    criteria: &ForgetCriteria,
    now: DateTime<Utc>,
) -> bool {
    if let Some(days) = criteria.older_than_days {
        // A cutoff before the earliest representable instant matches nothing.
        match now.checked_sub_signed(Duration::days(i64::from(days))) {
            Some(cutoff) if record.created_at <= cutoff => {}
            _ => return false,
        }
    }
    if let Some(threshold) = criteria.relevance_threshold {
        if record.relevance_score >= threshold {
            return false;
        }
    }
    if let Some(max) = criteria.max_access_count {
        if record.access_count > max {
            return false;
        }
    }
    if criteria.kind.is_some_and(|kind| kind != record.kind) {
        return false;
    }
    if !criteria.tags.is_empty() && !record.has_any_tag(&criteria.tags) {
        return false;
    }
    if criteria.priority.is_some_and(|p| p != record.priority) {
        return false;
    }
    true
}

/// Records matching `criteria`, in input order.
///
/// An unconstrained criteria matches everything; that is logged because it
/// is rarely what a caller intends.
pub fn filter_memories<'a>(
    records: &'a [MemoryRecord],
    criteria: &ForgetCriteria,
) -> Vec<&'a MemoryRecord> {
    if criteria.is_unconstrained() {
        warn!(
            count = records.len(),
            "forget criteria is unconstrained; every record matches"
        );
    }
    let now = Utc::now();
    records
        .iter()
        .filter(|r| should_forget_at(r, criteria, now))
        .collect()
}

pub fn forget_expired(records: &[MemoryRecord]) -> Vec<&MemoryRecord> {
    let now = Utc::now();
    records.iter().filter(|r| r.is_expired_at(now)).collect()
}

/// Records below `threshold`, sparing the `preserve_count` least relevant.
///
/// Records are ranked ascending by relevance (ties by id), the first
/// `preserve_count` are skipped, and the rest are returned if below
/// `threshold`.
pub fn forget_low_relevance(
    records: &[MemoryRecord],
    threshold: f64,
    preserve_count: usize,
) -> Vec<&MemoryRecord> {
    let mut ranked: Vec<&MemoryRecord> = records.iter().collect();
    ranked.sort_by(|a, b| by_relevance(a, b));
    ranked
        .into_iter()
        .skip(preserve_count)
        .filter(|r| r.relevance_score < threshold)
        .collect()
}

/// Records created at least `days` ago, optionally restricted to one kind.
pub fn forget_old(
    records: &[MemoryRecord],
    days: u32,
    kind: Option<MemoryKind>,
) -> Vec<&MemoryRecord> {
    let criteria = ForgetCriteria {
        older_than_days: Some(days),
        kind,
        ..Default::default()
    };
    let now = Utc::now();
    records
        .iter()
        .filter(|r| should_forget_at(r, &criteria, now))
        .collect()
}

/// Exactly the `count` least-accessed records (ties by id).
pub fn forget_least_accessed(records: &[MemoryRecord], count: usize) -> Vec<&MemoryRecord> {
    let mut ranked: Vec<&MemoryRecord> = records.iter().collect();
    ranked.sort_by(|a, b| a.access_count.cmp(&b.access_count).then_with(|| a.id.cmp(&b.id)));
    ranked.truncate(count);
    ranked
}

/// Records for which `policy` returns true, in input order.
pub fn forget_by_policy<F>(records: &[MemoryRecord], policy: F) -> Vec<&MemoryRecord>
where
    F: Fn(&MemoryRecord) -> bool,
{
    records.iter().filter(|r| policy(*r)).collect()
}

/// `max(old · (1 − rate)^days, min)` with `days` in whole days since creation.
pub fn decay_relevance(record: &MemoryRecord, rate: f64, min: f64, now: DateTime<Utc>) -> f64 {
    let days = record.age_days(now);
    let exponent = i32::try_from(days).unwrap_or(i32::MAX);
    let decayed = record.relevance_score * (1.0 - rate).powi(exponent);
    decayed.max(min).clamp(0.0, 1.0)
}

/// Ids that would be dropped by merging near-duplicate records.
///
/// Only embedded records take part. Candidates are visited in id order;
/// each unassigned record starts a group that absorbs every later unassigned
/// record with cosine similarity `>= threshold` to it. Each group of two or
/// more keeps its newest-created member (ties: smallest id) and the others
/// are returned, in id order.
pub fn consolidate_similar(records: &[MemoryRecord], threshold: f32) -> Vec<String> {
    let mut candidates: Vec<&MemoryRecord> = records.iter().filter(|r| r.is_scored()).collect();
    candidates.sort_by(|a, b| a.id.cmp(&b.id));

    let mut assigned = vec![false; candidates.len()];
    let mut drop: Vec<String> = Vec::new();

    for i in 0..candidates.len() {
        if assigned[i] {
            continue;
        }
        assigned[i] = true;
        let Some(seed) = candidates[i].embedding.as_deref() else {
            continue;
        };

        let mut group = vec![candidates[i]];
        for j in (i + 1)..candidates.len() {
            if assigned[j] {
                continue;
            }
            let other = candidates[j].embedding.as_deref().unwrap_or_default();
            if cosine_similarity(seed, other) >= threshold {
                assigned[j] = true;
                group.push(candidates[j]);
            }
        }
        if group.len() < 2 {
            continue;
        }

        let keep = group
            .iter()
            .copied()
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| b.id.cmp(&a.id))
            })
            .map(|r| r.id.clone());
        debug!(group = group.len(), keep = ?keep, "consolidation group");
        drop.extend(
            group
                .iter()
                .filter(|r| Some(&r.id) != keep.as_ref())
                .map(|r| r.id.clone()),
        );
    }

    drop.sort();
    drop
}

fn by_relevance(a: &MemoryRecord, b: &MemoryRecord) -> Ordering {
    a.relevance_score
        .partial_cmp(&b.relevance_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use mnemo_core::Priority;
    use proptest::prelude::*;

    use super::*;

    fn rec(id: &str) -> MemoryRecord {
        MemoryRecord::new(id, id, MemoryKind::LongTerm)
    }

    fn ids(records: &[&MemoryRecord]) -> Vec<String> {
        records.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn low_relevance_spares_preserve_count() {
        let records: Vec<MemoryRecord> = [0.1, 0.2, 0.25, 0.5, 0.9]
            .iter()
            .enumerate()
            .map(|(i, s)| rec(&format!("r{i}")).with_relevance(*s))
            .collect();
        let out = forget_low_relevance(&records, 0.3, 2);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].relevance_score, 0.25);
    }

    #[test]
    fn criteria_fields_combine_with_and() {
        let now = Utc::now();
        let old_low = rec("a")
            .with_created_at(now - Duration::days(40))
            .with_relevance(0.1)
            .with_tags(["chat"]);
        let old_high = rec("b")
            .with_created_at(now - Duration::days(40))
            .with_relevance(0.9)
            .with_tags(["chat"]);
        let new_low = rec("c").with_relevance(0.1).with_tags(["chat"]);

        let criteria = ForgetCriteria::new()
            .with_older_than_days(30)
            .with_relevance_threshold(0.5)
            .with_tags(["chat", "misc"]);
        assert!(should_forget_at(&old_low, &criteria, now));
        assert!(!should_forget_at(&old_high, &criteria, now));
        assert!(!should_forget_at(&new_low, &criteria, now));
    }

    #[test]
    fn older_than_is_inclusive_at_boundary() {
        let now = Utc::now();
        let exact = rec("a").with_created_at(now - Duration::days(3));
        let criteria = ForgetCriteria::new().with_older_than_days(3);
        assert!(should_forget_at(&exact, &criteria, now));
    }

    #[test]
    fn age_beyond_calendar_range_matches_nothing() {
        let ancient = rec("a").with_created_at(DateTime::<Utc>::MIN_UTC);
        let criteria = ForgetCriteria::new().with_older_than_days(u32::MAX);
        assert!(!should_forget(&ancient, &criteria));
        assert!(filter_memories(&[ancient], &criteria).is_empty());
    }

    #[test]
    fn access_count_is_an_upper_bound() {
        let mut seldom = rec("a");
        seldom.access_count = 2;
        let mut often = rec("b");
        often.access_count = 3;
        let criteria = ForgetCriteria::new().with_max_access_count(2);
        assert!(should_forget(&seldom, &criteria));
        assert!(!should_forget(&often, &criteria));
    }

    #[test]
    fn kind_and_priority_filters() {
        let r = rec("a").with_priority(Priority::Low);
        assert!(should_forget(&r, &ForgetCriteria::new().with_kind(MemoryKind::LongTerm)));
        assert!(!should_forget(&r, &ForgetCriteria::new().with_kind(MemoryKind::ShortTerm)));
        assert!(should_forget(&r, &ForgetCriteria::new().with_priority(Priority::Low)));
        assert!(!should_forget(&r, &ForgetCriteria::new().with_priority(Priority::High)));
    }

    #[test]
    #[tracing_test::traced_test]
    fn unconstrained_criteria_matches_all_and_warns() {
        let records = vec![rec("a"), rec("b")];
        let out = filter_memories(&records, &ForgetCriteria::default());
        assert_eq!(ids(&out), vec!["a", "b"]);
        assert!(logs_contain("unconstrained"));
    }

    #[test]
    fn least_accessed_returns_exact_count() {
        let mut records: Vec<MemoryRecord> = (0..5).map(|i| rec(&format!("r{i}"))).collect();
        for (i, r) in records.iter_mut().enumerate() {
            r.access_count = (5 - i) as u64;
        }
        assert_eq!(ids(&forget_least_accessed(&records, 2)), vec!["r4", "r3"]);
        assert_eq!(forget_least_accessed(&records, 10).len(), 5);
    }

    #[test]
    fn old_and_expired_selection() {
        let now = Utc::now();
        let records = vec![
            rec("old").with_created_at(now - Duration::days(10)),
            rec("young"),
            rec("gone").with_expires_at(now - Duration::seconds(1)),
        ];
        assert_eq!(ids(&forget_old(&records, 7, None)), vec!["old"]);
        assert!(forget_old(&records, 7, Some(MemoryKind::ShortTerm)).is_empty());
        assert_eq!(ids(&forget_expired(&records)), vec!["gone"]);
        assert_eq!(
            ids(&forget_by_policy(&records, |r| r.id.starts_with('y'))),
            vec!["young"]
        );
    }

    #[test]
    fn decay_uses_whole_days_and_floor() {
        let now = Utc::now();
        let r = rec("a")
            .with_created_at(now - Duration::days(2) - Duration::hours(20))
            .with_relevance(1.0);
        let decayed = decay_relevance(&r, 0.5, 0.0, now);
        assert!((decayed - 0.25).abs() < 1e-9);
        assert_eq!(decay_relevance(&r, 0.5, 0.4, now), 0.4);

        let fresh = rec("b").with_relevance(0.8);
        assert_eq!(decay_relevance(&fresh, 0.5, 0.0, now), 0.8);
    }

    #[test]
    fn consolidation_keeps_newest_of_each_group() {
        let now = Utc::now();
        let records = vec![
            rec("a")
                .with_embedding(vec![1.0, 0.0])
                .with_created_at(now - Duration::days(3)),
            rec("b")
                .with_embedding(vec![0.99, 0.01])
                .with_created_at(now - Duration::days(1)),
            rec("c")
                .with_embedding(vec![0.0, 1.0])
                .with_created_at(now - Duration::days(2)),
            rec("d"),
        ];
        assert_eq!(consolidate_similar(&records, 0.95), vec!["a"]);
        assert!(consolidate_similar(&records, 1.01).is_empty());
    }

    #[test]
    fn consolidation_ties_keep_smallest_id() {
        let t = Utc::now();
        let records = vec![
            rec("y").with_embedding(vec![1.0]).with_created_at(t),
            rec("x").with_embedding(vec![1.0]).with_created_at(t),
        ];
        assert_eq!(consolidate_similar(&records, 0.9), vec!["y"]);
    }

    proptest! {
        #[test]
        fn forgetting_is_idempotent(scores in prop::collection::vec(0.0f64..1.0, 0..20), threshold in 0.0f64..1.0) {
            let records: Vec<MemoryRecord> = scores
                .iter()
                .enumerate()
                .map(|(i, s)| rec(&format!("r{i:02}")).with_relevance(*s))
                .collect();
            let criteria = ForgetCriteria::new().with_relevance_threshold(threshold);
            let doomed: Vec<String> = ids(&filter_memories(&records, &criteria));
            let survivors: Vec<MemoryRecord> = records
                .into_iter()
                .filter(|r| !doomed.contains(&r.id))
                .collect();
            prop_assert!(filter_memories(&survivors, &criteria).is_empty());
        }

        #[test]
        fn consolidation_is_order_independent(seed in prop::collection::vec((0.0f32..1.0, 0.0f32..1.0), 1..10)) {
            let records: Vec<MemoryRecord> = seed
                .iter()
                .enumerate()
                .map(|(i, (x, y))| rec(&format!("r{i}")).with_embedding(vec![*x + 0.01, *y]))
                .collect();
            let mut reversed = records.clone();
            reversed.reverse();
            prop_assert_eq!(consolidate_similar(&records, 0.98), consolidate_similar(&reversed, 0.98));
        }
    }
}
