// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded short-term store with O(1) oldest-write eviction.
//!
//! Records live in an arena of slots. Each occupied slot is threaded onto two
//! intrusive doubly-linked lists:
//!
//! - the **write order**, touched by `add` and `update`, which decides eviction
//! - the **access order**, additionally touched by successful `get`, which
//!   backs `oldest`, `newest`, and the most-recent-first `search`
//!
//! Reads therefore never protect a record from eviction. Slot keys carry a
//! generation so a stale id-map entry is detected instead of aliasing a
//! reused slot.

use std::collections::HashMap;

use chrono::Utc;
use mnemo_core::{MemoryKind, MemoryRecord};
use tracing::{debug, error, info, warn};

use crate::stats::StoreStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotKey {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Default)]
struct List {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

#[derive(Debug, Clone, Copy)]
enum Order {
    Write = 0,
    Access = 1,
}

#[derive(Debug)]
struct Node {
    record: MemoryRecord,
    links: [Links; 2],
}

#[derive(Debug)]
enum Slot {
    Occupied { generation: u32, node: Node },
    Vacant { generation: u32, next_free: Option<usize> },
}

/// Recency-ordered cache of fresh records.
#[derive(Debug)]
pub struct ShortTermStore {
    capacity: usize,
    slots: Vec<Slot>,
    free_head: Option<usize>,
    ids: HashMap<String, SlotKey>,
    lists: [List; 2],
    evictions: u64,
}

impl ShortTermStore {
    /// Creates an empty store holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::new(),
            free_head: None,
            ids: HashMap::new(),
            lists: [List::default(), List::default()],
            evictions: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Physical record count, expired records included.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Records evicted for capacity since creation.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Insert or replace a record as the most recent write.
    ///
    /// Evicts the oldest writes while over capacity. Returns false only for
    /// a record that fails schema validation.
    pub fn add(&mut self, mut record: MemoryRecord) -> bool {
        if let Err(err) = record.validate() {
            warn!(memory_id = %record.id, error = %err, "short-term store refused invalid record");
            return false;
        }
        record.kind = MemoryKind::ShortTerm;

        if let Some(index) = self.resolve(&record.id) {
            if let Some(node) = self.node_mut(index) {
                node.record = record;
            }
            self.move_to_back(index, Order::Write);
            self.move_to_back(index, Order::Access);
        } else {
            let id = record.id.clone();
            let key = self.alloc(record);
            self.push_back(key.index, Order::Write);
            self.push_back(key.index, Order::Access);
            self.ids.insert(id, key);
        }

        let mut evicted = 0;
        while self.ids.len() > self.capacity {
            let Some(oldest) = self.lists[Order::Write as usize].head else {
                break;
            };
            if let Some(record) = self.release(oldest) {
                debug!(memory_id = %record.id, "evicted oldest short-term record");
                evicted += 1;
            }
        }
        if evicted > 0 {
            self.evictions += evicted;
            info!(evicted, capacity = self.capacity, "short-term store over capacity");
        }
        true
    }

    /// Fetch a live record, bumping its access bookkeeping and access order.
    ///
    /// Expired records are reported as absent but not purged.
    pub fn get(&mut self, id: &str) -> Option<MemoryRecord> {
        let index = self.resolve(id)?;
        let now = Utc::now();
        let node = self.node_mut(index)?;
        if node.record.is_expired_at(now) {
            return None;
        }
        node.record.record_access(now);
        let record = node.record.clone();
        self.move_to_back(index, Order::Access);
        Some(record)
    }

    /// Borrow a record without bookkeeping. Expired records are returned too.
    pub fn peek(&self, id: &str) -> Option<&MemoryRecord> {
        let key = self.ids.get(id)?;
        match self.slots.get(key.index) {
            Some(Slot::Occupied { generation, node }) if *generation == key.generation => {
                Some(&node.record)
            }
            _ => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.peek(id).is_some()
    }

    /// Remove a record unconditionally.
    pub fn remove(&mut self, id: &str) -> Option<MemoryRecord> {
        let index = self.resolve(id)?;
        self.release(index)
    }

    /// Replace an existing record, counting as a fresh write.
    ///
    /// Returns false if the id is unknown.
    pub fn update(&mut self, mut record: MemoryRecord) -> bool {
        let Some(index) = self.resolve(&record.id) else {
            return false;
        };
        record.kind = MemoryKind::ShortTerm;
        if let Some(node) = self.node_mut(index) {
            node.record = record;
        }
        self.move_to_back(index, Order::Write);
        self.move_to_back(index, Order::Access);
        true
    }

    /// Live records, most recently touched first. Lazy and restartable.
    pub fn iter_recent(&self) -> impl Iterator<Item = &MemoryRecord> + '_ {
        let now = Utc::now();
        self.iter_order(Order::Access, false)
            .filter(move |r| !r.is_expired_at(now))
    }

    /// Live records matching any of `tags` (all when empty) with relevance at
    /// least `min_relevance`, most recent first.
    pub fn search(
        &self,
        tags: &[String],
        min_relevance: Option<f64>,
        limit: Option<usize>,
    ) -> Vec<MemoryRecord> {
        self.iter_recent()
            .filter(|r| tags.is_empty() || r.has_any_tag(tags))
            .filter(|r| min_relevance.is_none_or(|min| r.relevance_score >= min))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Up to `n` live records, least recently touched first.
    pub fn oldest(&self, n: usize) -> Vec<MemoryRecord> {
        let now = Utc::now();
        self.iter_order(Order::Access, true)
            .filter(|r| !r.is_expired_at(now))
            .take(n)
            .cloned()
            .collect()
    }

    /// Up to `n` live records, most recently touched first.
    pub fn newest(&self, n: usize) -> Vec<MemoryRecord> {
        self.iter_recent().take(n).cloned().collect()
    }

    /// Ids in eviction order, next victim first.
    pub fn write_order(&self) -> Vec<String> {
        self.iter_order(Order::Write, true)
            .map(|r| r.id.clone())
            .collect()
    }

    /// Every stored record, expired ones included, in write order.
    pub fn all_records(&self) -> Vec<MemoryRecord> {
        self.iter_order(Order::Write, true).cloned().collect()
    }

    /// Delete every expired record. Returns how many were removed.
    pub fn remove_expired(&mut self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .iter_order(Order::Write, true)
            .filter(|r| r.is_expired_at(now))
            .map(|r| r.id.clone())
            .collect();
        let removed = expired
            .iter()
            .filter(|id| self.remove(id).is_some())
            .count();
        if removed > 0 {
            info!(removed, "removed expired short-term records");
        }
        removed
    }

    /// Apply `f` to every stored record in place, expired ones included.
    ///
    /// Order is unaffected; this is bookkeeping, not a write.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut MemoryRecord)) {
        for slot in &mut self.slots {
            if let Slot::Occupied { node, .. } = slot {
                f(&mut node.record);
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.ids.clear();
        self.lists = [List::default(), List::default()];
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats::from_records(
            self.iter_order(Order::Write, true),
            self.capacity,
            Utc::now(),
        )
    }

    /// Check that the id map, the slots, and both lists agree.
    ///
    /// On mismatch the id map is rebuilt from the occupied slots and the
    /// number of repaired entries is returned.
    pub fn repair_index(&mut self) -> usize {
        let mut rebuilt = HashMap::with_capacity(self.ids.len());
        for (index, slot) in self.slots.iter().enumerate() {
            if let Slot::Occupied { generation, node } = slot {
                rebuilt.insert(
                    node.record.id.clone(),
                    SlotKey {
                        index,
                        generation: *generation,
                    },
                );
            }
        }
        let write_len = self.lists[Order::Write as usize].len;
        let access_len = self.lists[Order::Access as usize].len;
        if rebuilt == self.ids && write_len == rebuilt.len() && access_len == rebuilt.len() {
            return 0;
        }

        let repaired = rebuilt
            .iter()
            .filter(|(id, key)| self.ids.get(*id) != Some(key))
            .count()
            + self.ids.keys().filter(|id| !rebuilt.contains_key(*id)).count();
        error!(
            repaired,
            write_len, access_len, "short-term index out of sync with arena; rebuilding"
        );
        self.ids = rebuilt;
        if write_len != self.ids.len() || access_len != self.ids.len() {
            self.relink_all();
        }
        repaired.max(1)
    }

    // --- arena plumbing ---

    /// Look up a slot index for `id`, dropping a stale id-map entry.
    fn resolve(&mut self, id: &str) -> Option<usize> {
        let key = *self.ids.get(id)?;
        match self.slots.get(key.index) {
            Some(Slot::Occupied { generation, node })
                if *generation == key.generation && node.record.id == id =>
            {
                Some(key.index)
            }
            _ => {
                error!(memory_id = %id, "short-term id map points at a stale slot; dropping entry");
                self.ids.remove(id);
                None
            }
        }
    }

    fn alloc(&mut self, record: MemoryRecord) -> SlotKey {
        let node = Node {
            record,
            links: [Links::default(); 2],
        };
        let reusable = self.free_head.and_then(|index| match self.slots.get(index) {
            Some(Slot::Vacant {
                generation,
                next_free,
            }) => Some((index, *generation, *next_free)),
            _ => None,
        });
        if let Some((index, generation, next_free)) = reusable {
            self.free_head = next_free;
            self.slots[index] = Slot::Occupied { generation, node };
            return SlotKey { index, generation };
        }
        self.slots.push(Slot::Occupied {
            generation: 0,
            node,
        });
        SlotKey {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// Unlink and vacate a slot, returning its record.
    fn release(&mut self, index: usize) -> Option<MemoryRecord> {
        if !matches!(self.slots.get(index), Some(Slot::Occupied { .. })) {
            return None;
        }
        self.unlink(index, Order::Write);
        self.unlink(index, Order::Access);

        let generation = match &self.slots[index] {
            Slot::Occupied { generation, .. } => generation.wrapping_add(1),
            Slot::Vacant { generation, .. } => *generation,
        };
        let vacant = Slot::Vacant {
            generation,
            next_free: self.free_head,
        };
        let previous = std::mem::replace(&mut self.slots[index], vacant);
        self.free_head = Some(index);

        match previous {
            Slot::Occupied { node, .. } => {
                self.ids.remove(&node.record.id);
                Some(node.record)
            }
            Slot::Vacant { .. } => None,
        }
    }

    fn node(&self, index: usize) -> Option<&Node> {
        match self.slots.get(index) {
            Some(Slot::Occupied { node, .. }) => Some(node),
            _ => None,
        }
    }

    fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        match self.slots.get_mut(index) {
            Some(Slot::Occupied { node, .. }) => Some(node),
            _ => None,
        }
    }

    fn unlink(&mut self, index: usize, order: Order) {
        let o = order as usize;
        let Some(Links { prev, next }) = self.node(index).map(|n| n.links[o]) else {
            return;
        };
        let list = &self.lists[o];
        let linked = prev.is_some() || next.is_some() || list.head == Some(index);
        if !linked {
            return;
        }

        match prev {
            Some(p) => {
                if let Some(n) = self.node_mut(p) {
                    n.links[o].next = next;
                }
            }
            None => self.lists[o].head = next,
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.node_mut(nx) {
                    n.links[o].prev = prev;
                }
            }
            None => self.lists[o].tail = prev,
        }
        if let Some(n) = self.node_mut(index) {
            n.links[o] = Links::default();
        }
        self.lists[o].len -= 1;
    }

    fn push_back(&mut self, index: usize, order: Order) {
        let o = order as usize;
        let tail = self.lists[o].tail;
        if let Some(n) = self.node_mut(index) {
            n.links[o] = Links {
                prev: tail,
                next: None,
            };
        } else {
            return;
        }
        match tail {
            Some(t) => {
                if let Some(n) = self.node_mut(t) {
                    n.links[o].next = Some(index);
                }
            }
            None => self.lists[o].head = Some(index),
        }
        self.lists[o].tail = Some(index);
        self.lists[o].len += 1;
    }

    fn move_to_back(&mut self, index: usize, order: Order) {
        if self.lists[order as usize].tail == Some(index) {
            return;
        }
        self.unlink(index, order);
        self.push_back(index, order);
    }

    /// Rebuild both lists from the slots, ordered by `updated_at` then
    /// `last_accessed_at`.
    fn relink_all(&mut self) {
        let mut occupied: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.node(i).is_some())
            .collect();
        for &index in &occupied {
            if let Some(n) = self.node_mut(index) {
                n.links = [Links::default(); 2];
            }
        }
        self.lists = [List::default(), List::default()];

        occupied.sort_by_key(|&i| self.node(i).map(|n| (n.record.updated_at, i)));
        for &index in &occupied {
            self.push_back(index, Order::Write);
        }
        occupied.sort_by_key(|&i| self.node(i).map(|n| (n.record.last_accessed_at, i)));
        for &index in &occupied {
            self.push_back(index, Order::Access);
        }
    }

    fn iter_order(&self, order: Order, oldest_first: bool) -> OrderIter<'_> {
        let list = &self.lists[order as usize];
        OrderIter {
            store: self,
            cursor: if oldest_first { list.head } else { list.tail },
            order,
            oldest_first,
        }
    }
}

struct OrderIter<'a> {
    store: &'a ShortTermStore,
    cursor: Option<usize>,
    order: Order,
    oldest_first: bool,
}

impl<'a> Iterator for OrderIter<'a> {
    type Item = &'a MemoryRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.store.node(self.cursor?)?;
        let links = node.links[self.order as usize];
        self.cursor = if self.oldest_first {
            links.next
        } else {
            links.prev
        };
        Some(&node.record)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use proptest::prelude::*;

    use super::*;

    fn rec(id: &str) -> MemoryRecord {
        MemoryRecord::new(id, format!("content of {id}"), MemoryKind::ShortTerm)
    }

    fn ids(records: &[MemoryRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn fourth_add_evicts_first() {
        let mut store = ShortTermStore::new(3);
        for id in ["A", "B", "C", "D"] {
            assert!(store.add(rec(id)));
        }
        assert_eq!(store.len(), 3);
        assert!(!store.contains("A"));
        assert_eq!(store.write_order(), vec!["B", "C", "D"]);
        assert_eq!(store.evictions(), 1);
    }

    #[test]
    fn re_adding_an_id_replaces_and_refreshes() {
        let mut store = ShortTermStore::new(3);
        for id in ["A", "B", "C"] {
            store.add(rec(id));
        }
        store.add(MemoryRecord::new("A", "new text", MemoryKind::ShortTerm));
        assert_eq!(store.len(), 3);
        assert_eq!(store.write_order(), vec!["B", "C", "A"]);
        assert_eq!(store.peek("A").map(|r| r.content.as_str()), Some("new text"));

        store.add(rec("D"));
        assert!(!store.contains("B"), "B is now the oldest write");
    }

    #[test]
    fn reads_do_not_protect_from_eviction_but_reorder_access() {
        let mut store = ShortTermStore::new(3);
        for id in ["A", "B", "C"] {
            store.add(rec(id));
        }
        let got = store.get("A").expect("A is live");
        assert_eq!(got.access_count, 1);
        assert_eq!(ids(&store.oldest(1)), vec!["B"]);
        assert_eq!(ids(&store.newest(1)), vec!["A"]);

        store.add(rec("D"));
        assert!(!store.contains("A"));
    }

    #[test]
    fn add_forces_short_term_kind() {
        let mut store = ShortTermStore::new(2);
        store.add(MemoryRecord::new("x", "y", MemoryKind::LongTerm));
        assert_eq!(store.peek("x").map(|r| r.kind), Some(MemoryKind::ShortTerm));
    }

    #[test]
    fn invalid_record_is_refused() {
        let mut store = ShortTermStore::new(2);
        let mut bad = rec("x");
        bad.relevance_score = 3.0;
        assert!(!store.add(bad));
        assert!(store.is_empty());
    }

    #[test]
    fn expired_records_hidden_until_cleanup() {
        let mut store = ShortTermStore::new(5);
        store.add(rec("live"));
        store.add(rec("old").with_expires_at(Utc::now() - Duration::seconds(1)));

        assert!(store.get("old").is_none());
        assert_eq!(store.len(), 2, "failed read must not purge");
        assert_eq!(ids(&store.search(&[], None, None)), vec!["live"]);

        assert_eq!(store.remove_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.remove_expired(), 0);
    }

    #[test]
    fn update_requires_existing_id() {
        let mut store = ShortTermStore::new(3);
        assert!(!store.update(rec("ghost")));
        store.add(rec("A"));
        store.add(rec("B"));
        let mut changed = rec("A");
        changed.content = "edited".into();
        assert!(store.update(changed));
        assert_eq!(store.write_order(), vec!["B", "A"]);
        assert_eq!(store.peek("A").map(|r| r.content.as_str()), Some("edited"));
    }

    #[test]
    fn remove_reports_absence() {
        let mut store = ShortTermStore::new(3);
        store.add(rec("A"));
        assert!(store.remove("A").is_some());
        assert!(store.remove("A").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn search_filters_and_orders_most_recent_first() {
        let mut store = ShortTermStore::new(10);
        store.add(rec("a").with_tags(["work"]));
        store.add(rec("b").with_tags(["home"]).with_relevance(0.2));
        store.add(rec("c").with_tags(["work", "urgent"]));
        store.add(rec("d"));

        let work = store.search(&["work".to_string()], None, None);
        assert_eq!(ids(&work), vec!["c", "a"]);

        let either = store.search(&["home".to_string(), "urgent".to_string()], None, None);
        assert_eq!(ids(&either), vec!["c", "b"]);

        let relevant = store.search(&[], Some(0.5), Some(2));
        assert_eq!(ids(&relevant), vec!["d", "c"]);

        // restartable: same answer twice
        assert_eq!(store.search(&[], None, None), store.search(&[], None, None));
    }

    #[test]
    fn slots_are_reused_with_new_generation() {
        let mut store = ShortTermStore::new(2);
        store.add(rec("A"));
        store.remove("A");
        store.add(rec("B"));
        assert_eq!(store.slots.len(), 1, "vacant slot reused");
        match &store.slots[0] {
            Slot::Occupied { generation, .. } => assert_eq!(*generation, 1),
            Slot::Vacant { .. } => panic!("slot should be occupied"),
        }
    }

    #[test]
    fn stale_id_entry_is_dropped() {
        let mut store = ShortTermStore::new(3);
        store.add(rec("A"));
        store.ids.insert(
            "ghost".to_string(),
            SlotKey {
                index: 0,
                generation: 7,
            },
        );
        assert!(store.get("ghost").is_none());
        assert!(!store.ids.contains_key("ghost"));
        assert_eq!(store.repair_index(), 0);
    }

    #[test]
    fn repair_index_rebuilds_missing_entries() {
        let mut store = ShortTermStore::new(3);
        store.add(rec("A"));
        store.add(rec("B"));
        store.ids.remove("B");
        assert!(store.repair_index() >= 1);
        assert!(store.contains("B"));
        assert_eq!(store.write_order(), vec!["A", "B"]);
    }

    #[test]
    fn clear_empties_everything() {
        let mut store = ShortTermStore::new(3);
        store.add(rec("A"));
        store.clear();
        assert!(store.is_empty());
        assert!(store.write_order().is_empty());
        store.add(rec("B"));
        assert_eq!(store.write_order(), vec!["B"]);
    }

    #[test]
    fn stats_reflect_contents() {
        let mut store = ShortTermStore::new(4);
        store.add(rec("A"));
        store.add(rec("B").with_expires_at(Utc::now() - Duration::seconds(5)));
        let stats = store.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.expired_count, 1);
        assert_eq!(stats.utilization, 0.5);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        Update(u8),
        Get(u8),
        Remove(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0u8..12).prop_map(Op::Add),
            1 => (0u8..12).prop_map(Op::Update),
            2 => (0u8..12).prop_map(Op::Get),
            1 => (0u8..12).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn capacity_bound_and_survivors(capacity in 1usize..6, ops in prop::collection::vec(op(), 0..60)) {
            let mut store = ShortTermStore::new(capacity);
            // model: write order, oldest first
            let mut model: Vec<String> = Vec::new();

            for op in ops {
                match op {
                    Op::Add(n) => {
                        let id = format!("m{n}");
                        store.add(rec(&id));
                        model.retain(|m| *m != id);
                        model.push(id);
                        while model.len() > capacity {
                            model.remove(0);
                        }
                    }
                    Op::Update(n) => {
                        let id = format!("m{n}");
                        let updated = store.update(rec(&id));
                        prop_assert_eq!(updated, model.contains(&id));
                        if updated {
                            model.retain(|m| *m != id);
                            model.push(id);
                        }
                    }
                    Op::Get(n) => {
                        let id = format!("m{n}");
                        prop_assert_eq!(store.get(&id).is_some(), model.contains(&id));
                    }
                    Op::Remove(n) => {
                        let id = format!("m{n}");
                        prop_assert_eq!(store.remove(&id).is_some(), model.contains(&id));
                        model.retain(|m| *m != id);
                    }
                }
                prop_assert!(store.len() <= capacity);
                prop_assert_eq!(store.write_order(), model.clone());
            }
            prop_assert_eq!(store.repair_index(), 0);
        }
    }
}
