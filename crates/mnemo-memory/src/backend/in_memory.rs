// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local backend, mainly for tests and embedding hosts.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use mnemo_core::traits::{PersistenceBackend, PluginAdapter};
use mnemo_core::types::AdapterType;
use mnemo_core::vector::cosine_similarity;
use mnemo_core::{MemoryRecord, MnemoError};

#[derive(Default)]
pub struct InMemoryBackend {
    records: RwLock<HashMap<String, MemoryRecord>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginAdapter for InMemoryBackend {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Backend
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    async fn store_memory(&self, record: &MemoryRecord) -> Result<bool, MnemoError> {
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(true)
    }

    async fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>, MnemoError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn update_memory(&self, record: &MemoryRecord) -> Result<bool, MnemoError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_memory(&self, id: &str) -> Result<bool, MnemoError> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn search_memories(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<MemoryRecord>, MnemoError> {
        let records = self.records.read().await;
        let mut scored: Vec<(f32, &MemoryRecord)> = records
            .values()
            .filter_map(|r| {
                let sim = cosine_similarity(query, r.embedding.as_deref()?);
                (sim >= min_similarity).then_some((sim, r))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn clear(&self) -> Result<(), MnemoError> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize, MnemoError> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use mnemo_test_utils::fixtures::{embedded, long_term, unit_at};

    use super::*;

    #[tokio::test]
    async fn crud_round_trip() {
        let backend = InMemoryBackend::new();
        let record = long_term("a", "hello");
        assert!(backend.store_memory(&record).await.unwrap());
        assert_eq!(backend.get_memory("a").await.unwrap(), Some(record.clone()));

        let mut changed = record.clone();
        changed.content = "bye".into();
        assert!(backend.update_memory(&changed).await.unwrap());
        assert!(!backend.update_memory(&long_term("zz", "x")).await.unwrap());

        assert!(backend.delete_memory("a").await.unwrap());
        assert!(!backend.delete_memory("a").await.unwrap());
        assert_eq!(backend.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_is_thresholded_and_ordered() {
        let backend = InMemoryBackend::new();
        for (id, sim) in [("lo", 0.3), ("hi", 0.95), ("mid", 0.7)] {
            backend.store_memory(&embedded(id, unit_at(sim))).await.unwrap();
        }
        backend.store_memory(&long_term("plain", "no vector")).await.unwrap();

        let hits = backend.search_memories(&[1.0, 0.0], 10, 0.5).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["hi", "mid"]);

        let top = backend.search_memories(&[1.0, 0.0], 1, 0.0).await.unwrap();
        assert_eq!(top[0].id, "hi");

        backend.clear().await.unwrap();
        assert_eq!(backend.count().await.unwrap(), 0);
    }
}
