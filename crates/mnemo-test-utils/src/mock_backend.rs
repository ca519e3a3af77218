// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence backend doubles.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use mnemo_core::traits::{PersistenceBackend, PluginAdapter};
use mnemo_core::types::{AdapterType, HealthStatus};
use mnemo_core::{MemoryRecord, MnemoError};

/// Backend whose every call fails. Counts the attempted writes.
#[derive(Default)]
pub struct FailingBackend {
    writes: AtomicUsize,
}

impl FailingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempted_writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn down() -> MnemoError {
        MnemoError::storage(std::io::Error::other("backend unreachable"))
    }
}

#[async_trait]
impl PluginAdapter for FailingBackend {
    fn name(&self) -> &str {
        "failing-backend"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Backend
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemoError> {
        Err(Self::down())
    }
}

#[async_trait]
impl PersistenceBackend for FailingBackend {
    async fn store_memory(&self, _record: &MemoryRecord) -> Result<bool, MnemoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(Self::down())
    }

    async fn get_memory(&self, _id: &str) -> Result<Option<MemoryRecord>, MnemoError> {
        Err(Self::down())
    }

    async fn update_memory(&self, _record: &MemoryRecord) -> Result<bool, MnemoError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(Self::down())
    }

    async fn delete_memory(&self, _id: &str) -> Result<bool, MnemoError> {
        Err(Self::down())
    }

    async fn search_memories(
        &self,
        _query: &[f32],
        _limit: usize,
        _min_similarity: f32,
    ) -> Result<Vec<MemoryRecord>, MnemoError> {
        Err(Self::down())
    }

    async fn clear(&self) -> Result<(), MnemoError> {
        Err(Self::down())
    }

    async fn count(&self) -> Result<usize, MnemoError> {
        Err(Self::down())
    }
}
