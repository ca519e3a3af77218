// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence backend trait.

use async_trait::async_trait;

use crate::error::MnemoError;
use crate::record::MemoryRecord;
use crate::traits::adapter::PluginAdapter;

/// External store that mirrors records written through the manager.
///
/// A backend is an extra candidate source and sink next to the in-process
/// stores. It never replaces their tag and time indices. Absence is reported
/// through `Option`/`bool`, not errors.
#[async_trait]
pub trait PersistenceBackend: PluginAdapter {
    /// Insert or replace a record. Returns whether it was written.
    async fn store_memory(&self, record: &MemoryRecord) -> Result<bool, MnemoError>;

    /// Fetch a record by id.
    async fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>, MnemoError>;

    /// Replace an existing record. Returns false if the id is unknown.
    async fn update_memory(&self, record: &MemoryRecord) -> Result<bool, MnemoError>;

    /// Delete a record. Returns false if the id is unknown.
    async fn delete_memory(&self, id: &str) -> Result<bool, MnemoError>;

    /// Records whose embedding scores at least `min_similarity` against
    /// `query`, best first, at most `limit`.
    async fn search_memories(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<MemoryRecord>, MnemoError>;

    /// Remove every record.
    async fn clear(&self) -> Result<(), MnemoError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, MnemoError>;
}
