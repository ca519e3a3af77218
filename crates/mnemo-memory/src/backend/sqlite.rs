// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed persistence with vector BLOB storage.
//!
//! One `memories` table holds every record. Embeddings are stored as
//! little-endian f32 BLOBs; tags and metadata as JSON text; timestamps as
//! RFC 3339 text. Similarity search is a linear scan over stored vectors.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use mnemo_core::traits::{PersistenceBackend, PluginAdapter};
use mnemo_core::types::{AdapterType, HealthStatus};
use mnemo_core::vector::cosine_similarity;
use mnemo_core::{MemoryRecord, MnemoError, SessionId};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY NOT NULL,
    content TEXT NOT NULL,
    kind TEXT NOT NULL,
    embedding BLOB,
    metadata TEXT NOT NULL DEFAULT '{}',
    tags TEXT NOT NULL DEFAULT '[]',
    priority TEXT NOT NULL DEFAULT 'medium',
    relevance_score REAL NOT NULL DEFAULT 1.0,
    access_count INTEGER NOT NULL DEFAULT 0,
    session_id TEXT,
    role TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_accessed_at TEXT NOT NULL,
    expires_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);
CREATE INDEX IF NOT EXISTS idx_memories_kind ON memories(kind);
";

const COLUMNS: &str = "id, content, kind, embedding, metadata, tags, priority, relevance_score, \
     access_count, session_id, role, created_at, updated_at, last_accessed_at, expires_at";

/// Maps a failed `Connection::call` into `MnemoError::Storage`.
fn storage_err(e: tokio_rusqlite::Error) -> MnemoError {
    MnemoError::storage(e)
}

/// Persistent backend over a single SQLite database.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MnemoError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let conn = Connection::open(&path).await.map_err(MnemoError::storage)?;
        let backend = Self { conn };
        backend.initialize().await?;
        info!(path = %path.display(), "opened sqlite memory backend");
        Ok(backend)
    }

    /// In-memory database, for tests.
    pub async fn open_in_memory() -> Result<Self, MnemoError> {
        let conn = Connection::open_in_memory().await.map_err(MnemoError::storage)?;
        let backend = Self { conn };
        backend.initialize().await?;
        Ok(backend)
    }

    async fn initialize(&self) -> Result<(), MnemoError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn upsert(&self, record: &MemoryRecord, require_existing: bool) -> Result<bool, MnemoError> {
        let row = RecordRow::from_record(record)?;
        let verb = if require_existing {
            "UPDATE memories SET content = ?2, kind = ?3, embedding = ?4, metadata = ?5, tags = ?6, \
             priority = ?7, relevance_score = ?8, access_count = ?9, session_id = ?10, role = ?11, \
             created_at = ?12, updated_at = ?13, last_accessed_at = ?14, expires_at = ?15 WHERE id = ?1"
        } else {
            "INSERT OR REPLACE INTO memories (id, content, kind, embedding, metadata, tags, priority, \
             relevance_score, access_count, session_id, role, created_at, updated_at, \
             last_accessed_at, expires_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, \
             ?12, ?13, ?14, ?15)"
        };
        let changed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    verb,
                    rusqlite::params![
                        row.id,
                        row.content,
                        row.kind,
                        row.embedding,
                        row.metadata,
                        row.tags,
                        row.priority,
                        row.relevance_score,
                        row.access_count,
                        row.session_id,
                        row.role,
                        row.created_at,
                        row.updated_at,
                        row.last_accessed_at,
                        row.expires_at,
                    ],
                )?;
                Ok(n)
            })
            .await
            .map_err(storage_err)?;
        Ok(changed > 0)
    }
}

/// Column values of one record, ready to bind.
struct RecordRow {
    id: String,
    content: String,
    kind: String,
    embedding: Option<Vec<u8>>,
    metadata: String,
    tags: String,
    priority: String,
    relevance_score: f64,
    access_count: i64,
    session_id: Option<String>,
    role: Option<String>,
    created_at: String,
    updated_at: String,
    last_accessed_at: String,
    expires_at: Option<String>,
}

impl RecordRow {
    fn from_record(record: &MemoryRecord) -> Result<Self, MnemoError> {
        let json = |v: serde_json::Result<String>| {
            v.map_err(|e| MnemoError::Internal(format!("record {} not serializable: {e}", record.id)))
        };
        Ok(Self {
            id: record.id.clone(),
            content: record.content.clone(),
            kind: record.kind.to_string(),
            embedding: record.embedding.as_deref().map(vec_to_blob),
            metadata: json(serde_json::to_string(&record.metadata))?,
            tags: json(serde_json::to_string(&record.tags))?,
            priority: record.priority.to_string(),
            relevance_score: record.relevance_score,
            access_count: i64::try_from(record.access_count).unwrap_or(i64::MAX),
            session_id: record.session_id.as_ref().map(|s| s.0.clone()),
            role: record.role.clone(),
            created_at: record.created_at.to_rfc3339(),
            updated_at: record.updated_at.to_rfc3339(),
            last_accessed_at: record.last_accessed_at.to_rfc3339(),
            expires_at: record.expires_at.map(|t| t.to_rfc3339()),
        })
    }
}

/// Convert an f32 vector to its little-endian BLOB form.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a BLOB back to an f32 vector. Trailing partial chunks are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn conversion_err<E>(column: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, ty, Box::new(err))
}

fn parse_time(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_err(column, Type::Text, e))
}

/// Convert a row selected with [`COLUMNS`] into a record.
fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MemoryRecord> {
    let kind: String = row.get(2)?;
    let embedding: Option<Vec<u8>> = row.get(3)?;
    let metadata: String = row.get(4)?;
    let tags: String = row.get(5)?;
    let priority: String = row.get(6)?;
    let access_count: i64 = row.get(8)?;
    let session_id: Option<String> = row.get(9)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;
    let last_accessed_at: String = row.get(13)?;
    let expires_at: Option<String> = row.get(14)?;

    Ok(MemoryRecord {
        id: row.get(0)?,
        content: row.get(1)?,
        kind: kind.parse().map_err(|e| conversion_err(2, Type::Text, e))?,
        embedding: embedding.map(|b| blob_to_vec(&b)),
        metadata: serde_json::from_str(&metadata).map_err(|e| conversion_err(4, Type::Text, e))?,
        tags: serde_json::from_str(&tags).map_err(|e| conversion_err(5, Type::Text, e))?,
        priority: priority.parse().map_err(|e| conversion_err(6, Type::Text, e))?,
        relevance_score: row.get(7)?,
        access_count: u64::try_from(access_count).unwrap_or(0),
        session_id: session_id.map(SessionId),
        role: row.get(10)?,
        created_at: parse_time(11, &created_at)?,
        updated_at: parse_time(12, &updated_at)?,
        last_accessed_at: parse_time(13, &last_accessed_at)?,
        expires_at: expires_at.as_deref().map(|t| parse_time(14, t)).transpose()?,
    })
}

#[async_trait]
impl PluginAdapter for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Backend
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemoError> {
        let ping = self
            .conn
            .call(|conn| -> Result<i64, rusqlite::Error> {
                let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
                Ok(one)
            })
            .await;
        Ok(match ping {
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(format!("sqlite unreachable: {e}")),
        })
    }
}

#[async_trait]
impl PersistenceBackend for SqliteBackend {
    async fn store_memory(&self, record: &MemoryRecord) -> Result<bool, MnemoError> {
        let stored = self.upsert(record, false).await?;
        debug!(memory_id = %record.id, "stored record in sqlite");
        Ok(stored)
    }

    async fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>, MnemoError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {COLUMNS} FROM memories WHERE id = ?1"))?;
                let mut rows = stmt.query_map(rusqlite::params![id], row_to_record)?;
                let record = rows.next().transpose()?;
                Ok(record)
            })
            .await
            .map_err(storage_err)
    }

    async fn update_memory(&self, record: &MemoryRecord) -> Result<bool, MnemoError> {
        self.upsert(record, true).await
    }

    async fn delete_memory(&self, id: &str) -> Result<bool, MnemoError> {
        let id = id.to_string();
        let n = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM memories WHERE id = ?1", rusqlite::params![id])?;
                Ok(n)
            })
            .await
            .map_err(storage_err)?;
        Ok(n > 0)
    }

    async fn search_memories(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<MemoryRecord>, MnemoError> {
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM memories WHERE embedding IS NOT NULL"
                ))?;
                let records = stmt
                    .query_map([], row_to_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
            .map_err(storage_err)?;

        let mut scored: Vec<(f32, MemoryRecord)> = records
            .into_iter()
            .filter_map(|r| {
                let sim = cosine_similarity(query, r.embedding.as_deref()?);
                (sim >= min_similarity).then_some((sim, r))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        Ok(scored.into_iter().take(limit).map(|(_, r)| r).collect())
    }

    async fn clear(&self) -> Result<(), MnemoError> {
        self.conn
            .call(|conn| {
                conn.execute("DELETE FROM memories", [])?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn count(&self) -> Result<usize, MnemoError> {
        let n = self
            .conn
            .call(|conn| {
                let n: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
                Ok(n)
            })
            .await
            .map_err(storage_err)?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use mnemo_core::{MemoryKind, Priority};
    use mnemo_test_utils::fixtures::{embedded, unit_at};

    use super::*;

    #[test]
    fn blob_round_trip() {
        let original = vec![0.1_f32, -0.5, 1.0, 384.0];
        let blob = vec_to_blob(&original);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_vec(&blob), original);
    }

    #[tokio::test]
    async fn stores_every_field() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        let record = MemoryRecord::new("m1", "User likes tea", MemoryKind::LongTerm)
            .with_embedding(vec![0.6, 0.8])
            .with_tags(["prefs", "drinks"])
            .with_priority(Priority::High)
            .with_metadata("source", serde_json::json!("chat"))
            .with_session(SessionId::from("s-1"))
            .with_role("user")
            .with_relevance(0.7)
            .with_expires_at(Utc::now() + Duration::days(3));

        assert!(backend.store_memory(&record).await.unwrap());
        let loaded = backend.get_memory("m1").await.unwrap().expect("stored");
        assert_eq!(loaded.content, record.content);
        assert_eq!(loaded.kind, MemoryKind::LongTerm);
        assert_eq!(loaded.embedding, record.embedding);
        assert_eq!(loaded.tags, record.tags);
        assert_eq!(loaded.priority, Priority::High);
        assert_eq!(loaded.metadata, record.metadata);
        assert_eq!(loaded.session_id, record.session_id);
        assert_eq!(loaded.role.as_deref(), Some("user"));
        assert_eq!(loaded.created_at, record.created_at);
        assert_eq!(loaded.expires_at, record.expires_at);

        assert!(backend.get_memory("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_and_delete_report_presence() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        let record = MemoryRecord::new("m1", "v1", MemoryKind::ShortTerm);
        assert!(!backend.update_memory(&record).await.unwrap());
        backend.store_memory(&record).await.unwrap();

        let mut changed = record.clone();
        changed.content = "v2".into();
        assert!(backend.update_memory(&changed).await.unwrap());
        assert_eq!(
            backend.get_memory("m1").await.unwrap().map(|r| r.content),
            Some("v2".to_string())
        );

        assert!(backend.delete_memory("m1").await.unwrap());
        assert!(!backend.delete_memory("m1").await.unwrap());
    }

    #[tokio::test]
    async fn search_and_count() {
        let backend = SqliteBackend::open_in_memory().await.unwrap();
        for (id, sim) in [("a", 0.95), ("b", 0.6), ("c", 0.2)] {
            backend.store_memory(&embedded(id, unit_at(sim))).await.unwrap();
        }
        backend
            .store_memory(&MemoryRecord::new("plain", "x", MemoryKind::LongTerm))
            .await
            .unwrap();
        assert_eq!(backend.count().await.unwrap(), 4);

        let hits = backend.search_memories(&[1.0, 0.0], 5, 0.5).await.unwrap();
        assert_eq!(hits.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);

        backend.clear().await.unwrap();
        assert_eq!(backend.count().await.unwrap(), 0);
        assert_eq!(backend.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn open_creates_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mnemo.db");
        {
            let backend = SqliteBackend::open(&path).await.unwrap();
            backend
                .store_memory(&MemoryRecord::new("keep", "x", MemoryKind::LongTerm))
                .await
                .unwrap();
        }
        let reopened = SqliteBackend::open(&path).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
