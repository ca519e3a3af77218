// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store for file-backed records (attachments, documents).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mnemo_core::{MnemoError, Metadata};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::stats::{FileStoreStats, utilization};

/// Metadata about one stored file. The bytes stay on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub file_path: PathBuf,
    pub file_name: String,
    /// Lower-case extension, or `unknown`.
    pub file_type: String,
    pub file_size: u64,
    pub content_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether `file_path` is a copy this store owns.
    #[serde(default)]
    pub managed_copy: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Describe the file at `path`, optionally copying it into `storage_dir`.
    ///
    /// The copy is named `{id}_{file_name}` and becomes the record's path.
    pub async fn from_path(
        path: &Path,
        storage_dir: Option<&Path>,
        tags: Vec<String>,
        metadata: Metadata,
        content_summary: Option<String>,
    ) -> Result<Self, MnemoError> {
        let meta = tokio::fs::metadata(path).await.map_err(|_| {
            MnemoError::InvalidRequest(format!("file not found: {}", path.display()))
        })?;
        if !meta.is_file() {
            return Err(MnemoError::InvalidRequest(format!(
                "not a regular file: {}",
                path.display()
            )));
        }

        let now = Utc::now();
        let id = file_id(path, now);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());
        let file_type = file_type_of(path);

        let (file_path, managed_copy) = match storage_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let dest = dir.join(format!("{id}_{file_name}"));
                tokio::fs::copy(path, &dest).await?;
                debug!(file_id = %id, dest = %dest.display(), "copied file into storage");
                (dest, true)
            }
            None => (path.to_path_buf(), false),
        };

        Ok(Self {
            id,
            file_path,
            file_name,
            file_type,
            file_size: meta.len(),
            content_summary,
            embedding: None,
            metadata,
            tags: mnemo_core::record::normalize_tags(tags),
            managed_copy,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }
}

/// First 16 hex chars of `sha256(path ‖ timestamp)`.
pub fn file_id(path: &Path, at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(at.to_rfc3339().as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(16);
    id
}

fn file_type_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Filters accepted by [`FileStore::search`].
#[derive(Debug, Clone, Default)]
pub struct FileQuery {
    pub file_type: Option<String>,
    /// Any of these tags. Empty matches all.
    pub tags: Vec<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub limit: Option<usize>,
}

/// Capacity-bounded map of [`FileRecord`]s.
#[derive(Debug)]
pub struct FileStore {
    capacity: usize,
    files: HashMap<String, FileRecord>,
}

impl FileStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            files: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Insert or replace. A new id at capacity is rejected.
    pub fn add(&mut self, record: FileRecord) -> bool {
        if !self.files.contains_key(&record.id) && self.files.len() >= self.capacity {
            warn!(file_id = %record.id, capacity = self.capacity, "file store full; rejecting file");
            return false;
        }
        self.files.insert(record.id.clone(), record);
        true
    }

    pub fn get(&self, id: &str) -> Option<&FileRecord> {
        self.files.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<FileRecord> {
        self.files.remove(id)
    }

    pub fn update(&mut self, mut record: FileRecord) -> bool {
        match self.files.get_mut(&record.id) {
            Some(slot) => {
                record.updated_at = Utc::now();
                *slot = record;
                true
            }
            None => false,
        }
    }

    /// Matching files, newest first (ties by id).
    pub fn search(&self, query: &FileQuery) -> Vec<FileRecord> {
        let file_type = query.file_type.as_deref().map(str::to_ascii_lowercase);
        let mut hits: Vec<&FileRecord> = self
            .files
            .values()
            .filter(|f| file_type.as_deref().is_none_or(|t| f.file_type == t))
            .filter(|f| query.tags.is_empty() || f.has_any_tag(&query.tags))
            .filter(|f| query.min_size.is_none_or(|min| f.file_size >= min))
            .filter(|f| query.max_size.is_none_or(|max| f.file_size <= max))
            .collect();
        sort_newest_first(&mut hits);
        hits.into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn by_type(&self, file_type: &str) -> Vec<FileRecord> {
        self.search(&FileQuery {
            file_type: Some(file_type.to_string()),
            ..Default::default()
        })
    }

    pub fn by_tags(&self, tags: &[String]) -> Vec<FileRecord> {
        self.search(&FileQuery {
            tags: tags.to_vec(),
            ..Default::default()
        })
    }

    /// Every file, newest first.
    pub fn all(&self) -> Vec<FileRecord> {
        self.search(&FileQuery::default())
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn stats(&self) -> FileStoreStats {
        let total_files = self.files.len();
        let total_size_bytes: u64 = self.files.values().map(|f| f.file_size).sum();
        let mut file_types: BTreeMap<String, usize> = BTreeMap::new();
        for f in self.files.values() {
            *file_types.entry(f.file_type.clone()).or_default() += 1;
        }
        FileStoreStats {
            total_files,
            capacity: self.capacity,
            utilization: utilization(total_files, self.capacity),
            total_size_bytes,
            avg_size_bytes: if total_files == 0 {
                0.0
            } else {
                total_size_bytes as f64 / total_files as f64
            },
            oldest: self.files.values().map(|f| f.created_at).min(),
            newest: self.files.values().map(|f| f.created_at).max(),
            file_types,
        }
    }
}

pub(crate) fn sort_newest_first(files: &mut [&FileRecord]) {
    files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn file(id: &str, ty: &str, size: u64, age_secs: i64) -> FileRecord {
        let at = Utc::now() - Duration::seconds(age_secs);
        FileRecord {
            id: id.to_string(),
            file_path: PathBuf::from(format!("/tmp/{id}.{ty}")),
            file_name: format!("{id}.{ty}"),
            file_type: ty.to_string(),
            file_size: size,
            content_summary: None,
            embedding: None,
            metadata: Metadata::new(),
            tags: Vec::new(),
            managed_copy: false,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn id_is_sixteen_hex_chars() {
        let id = file_id(Path::new("/a/b.txt"), Utc::now());
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn file_type_defaults_to_unknown() {
        assert_eq!(file_type_of(Path::new("README")), "unknown");
        assert_eq!(file_type_of(Path::new("photo.JPG")), "jpg");
    }

    #[tokio::test]
    async fn from_path_missing_file_is_invalid_request() {
        let err = FileRecord::from_path(
            Path::new("/definitely/not/here.txt"),
            None,
            vec![],
            Metadata::new(),
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MnemoError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn from_path_copies_into_storage_dir() {
        let src_dir = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("notes.md");
        std::fs::write(&src, b"# hello").unwrap();

        let record = FileRecord::from_path(
            &src,
            Some(store_dir.path()),
            vec!["docs".into(), "docs".into()],
            Metadata::new(),
            Some("File: notes.md".into()),
        )
        .await
        .unwrap();

        assert_eq!(record.file_type, "md");
        assert_eq!(record.file_size, 7);
        assert_eq!(record.tags, vec!["docs"]);
        assert!(record.managed_copy);
        assert!(record.file_path.starts_with(store_dir.path()));
        assert_eq!(
            record.file_path.file_name().unwrap().to_string_lossy(),
            format!("{}_notes.md", record.id)
        );
        assert!(record.file_path.exists());
    }

    #[test]
    fn capacity_rejects_new_files() {
        let mut store = FileStore::new(1);
        assert!(store.add(file("a", "txt", 1, 0)));
        assert!(!store.add(file("b", "txt", 1, 0)));
        assert!(store.add(file("a", "pdf", 2, 0)));
        assert_eq!(store.get("a").map(|f| f.file_type.as_str()), Some("pdf"));
    }

    #[test]
    fn search_filters_by_type_size_and_tags() {
        let mut store = FileStore::new(10);
        let mut tagged = file("t", "pdf", 500, 1);
        tagged.tags = vec!["report".into()];
        store.add(tagged);
        store.add(file("small", "txt", 10, 2));
        store.add(file("big", "txt", 10_000, 3));

        let txt = store.by_type("TXT");
        assert_eq!(txt.iter().map(|f| f.id.as_str()).collect::<Vec<_>>(), vec!["small", "big"]);

        let sized = store.search(&FileQuery {
            min_size: Some(100),
            max_size: Some(1000),
            ..Default::default()
        });
        assert_eq!(sized.len(), 1);
        assert_eq!(sized[0].id, "t");

        assert_eq!(store.by_tags(&["report".into()]).len(), 1);
        assert_eq!(store.all().first().map(|f| f.id.as_str()), Some("t"));
    }

    #[test]
    fn stats_sum_sizes_and_types() {
        let mut store = FileStore::new(4);
        store.add(file("a", "txt", 100, 0));
        store.add(file("b", "txt", 300, 0));
        store.add(file("c", "png", 200, 0));
        let stats = store.stats();
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_size_bytes, 600);
        assert_eq!(stats.avg_size_bytes, 200.0);
        assert_eq!(stats.file_types.get("txt"), Some(&2));
        assert_eq!(stats.utilization, 0.75);
    }

    #[test]
    fn update_and_remove() {
        let mut store = FileStore::new(4);
        assert!(!store.update(file("a", "txt", 1, 0)));
        store.add(file("a", "txt", 1, 0));
        let mut changed = file("a", "txt", 1, 0);
        changed.content_summary = Some("edited".into());
        assert!(store.update(changed));
        assert_eq!(
            store.get("a").and_then(|f| f.content_summary.clone()).as_deref(),
            Some("edited")
        );
        assert!(store.remove("a").is_some());
        assert!(store.is_empty());
    }
}
