use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Record {collection}/{id} already exists")]
    Conflict { collection: String, id: String },

    #[error("Invalid record identifier: {0}")]
    InvalidId(String),

    #[error("Record store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Collection-keyed record storage consumed by the worker
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Identifiers of every record in a collection
    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError>;

    /// Read a record, `NotFound` if it does not exist
    async fn read(&self, collection: &str, id: &str) -> Result<Value, StoreError>;

    /// Replace an existing record
    async fn update(&self, collection: &str, id: &str, record: &Value) -> Result<(), StoreError>;
}

/// JSON-file record store
///
/// Updates are written to a sibling temp file and renamed over the record, so
/// a reader only ever sees a complete record and concurrent writers resolve to
/// whichever rename lands last.
pub struct FileStore {
    base_dir: PathBuf,
    write_seq: AtomicU64,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), write_seq: AtomicU64::new(0) }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, collection: &str, id: &str) -> Result<PathBuf, StoreError> {
        for part in [collection, id] {
            if part.trim().is_empty() || part.contains(['/', '\\']) || part.contains("..") {
                return Err(StoreError::InvalidId(part.to_string()));
            }
        }
        Ok(self.base_dir.join(collection).join(format!("{id}.json")))
    }

    fn not_found(collection: &str, id: &str) -> StoreError {
        StoreError::NotFound { collection: collection.to_string(), id: id.to_string() }
    }

    /// Unique per writer and never ending in `.json`, so `list` skips it
    fn staging_path(&self, path: &Path, id: &str) -> PathBuf {
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        path.with_file_name(format!(".{id}.json.{}.{seq}.tmp", std::process::id()))
    }

    /// Create a new record, failing if one already exists
    pub async fn create(&self, collection: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::Conflict {
                    collection: collection.to_string(),
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(&serde_json::to_vec(record)?).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.base_dir.join(collection);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if let Some(id) = file_name.to_str().and_then(|name| name.strip_suffix(".json")) {
                ids.push(id.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        let path = self.record_path(collection, id)?;
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Self::not_found(collection, id)),
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_slice(&raw)?)
    }

    async fn update(&self, collection: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        let data = serde_json::to_vec(record)?;

        // Only existing records can be updated
        match fs::metadata(&path).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Self::not_found(collection, id)),
            Err(e) => return Err(e.into()),
        }

        let staging = self.staging_path(&path, id);
        let written = async {
            let mut file =
                fs::OpenOptions::new().write(true).create_new(true).open(&staging).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&staging, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }
}
