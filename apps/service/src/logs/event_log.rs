use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{LIVE_EXTENSION, LogError, LogRotator, StreamLocks, validate_stream_name};
use crate::monitoring::types::LogEntry;

/// Append-only writer for per-check event logs
pub struct EventLog {
    dir: PathBuf,
    locks: Arc<StreamLocks>,
}

impl EventLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), locks: Arc::new(StreamLocks::default()) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rotator operating on the same streams
    pub fn rotator(&self) -> LogRotator {
        LogRotator::new(self.dir.clone(), Arc::clone(&self.locks))
    }

    pub fn stream_path(&self, check_id: &str) -> Result<PathBuf, LogError> {
        validate_stream_name(check_id)?;
        Ok(self.dir.join(format!("{check_id}{LIVE_EXTENSION}")))
    }

    /// Append one entry as a JSON line, creating the stream if needed
    pub async fn append(&self, check_id: &str, entry: &LogEntry) -> Result<(), LogError> {
        let path = self.stream_path(check_id)?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let lock = self.locks.get(check_id);
        let _guard = lock.lock().await;

        fs::create_dir_all(&self.dir).await?;
        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}
