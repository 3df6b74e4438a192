//! Per-check event logs.
//!
//! Every evaluated check appends one JSON line to `<dir>/<check id>.log`.
//! Rotation compresses a live log into `<check id>-<token>.gz.b64` and then
//! truncates it. Appends and rotation of the same stream are serialized so an
//! entry is never truncated away before it has been archived.

pub mod event_log;
pub mod rotation;

pub use event_log::EventLog;
pub use rotation::{LogRotator, RotationSummary};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub const LIVE_EXTENSION: &str = ".log";
pub const ARCHIVE_EXTENSION: &str = ".gz.b64";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log stream name: {0}")]
    InvalidStream(String),

    #[error("Archive {0} already exists")]
    ArtifactExists(PathBuf),

    #[error("Log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize log entry: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Compression task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

fn validate_stream_name(name: &str) -> Result<(), LogError> {
    if name.trim().is_empty() || name.contains(['/', '\\']) || name.contains("..") {
        return Err(LogError::InvalidStream(name.to_string()));
    }
    Ok(())
}

/// One async mutex per stream, shared by the logger and the rotator
#[derive(Debug, Default)]
pub(crate) struct StreamLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl StreamLocks {
    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn get(&self, stream: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.map().entry(stream.to_string()).or_default())
    }

    /// Drop locks nobody holds or waits on
    ///
    /// Handles are only cloned out under the map lock, so a count of one means
    /// the map owns the only reference and a later `get` can safely start fresh.
    pub(crate) fn prune(&self) -> usize {
        let mut locks = self.map();
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map().len()
    }
}
