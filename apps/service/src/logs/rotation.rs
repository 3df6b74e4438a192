use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use super::{ARCHIVE_EXTENSION, LIVE_EXTENSION, LogError, StreamLocks, validate_stream_name};

/// Outcome counts of one rotation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationSummary {
    pub rotated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Compresses live logs into archives and truncates them
pub struct LogRotator {
    dir: PathBuf,
    locks: Arc<StreamLocks>,
    last_token: AtomicI64,
}

impl LogRotator {
    pub(crate) fn new(dir: PathBuf, locks: Arc<StreamLocks>) -> Self {
        Self { dir, locks, last_token: AtomicI64::new(0) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Millisecond timestamp, bumped past the previous token if the clock has not moved
    fn next_token(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last_token
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        now.max(previous + 1)
    }

    fn live_path(&self, stream: &str) -> PathBuf {
        self.dir.join(format!("{stream}{LIVE_EXTENSION}"))
    }

    fn archive_path(&self, artifact_id: &str) -> PathBuf {
        self.dir.join(format!("{artifact_id}{ARCHIVE_EXTENSION}"))
    }

    /// Names of the live streams, optionally followed by the archive ids
    pub async fn list(&self, include_compressed: bool) -> Result<Vec<String>, LogError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut live = Vec::new();
        let mut archived = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else { continue };

            if let Some(stream) = name.strip_suffix(LIVE_EXTENSION) {
                live.push(stream.to_string());
            } else if let Some(artifact) = name.strip_suffix(ARCHIVE_EXTENSION) {
                if include_compressed {
                    archived.push(artifact.to_string());
                }
            }
        }

        live.sort();
        archived.sort();
        live.extend(archived);
        Ok(live)
    }

    /// Rotate every live stream; a failing stream does not stop the others
    pub async fn rotate(&self) -> Result<RotationSummary, LogError> {
        let streams = self.list(false).await?;
        let mut summary = RotationSummary::default();

        for stream in streams {
            match self.rotate_stream(&stream).await {
                Ok(Some(artifact)) => {
                    debug!(stream = %stream, artifact = %artifact, "Rotated log stream");
                    summary.rotated += 1;
                }
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    error!(stream = %stream, "Failed to rotate log stream: {}", e);
                    summary.failed += 1;
                }
            }
        }

        let pruned = self.locks.prune();
        if pruned > 0 {
            debug!(pruned, "Dropped idle stream locks");
        }

        Ok(summary)
    }

    /// Rotate one stream, returning the archive id or `None` if the stream was empty
    pub async fn rotate_stream(&self, stream: &str) -> Result<Option<String>, LogError> {
        let token = self.next_token();
        self.rotate_stream_with_token(stream, token).await
    }

    pub(crate) async fn rotate_stream_with_token(
        &self,
        stream: &str,
        token: i64,
    ) -> Result<Option<String>, LogError> {
        validate_stream_name(stream)?;

        let lock = self.locks.get(stream);
        let _guard = lock.lock().await;

        let live_path = self.live_path(stream);
        let content = fs::read(&live_path).await?;
        if content.is_empty() {
            return Ok(None);
        }

        let artifact_id = format!("{stream}-{token}");
        self.compress(content, &artifact_id).await?;

        // Only reached once the archive is on disk
        fs::OpenOptions::new().write(true).truncate(true).open(&live_path).await?;

        Ok(Some(artifact_id))
    }

    async fn compress(&self, content: Vec<u8>, artifact_id: &str) -> Result<(), LogError> {
        let encoded = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&content)?;
            Ok(BASE64.encode(encoder.finish()?))
        })
        .await??;

        let path = self.archive_path(artifact_id);
        let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Err(LogError::ArtifactExists(path)),
            Err(e) => return Err(e.into()),
        };

        let written = async {
            file.write_all(encoded.as_bytes()).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            // Leave no half-written archive behind
            let _ = fs::remove_file(&path).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// Read back the content of an archive
    pub async fn decompress(&self, artifact_id: &str) -> Result<String, LogError> {
        validate_stream_name(artifact_id)?;
        let encoded = fs::read_to_string(self.archive_path(artifact_id)).await?;
        let compressed = BASE64.decode(encoded.trim())?;

        let decoded = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut decoder = GzDecoder::new(compressed.as_slice());
            let mut out = String::new();
            decoder.read_to_string(&mut out)?;
            Ok(out)
        })
        .await??;

        Ok(decoded)
    }

    /// Start the background rotation loop, first pass runs immediately
    pub fn start_periodic_rotation(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                match self.rotate().await {
                    Ok(summary) => info!(
                        rotated = summary.rotated,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "Log rotation completed"
                    ),
                    Err(e) => error!("Log rotation failed: {}", e),
                }
            }
        })
    }
}
