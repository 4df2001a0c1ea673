use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::storage::write_file_atomic_durable;
use crate::sync::SyncError;

/// Injected persistence for the outbound sequence counter.
///
/// Remote chains drop any payload at or below the last sequence they
/// accepted from this source, so the counter must survive restarts.
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Last issued sequence number, zero before the first
    async fn load(&self) -> Result<u64, SyncError>;

    async fn store(&self, sequence: u64) -> Result<(), SyncError>;
}

/// Sequence counter kept in memory
#[derive(Debug, Default)]
pub struct MemorySequenceStore {
    last: AtomicU64,
}

impl MemorySequenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SequenceStore for MemorySequenceStore {
    async fn load(&self) -> Result<u64, SyncError> {
        Ok(self.last.load(Ordering::SeqCst))
    }

    async fn store(&self, sequence: u64) -> Result<(), SyncError> {
        self.last.store(sequence, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct SequenceFile {
    sequence: u64,
}

/// JSON file holding the last issued sequence number
#[derive(Debug, Clone)]
pub struct FileSequenceStore {
    path: PathBuf,
}

impl FileSequenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SequenceStore for FileSequenceStore {
    async fn load(&self) -> Result<u64, SyncError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(SyncError::Persistence(e.to_string())),
        };
        let file: SequenceFile = serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::Persistence(format!("unreadable sequence file: {e}")))?;
        Ok(file.sequence)
    }

    async fn store(&self, sequence: u64) -> Result<(), SyncError> {
        let body = serde_json::to_vec(&SequenceFile { sequence })
            .map_err(|e| SyncError::Persistence(e.to_string()))?;
        write_file_atomic_durable(&self.path, &body)
            .await
            .map_err(|e| SyncError::Persistence(e.to_string()))?;
        debug!(path = %self.path.display(), sequence, "outbound sequence stored");
        Ok(())
    }
}
