use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Serialize, Deserialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::ledger::Claim;
use crate::observer::CheckpointError;
use crate::storage::write_file_atomic_durable;

/// Durable observer progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Position of the next event to apply
    pub cursor: u64,
    /// Mirrored claims that were not yet terminal at `cursor`
    pub open_claims: Vec<Claim>,
}

impl Checkpoint {
    pub fn genesis() -> Self {
        Self::default()
    }
}

/// Injected persistence for observer checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last stored checkpoint, `None` before the first store
    async fn load(&self) -> Result<Option<Checkpoint>, CheckpointError>;

    async fn store(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;
}

/// Checkpoint store kept in memory
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    current: RwLock<Option<Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.current.read().clone())
    }

    async fn store(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        *self.current.write() = Some(checkpoint.clone());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct CheckpointFile {
    checkpoint: Checkpoint,
    checksum: String,
}

fn checksum(checkpoint: &Checkpoint) -> Result<String, CheckpointError> {
    let body = serde_json::to_vec(checkpoint).map_err(|e| CheckpointError::Serialization(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(&body)))
}

/// JSON checkpoint file.
///
/// Writes go to a synced sibling staging file that is renamed over the
/// target, so a crash leaves either the old or the new checkpoint. The body carries a
/// SHA-256 checksum; a mismatch is reported as [`CheckpointError::Corrupted`].
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<Option<Checkpoint>, CheckpointError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: CheckpointFile = serde_json::from_slice(&bytes)
            .map_err(|e| CheckpointError::Corrupted(format!("unreadable checkpoint: {e}")))?;
        if checksum(&file.checkpoint)? != file.checksum {
            return Err(CheckpointError::Corrupted("checksum mismatch".into()));
        }
        Ok(Some(file.checkpoint))
    }

    async fn store(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let file = CheckpointFile {
            checksum: checksum(checkpoint)?,
            checkpoint: checkpoint.clone(),
        };
        let body = serde_json::to_vec_pretty(&file).map_err(|e| CheckpointError::Serialization(e.to_string()))?;

        write_file_atomic_durable(&self.path, &body).await?;
        debug!(path = %self.path.display(), cursor = checkpoint.cursor, "checkpoint written");
        Ok(())
    }
}
