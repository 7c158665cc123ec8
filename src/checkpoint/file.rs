use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{Checkpoint, CheckpointStore};
use crate::error::CheckpointError;

const CHECKPOINT_SUFFIX: &str = ".checkpoint.json";

/// Writes `bytes` to a hidden temp file next to `path`, syncs it, then
/// renames it into place. Readers see either the old file or the new one.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("state");
    let tmp = parent.join(format!(
        ".{}.{}.{}.tmp",
        filename,
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));

    let written = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if written.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    written
}

/// One JSON file per run key under a state directory.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, run_key: &str) -> PathBuf {
        self.dir.join(checkpoint_file_name(run_key))
    }
}

pub fn checkpoint_file_name(run_key: &str) -> String {
    format!("{}{}", encode_run_key(run_key), CHECKPOINT_SUFFIX)
}

/// Maps a run key onto a file-name stem, one stem per key. ASCII
/// alphanumerics and `-` pass through; every other byte, `_` included,
/// becomes `_xx`. The empty key encodes as a lone `_`, which no other key
/// can produce.
pub fn encode_run_key(run_key: &str) -> String {
    if run_key.is_empty() {
        return "_".to_string();
    }
    let mut out = String::with_capacity(run_key.len());
    for b in run_key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{:02x}", b));
        }
    }
    out
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, run_key: &str) -> Option<Checkpoint> {
        let path = self.path_for(run_key);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(run_key = %run_key, "No checkpoint at {}", path.display());
                return None;
            }
            Err(e) => {
                warn!(
                    run_key = %run_key,
                    "Checkpoint {} unreadable, starting fresh: {}",
                    path.display(),
                    e
                );
                return None;
            }
        };

        match serde_json::from_slice::<Checkpoint>(&raw) {
            Ok(checkpoint) => {
                info!(
                    run_key = %run_key,
                    next_index = checkpoint.next_index,
                    accepted = checkpoint.accepted.len(),
                    rejected = checkpoint.rejected.len(),
                    "Loaded checkpoint"
                );
                Some(checkpoint)
            }
            Err(e) => {
                warn!(
                    run_key = %run_key,
                    "Checkpoint {} is corrupt, starting fresh: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    async fn save(&self, run_key: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let path = self.path_for(run_key);
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        write_atomic(&path, &bytes)
            .await
            .map_err(|source| CheckpointError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(run_key = %run_key, next_index = checkpoint.next_index, "Checkpoint saved");
        Ok(())
    }

    async fn clear(&self, run_key: &str) -> Result<(), CheckpointError> {
        let path = self.path_for(run_key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(run_key = %run_key, "Cleared checkpoint {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Io { path, source }),
        }
    }
}
