//! Failure log.
//!
//! One JSON object per line, appended once per item that exhausted its
//! attempts. Existing lines are never rewritten.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{FailureEntry, FailureSink};

pub struct NdjsonFailureLog {
    path: PathBuf,
}

impl NdjsonFailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl FailureSink for NdjsonFailureLog {
    async fn record(&self, entry: &FailureEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry).context("Failed to encode failure entry")?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open failure log {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(item = %entry.item_identity, "Recorded failure in {}", self.path.display());
        Ok(())
    }
}
