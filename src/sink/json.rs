use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use super::ResultSink;
use crate::checkpoint::write_atomic;
use crate::evaluation::ResultRecord;

const ACCEPTED_FILE: &str = "selected_candidates.json";
const REJECTED_FILE: &str = "rejected_candidates.json";

/// Writes the final buckets as pretty JSON arrays, replacing earlier runs.
pub struct JsonResultSink {
    dir: PathBuf,
}

impl JsonResultSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn accepted_path(&self) -> PathBuf {
        self.dir.join(ACCEPTED_FILE)
    }

    pub fn rejected_path(&self) -> PathBuf {
        self.dir.join(REJECTED_FILE)
    }
}

#[async_trait]
impl ResultSink for JsonResultSink {
    async fn emit(&self, accepted: &[ResultRecord], rejected: &[ResultRecord]) -> Result<()> {
        for (path, records) in [
            (self.accepted_path(), accepted),
            (self.rejected_path(), rejected),
        ] {
            let bytes = serde_json::to_vec_pretty(records)?;
            write_atomic(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        info!(
            accepted = accepted.len(),
            rejected = rejected.len(),
            "Wrote results to {}",
            self.dir.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{EvaluationResult, ResultClassifier};
    use crate::test_support::{candidate, evaluation_json};

    #[tokio::test]
    async fn test_emit_writes_both_buckets() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = JsonResultSink::new(tmp.path());
        let (_, record) = ResultClassifier::default().resolve(
            &candidate("a", "Asha Rao"),
            EvaluationResult::from_value(&evaluation_json("Shortlist", 9.0)),
        );

        sink.emit(&[record.clone()], &[]).await.unwrap();

        let accepted: Vec<ResultRecord> =
            serde_json::from_slice(&tokio::fs::read(sink.accepted_path()).await.unwrap()).unwrap();
        let rejected: Vec<ResultRecord> =
            serde_json::from_slice(&tokio::fs::read(sink.rejected_path()).await.unwrap()).unwrap();
        assert_eq!(accepted, vec![record]);
        assert!(rejected.is_empty());
    }
}
