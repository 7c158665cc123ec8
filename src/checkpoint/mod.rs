//! Durable run progress.
//!
//! A checkpoint holds both result buckets plus the `next_index` cursor, and
//! is saved after every resolved item. `next_index` always equals the
//! number of resolved items (accepted + rejected + skipped failures), so a
//! resumed run starts exactly where the last save left off.
//!
//! A checkpoint that cannot be read or decoded is treated as absent and the
//! run starts over from index 0. That trades redoing work for never
//! resuming from a state we cannot trust.

mod file;

pub use file::{checkpoint_file_name, encode_run_key, write_atomic, FileCheckpointStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CheckpointError;
use crate::evaluation::{Bucket, ResultRecord};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub accepted: Vec<ResultRecord>,
    pub rejected: Vec<ResultRecord>,
    pub next_index: usize,
}

impl Checkpoint {
    /// Appends a classified record and advances the cursor.
    pub fn record(&mut self, bucket: Bucket, record: ResultRecord) {
        match bucket {
            Bucket::Accepted => self.accepted.push(record),
            Bucket::Rejected => self.rejected.push(record),
        }
        self.next_index += 1;
    }

    /// Advances the cursor past an item that produced no bucketed record.
    pub fn skip(&mut self) {
        self.next_index += 1;
    }

    /// Items resolved without landing in either bucket.
    pub fn skipped(&self) -> usize {
        self.next_index
            .saturating_sub(self.accepted.len() + self.rejected.len())
    }
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// `None` means a fresh run: nothing saved, or nothing trustworthy.
    async fn load(&self, run_key: &str) -> Option<Checkpoint>;

    /// Must never leave a partially written checkpoint visible to `load`.
    async fn save(&self, run_key: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    async fn clear(&self, run_key: &str) -> Result<(), CheckpointError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::ResultClassifier;
    use crate::test_support::{candidate, evaluation_json};
    use crate::evaluation::EvaluationResult;

    fn record(id: &str, label: &str) -> (Bucket, ResultRecord) {
        ResultClassifier::default().resolve(
            &candidate(id, "Test Person"),
            EvaluationResult::from_value(&evaluation_json(label, 7.0)),
        )
    }

    #[test]
    fn test_fresh_checkpoint() {
        let cp = Checkpoint::default();
        assert_eq!(cp.next_index, 0);
        assert!(cp.accepted.is_empty());
        assert!(cp.rejected.is_empty());
    }

    #[test]
    fn test_record_advances_cursor() {
        let mut cp = Checkpoint::default();
        let (bucket, rec) = record("a", "Shortlist");
        cp.record(bucket, rec);
        let (bucket, rec) = record("b", "Reject");
        cp.record(bucket, rec);

        assert_eq!(cp.next_index, 2);
        assert_eq!(cp.accepted.len(), 1);
        assert_eq!(cp.rejected.len(), 1);
        assert_eq!(cp.skipped(), 0);
    }

    #[test]
    fn test_skip_advances_cursor_only() {
        let mut cp = Checkpoint::default();
        cp.skip();
        cp.skip();
        assert_eq!(cp.next_index, 2);
        assert_eq!(cp.skipped(), 2);
        assert!(cp.accepted.is_empty() && cp.rejected.is_empty());
    }

    #[test]
    fn test_serialized_field_names() {
        let cp = Checkpoint::default();
        let json = serde_json::to_value(&cp).unwrap();
        assert!(json.get("accepted").is_some());
        assert!(json.get("rejected").is_some());
        assert_eq!(json["next_index"], 0);
    }
}
