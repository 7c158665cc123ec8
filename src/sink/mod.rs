pub mod csv;
pub mod failures;
pub mod json;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calls::CallRecord;
use crate::evaluation::ResultRecord;
use crate::work_item::WorkItem;

pub use self::csv::CsvCallSink;
pub use failures::NdjsonFailureLog;
pub use json::JsonResultSink;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub item_identity: String,
    pub full_name: String,
    pub error_description: String,
    pub failed_at: DateTime<Utc>,
}

impl FailureEntry {
    pub fn new(item: &WorkItem, error: impl Into<String>) -> Self {
        Self {
            item_identity: item.id().to_string(),
            full_name: item.full_name(),
            error_description: error.into(),
            failed_at: Utc::now(),
        }
    }
}

/// Append-only record of items the run gave up on.
#[async_trait]
pub trait FailureSink: Send + Sync {
    async fn record(&self, entry: &FailureEntry) -> anyhow::Result<()>;
}

/// Receives the final bucketed collections once a run completes.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn emit(&self, accepted: &[ResultRecord], rejected: &[ResultRecord]) -> anyhow::Result<()>;
}

/// Append-only tabular export of call outcomes.
#[async_trait]
pub trait CallRecordSink: Send + Sync {
    async fn append(&self, rows: &[CallRecord]) -> anyhow::Result<()>;
}
