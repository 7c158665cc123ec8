//! Drives the ordered work sequence through one executor with checkpointed
//! progress.
//!
//! The driver is the only writer of the checkpoint. Every item is resolved
//! and then saved before the next one starts, so an interrupted run resumes
//! at the first unsaved item. Items that fail are logged to the failure sink
//! and skipped for good; nothing in a run is fatal except emitting the final
//! collections.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::calls::CallRecord;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::evaluation::{Bucket, ResultRecord};
use crate::metrics::Metrics;
use crate::sink::{CallRecordSink, FailureEntry, FailureSink, ResultSink};
use crate::work_item::WorkItem;

/// Terminal result of processing one item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Classified {
        bucket: Bucket,
        record: ResultRecord,
    },
    /// A call was placed (or attempted). The row is exported either way;
    /// `failure` is set when the call did not end cleanly.
    Called {
        record: CallRecord,
        failure: Option<String>,
    },
    Failed {
        error: String,
    },
}

/// One pipeline mode. Implementations never fail the run: every error is
/// folded into the returned outcome.
#[async_trait]
pub trait ItemExecutor: Send + Sync {
    fn mode(&self) -> &'static str;

    async fn execute(&self, item: &WorkItem) -> ItemOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_key: String,
    pub mode: &'static str,
    pub total_items: usize,
    pub resumed_from: usize,
    pub processed: usize,
    pub accepted: usize,
    pub rejected: usize,
    /// Failures in this process only; earlier runs are in the failure log.
    pub failed: usize,
    /// Items resolved without a bucketed record, across resumes.
    pub skipped: usize,
    pub duration_ms: u64,
}

/// Store key for one run of one mode. Evaluate and call runs over the same
/// input keep separate cursors.
pub fn checkpoint_key(mode: &str, run_key: &str) -> String {
    format!("{}-{}", mode, run_key)
}

pub struct PipelineDriver {
    run_key: String,
    checkpoint_key: String,
    store: Arc<dyn CheckpointStore>,
    executor: Arc<dyn ItemExecutor>,
    failures: Arc<dyn FailureSink>,
    results: Option<Arc<dyn ResultSink>>,
    calls: Option<Arc<dyn CallRecordSink>>,
    metrics: Arc<Metrics>,
}

impl PipelineDriver {
    pub fn new(
        run_key: impl Into<String>,
        store: Arc<dyn CheckpointStore>,
        executor: Arc<dyn ItemExecutor>,
        failures: Arc<dyn FailureSink>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let run_key = run_key.into();
        Self {
            checkpoint_key: checkpoint_key(executor.mode(), &run_key),
            run_key,
            store,
            executor,
            failures,
            results: None,
            calls: None,
            metrics,
        }
    }

    pub fn with_result_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.results = Some(sink);
        self
    }

    pub fn with_call_sink(mut self, sink: Arc<dyn CallRecordSink>) -> Self {
        self.calls = Some(sink);
        self
    }

    pub async fn run(&self, items: &[WorkItem]) -> Result<RunSummary> {
        let start = Instant::now();
        let mode = self.executor.mode();

        let mut checkpoint = match self.store.load(&self.checkpoint_key).await {
            Some(cp) => {
                info!(
                    run_key = %self.run_key,
                    next_index = cp.next_index,
                    accepted = cp.accepted.len(),
                    rejected = cp.rejected.len(),
                    "Resuming from checkpoint"
                );
                cp
            }
            None => {
                info!(run_key = %self.run_key, "No checkpoint found, starting fresh");
                Checkpoint::default()
            }
        };

        let resumed_from = checkpoint.next_index;
        if resumed_from > items.len() {
            warn!(
                run_key = %self.run_key,
                next_index = resumed_from,
                total = items.len(),
                "Checkpoint is past the end of the input, nothing left to process"
            );
        }
        let remaining = items.get(resumed_from..).unwrap_or_default();

        info!(
            run_key = %self.run_key,
            mode = mode,
            total = items.len(),
            remaining = remaining.len(),
            "Starting pipeline"
        );

        let mut failed = 0usize;
        for (offset, item) in remaining.iter().enumerate() {
            let index = resumed_from + offset;
            self.metrics.start_item(item.id());
            info!(
                run_key = %self.run_key,
                index = index,
                total = items.len(),
                item = %item.id(),
                "Processing {}",
                item.label()
            );

            match self.executor.execute(item).await {
                ItemOutcome::Classified { bucket, record } => {
                    self.metrics.record_classified(bucket);
                    checkpoint.record(bucket, record);
                }
                ItemOutcome::Called { record, failure } => {
                    self.append_call_row(&record).await;
                    if let Some(reason) = &failure {
                        self.record_failure(item, reason).await;
                        failed += 1;
                    }
                    self.metrics.record_call(failure.is_some());
                    checkpoint.skip();
                }
                ItemOutcome::Failed { error } => {
                    self.record_failure(item, &error).await;
                    self.metrics.record_failure();
                    failed += 1;
                    checkpoint.skip();
                }
            }

            self.save(&checkpoint).await;
        }

        if let Some(results) = &self.results {
            results
                .emit(&checkpoint.accepted, &checkpoint.rejected)
                .await
                .context("Failed to write final results, checkpoint kept for the next run")?;
        }

        if let Err(e) = self.store.clear(&self.checkpoint_key).await {
            warn!(run_key = %self.run_key, error = %e, "Failed to clear checkpoint");
        }

        let summary = RunSummary {
            run_key: self.run_key.clone(),
            mode,
            total_items: items.len(),
            resumed_from,
            processed: remaining.len(),
            accepted: checkpoint.accepted.len(),
            rejected: checkpoint.rejected.len(),
            failed,
            skipped: checkpoint.skipped(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            run_key = %summary.run_key,
            processed = summary.processed,
            accepted = summary.accepted,
            rejected = summary.rejected,
            failed = summary.failed,
            skipped = summary.skipped,
            duration_ms = summary.duration_ms,
            "Pipeline complete"
        );
        Ok(summary)
    }

    async fn save(&self, checkpoint: &Checkpoint) {
        match self.store.save(&self.checkpoint_key, checkpoint).await {
            Ok(()) => self.metrics.record_checkpoint_save(),
            Err(e) => error!(
                run_key = %self.run_key,
                next_index = checkpoint.next_index,
                error = %e,
                "Failed to save checkpoint"
            ),
        }
    }

    async fn record_failure(&self, item: &WorkItem, reason: &str) {
        let entry = FailureEntry::new(item, reason);
        if let Err(e) = self.failures.record(&entry).await {
            error!(item = %item.id(), error = %e, "Failed to write failure entry");
        }
    }

    /// Rows go out before the checkpoint save, so a crash in between can
    /// repeat a row on resume but never lose one.
    async fn append_call_row(&self, record: &CallRecord) {
        if let Some(sink) = &self.calls {
            if let Err(e) = sink.append(std::slice::from_ref(record)).await {
                error!(name = %record.full_name, error = %e, "Failed to append call row");
            }
        }
    }
}
