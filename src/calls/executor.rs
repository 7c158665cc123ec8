use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::analysis::{self, CallAnalysis};
use super::tracker::{CallFailure, CallOutcome, CallTracker};
use super::CallRecord;
use crate::metrics::Metrics;
use crate::pipeline::{ItemExecutor, ItemOutcome};
use crate::work_item::WorkItem;

pub const CALL_NOT_COMPLETED: &str = "Call did not complete";

/// Places one follow-up call per candidate and turns the final call state
/// into an export row. Every item yields a row, failed calls included.
pub struct CallExecutor {
    tracker: CallTracker,
    metrics: Arc<Metrics>,
}

impl CallExecutor {
    pub fn new(tracker: CallTracker, metrics: Arc<Metrics>) -> Self {
        Self { tracker, metrics }
    }
}

#[async_trait]
impl ItemExecutor for CallExecutor {
    fn mode(&self) -> &'static str {
        "call"
    }

    async fn execute(&self, item: &WorkItem) -> ItemOutcome {
        let target = item.phone();
        let mut vars = BTreeMap::new();
        vars.insert("first_name".to_string(), item.first_name());

        info!(item = %item.id(), to = %target, "Calling {}", item.label());
        let tracked = self.tracker.track(item.id(), &target, &vars).await;
        self.metrics.record_polls(tracked.polls);
        info!(
            item = %item.id(),
            state = ?tracked.progress.state(),
            polls = tracked.polls,
            elapsed_ms = tracked.progress.elapsed_ms(),
            path = ?tracked.progress.path(),
            "Call finished"
        );

        let (response, analysis, failure) = match tracked.outcome {
            CallOutcome::Succeeded { payload, .. } => (
                analysis::transcript(&payload),
                CallAnalysis::extract(&payload),
                None,
            ),
            CallOutcome::Failed {
                reason: CallFailure::Initiation(message),
                ..
            } => {
                let failure = CallFailure::Initiation(message.clone()).to_string();
                (message, CallAnalysis::errored(), Some(failure))
            }
            // a terminal error status still carries whatever the call produced
            CallOutcome::Failed {
                reason,
                payload: Some(payload),
                ..
            } => (
                analysis::transcript(&payload),
                CallAnalysis::extract(&payload),
                Some(reason.to_string()),
            ),
            CallOutcome::Failed {
                reason,
                payload: None,
                ..
            } => (
                CALL_NOT_COMPLETED.to_string(),
                CallAnalysis::errored(),
                Some(reason.to_string()),
            ),
        };

        let record = CallRecord {
            full_name: item.full_name(),
            phone_number: target,
            email: item.email(),
            position_applied: item.position_applied(),
            response,
            analysis,
        };
        ItemOutcome::Called { record, failure }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::tracker::TrackerSettings;
    use crate::error::CapabilityError;
    use crate::test_support::{candidate, status_report, RecordingSleeper, ScriptedCallService};
    use serde_json::json;

    fn executor(service: &Arc<ScriptedCallService>) -> CallExecutor {
        let tracker = CallTracker::new(
            service.clone(),
            RecordingSleeper::new(),
            TrackerSettings::default(),
        );
        CallExecutor::new(tracker, Metrics::new())
    }

    fn called(outcome: ItemOutcome) -> (CallRecord, Option<String>) {
        match outcome {
            ItemOutcome::Called { record, failure } => (record, failure),
            other => panic!("expected a call row, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_completed_call_row() {
        let service = Arc::new(ScriptedCallService::with_polls(vec![
            Ok(status_report("ongoing", json!({}))),
            Ok(status_report(
                "ended",
                json!({
                    "transcript": "Agent: Do you have a laptop?\nUser: Yes.",
                    "recording_url": "https://cdn.example.com/rec.wav",
                    "call_analysis": {"custom_analysis_data": {"has_laptop": "yes"}}
                }),
            )),
        ]));
        let exec = executor(&service);

        let (record, failure) = called(exec.execute(&candidate("c-1", "Asha Rao")).await);

        assert!(failure.is_none());
        assert_eq!(record.full_name, "Asha Rao");
        assert_eq!(record.phone_number, "+919000000000");
        assert!(record.response.starts_with("Agent: Do you have a laptop?"));
        assert_eq!(record.analysis.has_laptop, "yes");
        assert_eq!(record.analysis.notice_period, "N/A");
        assert_eq!(record.analysis.recording_link, "https://cdn.example.com/rec.wav");
        assert_eq!(exec.metrics.snapshot().polls_total, 2);

        let initiated = service.initiated();
        assert_eq!(initiated[0].0, "+919000000000");
        assert_eq!(initiated[0].1["first_name"], "Asha");
    }

    #[tokio::test]
    async fn test_initiation_error_in_response_column() {
        let service = Arc::new(ScriptedCallService::failing_initiation(
            CapabilityError::permanent("invalid to_number"),
        ));

        let (record, failure) = called(executor(&service).execute(&candidate("c-1", "Asha Rao")).await);

        assert_eq!(record.response, "invalid to_number");
        assert_eq!(record.analysis, CallAnalysis::errored());
        assert!(failure.unwrap().contains("invalid to_number"));
    }

    #[tokio::test]
    async fn test_timed_out_call_row() {
        let service = Arc::new(ScriptedCallService::default());

        let (record, failure) = called(executor(&service).execute(&candidate("c-1", "Asha Rao")).await);

        assert_eq!(record.response, CALL_NOT_COMPLETED);
        assert_eq!(record.analysis.recording_link, "Error");
        assert!(failure.unwrap().contains("20 polls"));
    }

    #[tokio::test]
    async fn test_error_status_still_extracts() {
        let service = Arc::new(ScriptedCallService::with_polls(vec![Ok(status_report(
            "error",
            json!({"transcript": "Agent: Hello?", "disconnection_reason": "dial_failed"}),
        ))]));

        let (record, failure) = called(executor(&service).execute(&candidate("c-1", "Asha Rao")).await);

        assert_eq!(record.response, "Agent: Hello?");
        assert_eq!(record.analysis.has_laptop, "Error");
        assert!(failure.is_some());
    }
}
