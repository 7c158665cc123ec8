use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::ResultClassifier;
use crate::metrics::Metrics;
use crate::pipeline::{ItemExecutor, ItemOutcome};
use crate::retry::{RetryController, RetryOutcome};
use crate::scoring::Scorer;
use crate::work_item::WorkItem;

/// Scores one candidate against the evaluation context, retrying transient
/// scorer failures, and buckets the reply.
pub struct EvaluationExecutor {
    scorer: Arc<dyn Scorer>,
    retry: RetryController,
    classifier: ResultClassifier,
    context: String,
    metrics: Arc<Metrics>,
}

impl EvaluationExecutor {
    pub fn new(
        scorer: Arc<dyn Scorer>,
        retry: RetryController,
        classifier: ResultClassifier,
        context: String,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            scorer,
            retry,
            classifier,
            context,
            metrics,
        }
    }
}

#[async_trait]
impl ItemExecutor for EvaluationExecutor {
    fn mode(&self) -> &'static str {
        "evaluate"
    }

    async fn execute(&self, item: &WorkItem) -> ItemOutcome {
        let profile = item.render_profile();
        let scorer = &self.scorer;
        let context = self.context.as_str();
        let profile = profile.as_str();

        let outcome = self
            .retry
            .run(item.id(), move || scorer.score(context, profile))
            .await;
        self.metrics.record_attempts(outcome.attempts());

        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                let (bucket, record) = self.classifier.resolve(item, value);
                info!(
                    item = %item.id(),
                    scorer = %self.scorer.name(),
                    attempts = attempts,
                    score = record.score,
                    recommendation = %record.recommendation,
                    "Evaluated {}",
                    item.label()
                );
                ItemOutcome::Classified { bucket, record }
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => ItemOutcome::Failed {
                error: format!("failed after {} attempts: {}", attempts, last_error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Bucket;
    use crate::retry::RetryPolicy;
    use crate::test_support::{candidate, evaluation_json, RecordingSleeper, ScoreScript, ScriptedScorer};
    use std::time::Duration;

    fn executor(scorer: &Arc<ScriptedScorer>, sleeper: &Arc<RecordingSleeper>) -> EvaluationExecutor {
        EvaluationExecutor::new(
            scorer.clone(),
            RetryController::new(RetryPolicy::default(), sleeper.clone()),
            ResultClassifier::default(),
            "Senior frontend engineer, React".to_string(),
            Metrics::new(),
        )
    }

    #[tokio::test]
    async fn test_shortlisted_candidate_accepted() {
        let scorer = ScriptedScorer::new();
        scorer.set("Asha Rao", ScoreScript::Reply(evaluation_json("Shortlist", 8.5)));
        let sleeper = RecordingSleeper::new();

        let outcome = executor(&scorer, &sleeper)
            .execute(&candidate("c-1", "Asha Rao"))
            .await;

        match outcome {
            ItemOutcome::Classified { bucket, record } => {
                assert_eq!(bucket, Bucket::Accepted);
                assert_eq!(record.item_id, "c-1");
                assert_eq!(record.score, 8.5);
            }
            other => panic!("expected classification, got {:?}", other),
        }
        assert_eq!(scorer.calls("Asha Rao"), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let scorer = ScriptedScorer::new();
        scorer.set(
            "Ravi Kumar",
            ScoreScript::FailThenReply(2, evaluation_json("Reject", 4.0)),
        );
        let sleeper = RecordingSleeper::new();
        let exec = executor(&scorer, &sleeper);

        let outcome = exec.execute(&candidate("c-2", "Ravi Kumar")).await;

        assert!(matches!(
            outcome,
            ItemOutcome::Classified {
                bucket: Bucket::Rejected,
                ..
            }
        ));
        assert_eq!(scorer.calls("Ravi Kumar"), 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );
        assert_eq!(exec.metrics.snapshot().retries_total, 2);
    }

    #[tokio::test]
    async fn test_exhausted_item_fails() {
        let scorer = ScriptedScorer::new();
        scorer.set("Meera Iyer", ScoreScript::AlwaysFail);
        let sleeper = RecordingSleeper::new();

        let outcome = executor(&scorer, &sleeper)
            .execute(&candidate("c-3", "Meera Iyer"))
            .await;

        assert_eq!(
            outcome,
            ItemOutcome::Failed {
                error: "failed after 3 attempts: scorer unavailable".to_string()
            }
        );
        assert_eq!(scorer.calls("Meera Iyer"), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let scorer = ScriptedScorer::new();
        scorer.set("Meera Iyer", ScoreScript::Permanent);
        let sleeper = RecordingSleeper::new();

        let outcome = executor(&scorer, &sleeper)
            .execute(&candidate("c-3", "Meera Iyer"))
            .await;

        assert!(matches!(outcome, ItemOutcome::Failed { .. }));
        assert_eq!(scorer.calls("Meera Iyer"), 1);
        assert!(sleeper.recorded().is_empty());
    }
}
