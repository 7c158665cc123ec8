use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::work_item::WorkItem;

pub const DEFAULT_POSITIVE_LABEL: &str = "Shortlist";
pub const DEFAULT_NEGATIVE_LABEL: &str = "Reject";
const DEFAULT_REASONING: &str = "No detailed reasoning";

/// Raw scorer reply. Every field is optional because the scorer is a
/// language model and its JSON is only loosely trustworthy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub score: Option<f64>,
    pub recommendation: Option<String>,
    pub reasoning: Option<String>,
    pub strong_points: Vec<String>,
    pub areas_of_concern: Vec<String>,
}

impl EvaluationResult {
    /// Lenient read of a scorer reply; wrongly typed fields are dropped.
    pub fn from_value(value: &Value) -> Self {
        // non-finite scores cannot be written back as JSON numbers
        let score = match value.get("score") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
        .filter(|f: &f64| f.is_finite());

        Self {
            score,
            recommendation: value
                .get("recommendation")
                .and_then(Value::as_str)
                .map(str::to_string),
            reasoning: value
                .get("reasoning")
                .and_then(Value::as_str)
                .map(str::to_string),
            strong_points: text_list(value.get("strong_points")),
            areas_of_concern: text_list(value.get("areas_of_concern")),
        }
    }
}

fn text_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Accepted,
    Rejected,
}

/// Normalized, immutable screening result for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub item_id: String,
    pub phone: String,
    pub email: String,
    pub full_name: String,
    pub first_name: String,
    pub last_name: String,
    pub position_applied: String,
    pub score: f64,
    pub recommendation: String,
    pub reasoning: String,
    pub strong_points: Vec<String>,
    pub areas_of_concern: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ResultClassifier {
    positive_label: String,
}

impl Default for ResultClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_POSITIVE_LABEL)
    }
}

impl ResultClassifier {
    pub fn new(positive_label: impl Into<String>) -> Self {
        Self {
            positive_label: positive_label.into(),
        }
    }

    /// Exact, case-sensitive match on the positive label. Anything else,
    /// including a missing recommendation, is a rejection.
    pub fn classify(&self, result: &EvaluationResult) -> Bucket {
        match result.recommendation.as_deref() {
            Some(label) if label == self.positive_label => Bucket::Accepted,
            _ => Bucket::Rejected,
        }
    }

    pub fn resolve(&self, item: &WorkItem, result: EvaluationResult) -> (Bucket, ResultRecord) {
        let bucket = self.classify(&result);
        debug!(
            item = %item.id(),
            recommendation = ?result.recommendation,
            bucket = ?bucket,
            "Classified evaluation"
        );

        let record = ResultRecord {
            item_id: item.id().to_string(),
            phone: item.phone(),
            email: item.email(),
            full_name: item.full_name(),
            first_name: item.first_name(),
            last_name: item.last_name(),
            position_applied: item.position_applied(),
            score: result.score.unwrap_or(0.0),
            recommendation: result
                .recommendation
                .unwrap_or_else(|| DEFAULT_NEGATIVE_LABEL.to_string()),
            reasoning: result
                .reasoning
                .unwrap_or_else(|| DEFAULT_REASONING.to_string()),
            strong_points: result.strong_points,
            areas_of_concern: result.areas_of_concern,
        };

        (bucket, record)
    }
}
