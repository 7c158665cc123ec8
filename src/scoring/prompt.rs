use serde_json::Value;

use crate::error::CapabilityError;
use crate::evaluation::EvaluationResult;

pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are an expert technical recruiter evaluating a candidate against a job description.
Be rigorous and default to rejection unless the candidate clearly meets the bar.
Score the candidate out of 10; 8 or more is the shortlist threshold.

Respond with a single JSON object containing exactly these keys:
- score: total score out of 10
- recommendation: \"Shortlist\" or \"Reject\"
- reasoning: detailed explanation of the decision
- strong_points: list of concrete strengths
- areas_of_concern: list of skill or experience gaps";

pub fn user_message(context: &str, profile: &str) -> String {
    format!(
        "Job Description:\n{}\n\nCandidate Profile:\n{}\n\nProvide a comprehensive evaluation in strict JSON format.",
        context.trim(),
        profile.trim()
    )
}

/// Parses the model's text reply. Models like to wrap JSON in markdown
/// fences, so those are stripped first. A reply that is not a JSON object
/// is a transient failure and gets retried.
pub fn parse_reply(text: &str) -> Result<EvaluationResult, CapabilityError> {
    let body = strip_fences(text);
    let value: Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(CapabilityError::transient(format!(
            "Expected a JSON object from scorer, got: {}",
            super::truncate_body(body)
        )));
    }
    Ok(EvaluationResult::from_value(&value))
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
