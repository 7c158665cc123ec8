pub mod gemini;
pub mod ollama;
pub mod prompt;

use async_trait::async_trait;

use crate::error::CapabilityError;
use crate::evaluation::EvaluationResult;

pub use gemini::GeminiScorer;
pub use ollama::OllamaScorer;

/// Synchronous scoring capability: one evaluation per call.
///
/// Implementations report every failure as [`CapabilityError::Transient`];
/// the retry layer decides when to give up.
#[async_trait]
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, context: &str, profile: &str) -> Result<EvaluationResult, CapabilityError>;
}

/// Keeps error bodies readable in logs and failure entries.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX_BODY_CHARS: usize = 500;
    if body.chars().count() <= MAX_BODY_CHARS {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_BODY_CHARS).collect();
        format!("{}... [truncated]", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_short() {
        assert_eq!(truncate_body("bad request"), "bad request");
    }

    #[test]
    fn test_truncate_body_long_multibyte() {
        let body = "é".repeat(600);
        let t = truncate_body(&body);
        assert!(t.ends_with("[truncated]"));
        assert_eq!(t.chars().filter(|c| *c == 'é').count(), 500);
    }
}
