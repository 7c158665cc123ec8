use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{prompt, truncate_body, Scorer};
use crate::error::CapabilityError;
use crate::evaluation::EvaluationResult;

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const TEMPERATURE: f64 = 0.2;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Local scorer talking to an Ollama server's `/api/generate`.
pub struct OllamaScorer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    system_prompt: String,
}

impl OllamaScorer {
    pub fn new(base_url: String, model: String, system_prompt: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client for Ollama")?;
        Ok(Self {
            client,
            base_url,
            model,
            system_prompt,
        })
    }

    fn request_body(&self, context: &str, profile: &str) -> Value {
        json!({
            "model": self.model,
            "system": self.system_prompt,
            "prompt": prompt::user_message(context, profile),
            "format": "json",
            "stream": false,
            "options": { "temperature": TEMPERATURE }
        })
    }
}

#[async_trait]
impl Scorer for OllamaScorer {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn score(&self, context: &str, profile: &str) -> Result<EvaluationResult, CapabilityError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        debug!(model = %self.model, "Requesting Ollama evaluation: {}", url);

        let resp = self
            .client
            .post(&url)
            .json(&self.request_body(context, profile))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CapabilityError::transient(format!(
                "Ollama returned HTTP {}: {}",
                status.as_u16(),
                truncate_body(&body)
            )));
        }

        let response: GenerateResponse = resp.json().await?;
        prompt::parse_reply(&response.response)
    }
}
