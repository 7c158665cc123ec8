use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{prompt, truncate_body, Scorer};
use crate::error::CapabilityError;
use crate::evaluation::EvaluationResult;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const TEMPERATURE: f64 = 0.1;

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GenerateCandidate>,
}

#[derive(Debug, Deserialize)]
struct GenerateCandidate {
    content: Option<GenerateContent>,
}

#[derive(Debug, Deserialize)]
struct GenerateContent {
    #[serde(default)]
    parts: Vec<GeneratePart>,
}

#[derive(Debug, Deserialize)]
struct GeneratePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

/// Hosted scorer backed by the Gemini `generateContent` endpoint.
pub struct GeminiScorer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
}

impl GeminiScorer {
    pub fn new(api_key: String, model: String, system_prompt: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client for Gemini")?;
        Ok(Self {
            client,
            base_url: GEMINI_API_BASE.to_string(),
            api_key,
            model,
            system_prompt,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(&self, context: &str, profile: &str) -> Value {
        json!({
            "systemInstruction": {
                "parts": [{ "text": self.system_prompt }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt::user_message(context, profile) }]
            }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "responseMimeType": "application/json"
            }
        })
    }
}

#[async_trait]
impl Scorer for GeminiScorer {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn score(&self, context: &str, profile: &str) -> Result<EvaluationResult, CapabilityError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        debug!("Requesting Gemini evaluation: {}", url);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(context, profile))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CapabilityError::transient(format!(
                "Gemini API returned HTTP {}: {}",
                status.as_u16(),
                truncate_body(&body)
            )));
        }

        let response: GenerateResponse = resp.json().await?;
        let text = response
            .text()
            .ok_or_else(|| CapabilityError::transient("Gemini returned no candidate text"))?;
        prompt::parse_reply(&text)
    }
}
