use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

use super::{CallService, OperationHandle, OperationStatus, StatusReport};
use crate::error::CapabilityError;
use crate::scoring::truncate_body;

const RETELL_API_BASE: &str = "https://api.retellai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct CreateCallResponse {
    call_id: String,
}

/// Phone-call service backed by the Retell REST API.
pub struct RetellClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from_number: String,
}

impl RetellClient {
    pub fn new(api_key: String, from_number: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client for Retell")?;
        Ok(Self {
            client,
            base_url: RETELL_API_BASE.to_string(),
            api_key,
            from_number,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Client errors other than rate limiting will not improve on retry.
fn is_permanent(status: StatusCode) -> bool {
    status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS
}

async fn http_error(resp: reqwest::Response, what: &str) -> CapabilityError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let message = format!(
        "{} returned HTTP {}: {}",
        what,
        status.as_u16(),
        truncate_body(&body)
    );
    if is_permanent(status) {
        CapabilityError::permanent(message)
    } else {
        CapabilityError::transient(message)
    }
}

#[async_trait]
impl CallService for RetellClient {
    async fn initiate(
        &self,
        target: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<OperationHandle, CapabilityError> {
        let body = json!({
            "from_number": self.from_number,
            "to_number": target,
            "retell_llm_dynamic_variables": vars,
        });
        debug!(to = %target, "Creating Retell phone call");

        let resp = self
            .client
            .post(self.url("/v2/create-phone-call"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(http_error(resp, "create-phone-call").await);
        }

        let created: CreateCallResponse = resp.json().await?;
        Ok(OperationHandle(created.call_id))
    }

    async fn poll_status(&self, handle: &OperationHandle) -> Result<StatusReport, CapabilityError> {
        let resp = self
            .client
            .get(self.url(&format!("/v2/get-call/{}", handle.0)))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(http_error(resp, "get-call").await);
        }

        let payload: Value = resp.json().await?;
        let status = payload
            .get("call_status")
            .and_then(Value::as_str)
            .map(OperationStatus::from_external)
            .ok_or_else(|| CapabilityError::transient("get-call response has no call_status"))?;

        Ok(StatusReport { status, payload })
    }
}
