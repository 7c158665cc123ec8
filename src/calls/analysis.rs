use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

pub const NOT_AVAILABLE: &str = "N/A";
pub const EXTRACTION_ERROR: &str = "Error";
pub const NO_TRANSCRIPT: &str = "No transcript available";

#[derive(Debug, Error)]
enum ExtractionError {
    #[error("payload has no `{0}` object")]
    MissingSection(&'static str),
}

/// Structured answers pulled out of a finished call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAnalysis {
    pub has_laptop: String,
    pub expected_salary: String,
    pub notice_period: String,
    pub working_hours: String,
    pub recording_link: String,
}

impl CallAnalysis {
    /// Every column marked as an error, used when no usable payload exists.
    pub fn errored() -> Self {
        Self::errored_with_recording(EXTRACTION_ERROR.to_string())
    }

    fn errored_with_recording(recording_link: String) -> Self {
        Self {
            has_laptop: EXTRACTION_ERROR.to_string(),
            expected_salary: EXTRACTION_ERROR.to_string(),
            notice_period: EXTRACTION_ERROR.to_string(),
            working_hours: EXTRACTION_ERROR.to_string(),
            recording_link,
        }
    }

    /// Extracts the analysis from a final call payload. Absent fields become
    /// `N/A`; a payload without the analysis section degrades every field
    /// to `Error` instead of failing the item.
    pub fn extract(payload: &Value) -> Self {
        match try_extract(payload) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Error extracting post-call data: {}", e);
                let recording = payload
                    .get("recording_url")
                    .and_then(field_text)
                    .unwrap_or_else(|| EXTRACTION_ERROR.to_string());
                Self::errored_with_recording(recording)
            }
        }
    }
}

fn try_extract(payload: &Value) -> Result<CallAnalysis, ExtractionError> {
    let data = payload
        .get("call_analysis")
        .and_then(Value::as_object)
        .ok_or(ExtractionError::MissingSection("call_analysis"))?
        .get("custom_analysis_data")
        .and_then(Value::as_object)
        .ok_or(ExtractionError::MissingSection("custom_analysis_data"))?;

    Ok(CallAnalysis {
        has_laptop: field(data, "has_laptop"),
        expected_salary: field(data, "expected_salary"),
        notice_period: field(data, "notice_period"),
        working_hours: field(data, "working_hours"),
        recording_link: payload
            .get("recording_url")
            .and_then(field_text)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    })
}

fn field(data: &Map<String, Value>, key: &str) -> String {
    data.get(key)
        .and_then(field_text)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn transcript(payload: &Value) -> String {
    payload
        .get("transcript")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| NO_TRANSCRIPT.to_string())
}
