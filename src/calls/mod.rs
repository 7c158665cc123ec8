pub mod analysis;
pub mod executor;
pub mod progress;
pub mod retell;
pub mod tracker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::CapabilityError;

pub use analysis::CallAnalysis;
pub use executor::CallExecutor;
pub use retell::RetellClient;
pub use tracker::{CallTracker, TrackerSettings};

/// Identifies one in-flight call on the external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHandle(pub String);

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Running,
    TerminalSuccess,
    TerminalFailure,
}

impl OperationStatus {
    /// Maps the call service's status vocabulary. Unknown values are
    /// treated as still in progress.
    pub fn from_external(status: &str) -> Self {
        match status {
            "registered" | "queued" => Self::Pending,
            "ended" => Self::TerminalSuccess,
            "error" => Self::TerminalFailure,
            _ => Self::Running,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::TerminalSuccess | Self::TerminalFailure)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: OperationStatus,
    pub payload: Value,
}

/// Asynchronous, long-running call capability.
#[async_trait]
pub trait CallService: Send + Sync {
    /// Starts a call. Fails immediately when the target is not callable.
    async fn initiate(
        &self,
        target: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<OperationHandle, CapabilityError>;

    async fn poll_status(&self, handle: &OperationHandle) -> Result<StatusReport, CapabilityError>;
}

/// One row of the call export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub position_applied: String,
    pub response: String,
    pub analysis: CallAnalysis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_vocabulary() {
        assert_eq!(OperationStatus::from_external("registered"), OperationStatus::Pending);
        assert_eq!(OperationStatus::from_external("ongoing"), OperationStatus::Running);
        assert_eq!(OperationStatus::from_external("ended"), OperationStatus::TerminalSuccess);
        assert_eq!(OperationStatus::from_external("error"), OperationStatus::TerminalFailure);
        assert_eq!(OperationStatus::from_external("something-new"), OperationStatus::Running);
    }

    #[test]
    fn test_terminal_states() {
        assert!(OperationStatus::TerminalSuccess.is_terminal());
        assert!(OperationStatus::TerminalFailure.is_terminal());
        assert!(!OperationStatus::Pending.is_terminal());
        assert!(!OperationStatus::Running.is_terminal());
    }
}
