//! Drives one asynchronous call to a terminal state.
//!
//! `NotStarted -> Initiating -> Polling -> {Succeeded, Failed}`. Initiation
//! is attempted once. Polling runs at a fixed interval up to `max_polls`
//! queries; any terminal status is followed by a quiescence wait before the
//! payload is treated as final, because the analysis data lags the status.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::progress::{CallProgress, CallState};
use super::{CallService, OperationHandle, OperationStatus};
use crate::clock::Sleeper;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_POLLS: u32 = 20;
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub quiescence: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            quiescence: DEFAULT_QUIESCENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    /// The call could not be started; carries the service's message.
    Initiation(String),
    /// The service reported a terminal error status.
    EndedWithError,
    TimedOut { polls: u32 },
    /// A poll was rejected as permanently failed.
    Polling(String),
}

impl std::fmt::Display for CallFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initiation(msg) => write!(f, "call initiation failed: {}", msg),
            Self::EndedWithError => f.write_str("call ended with an error status"),
            Self::TimedOut { polls } => {
                write!(f, "call did not reach a terminal status after {} polls", polls)
            }
            Self::Polling(msg) => write!(f, "status polling failed: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Succeeded {
        handle: OperationHandle,
        payload: Value,
    },
    Failed {
        handle: Option<OperationHandle>,
        reason: CallFailure,
        /// Final payload when the service returned one (terminal error status).
        payload: Option<Value>,
    },
}

#[derive(Debug)]
pub struct TrackedCall {
    pub outcome: CallOutcome,
    pub polls: u32,
    pub progress: CallProgress,
}

pub struct CallTracker {
    service: Arc<dyn CallService>,
    sleeper: Arc<dyn Sleeper>,
    settings: TrackerSettings,
}

impl CallTracker {
    pub fn new(
        service: Arc<dyn CallService>,
        sleeper: Arc<dyn Sleeper>,
        settings: TrackerSettings,
    ) -> Self {
        Self {
            service,
            sleeper,
            settings,
        }
    }

    pub async fn track(
        &self,
        item_id: &str,
        target: &str,
        vars: &BTreeMap<String, String>,
    ) -> TrackedCall {
        let mut progress = CallProgress::new(item_id);
        progress.transition_to(CallState::Initiating);

        let handle = match self.service.initiate(target, vars).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(item = %item_id, error = %e, "Call initiation failed");
                progress.transition_to(CallState::Failed);
                return TrackedCall {
                    outcome: CallOutcome::Failed {
                        handle: None,
                        reason: CallFailure::Initiation(e.to_string()),
                        payload: None,
                    },
                    polls: 0,
                    progress,
                };
            }
        };

        info!(item = %item_id, call_id = %handle, "Call initiated");
        progress.transition_to(CallState::Polling);

        let max_polls = self.settings.max_polls;
        let mut polls = 0u32;

        while polls < max_polls {
            polls += 1;
            match self.service.poll_status(&handle).await {
                Ok(report) if report.status.is_terminal() => {
                    debug!(
                        item = %item_id,
                        call_id = %handle,
                        status = ?report.status,
                        polls = polls,
                        "Call reached terminal status"
                    );
                    self.sleeper.sleep(self.settings.quiescence).await;

                    let outcome = if report.status == OperationStatus::TerminalSuccess {
                        progress.transition_to(CallState::Succeeded);
                        CallOutcome::Succeeded {
                            handle,
                            payload: report.payload,
                        }
                    } else {
                        progress.transition_to(CallState::Failed);
                        CallOutcome::Failed {
                            handle: Some(handle),
                            reason: CallFailure::EndedWithError,
                            payload: Some(report.payload),
                        }
                    };
                    return TrackedCall {
                        outcome,
                        polls,
                        progress,
                    };
                }
                Ok(report) => {
                    debug!(
                        item = %item_id,
                        status = ?report.status,
                        poll = polls,
                        max_polls = max_polls,
                        "Call still in progress"
                    );
                }
                Err(e) if !e.is_retryable() => {
                    warn!(item = %item_id, call_id = %handle, error = %e, "Status polling failed");
                    progress.transition_to(CallState::Failed);
                    return TrackedCall {
                        outcome: CallOutcome::Failed {
                            handle: Some(handle),
                            reason: CallFailure::Polling(e.to_string()),
                            payload: None,
                        },
                        polls,
                        progress,
                    };
                }
                Err(e) => {
                    warn!(item = %item_id, poll = polls, error = %e, "Status poll failed, will poll again");
                }
            }

            if polls < max_polls {
                self.sleeper.sleep(self.settings.poll_interval).await;
            }
        }

        warn!(item = %item_id, call_id = %handle, polls = polls, "Call timed out");
        progress.transition_to(CallState::Failed);
        TrackedCall {
            outcome: CallOutcome::Failed {
                handle: Some(handle),
                reason: CallFailure::TimedOut { polls },
                payload: None,
            },
            polls,
            progress,
        }
    }
}
