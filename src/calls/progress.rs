use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    NotStarted,
    Initiating,
    Polling,
    Succeeded,
    Failed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: CallState,
    pub to: CallState,
    pub elapsed_ms: u64,
}

/// Tracks one call through its state machine.
#[derive(Debug)]
pub struct CallProgress {
    item_id: String,
    state: CallState,
    started_at: Instant,
    last_transition: Instant,
    transitions: Vec<StateTransition>,
}

impl CallProgress {
    pub fn new(item_id: impl Into<String>) -> Self {
        let now = Instant::now();
        Self {
            item_id: item_id.into(),
            state: CallState::NotStarted,
            started_at: now,
            last_transition: now,
            transitions: Vec::new(),
        }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Ignored once a terminal state has been reached.
    pub fn transition_to(&mut self, next: CallState) {
        if self.state.is_terminal() {
            return;
        }
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_transition).as_millis() as u64;

        debug!(
            item = %self.item_id,
            from = ?self.state,
            to = ?next,
            elapsed_ms = %elapsed,
            "Call state transition"
        );

        self.transitions.push(StateTransition {
            from: self.state,
            to: next,
            elapsed_ms: elapsed,
        });
        self.state = next;
        self.last_transition = now;
    }

    pub fn path(&self) -> Vec<CallState> {
        std::iter::once(CallState::NotStarted)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }
}
