//! Fakes shared by the in-module test suites.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::calls::{CallRecord, CallService, OperationHandle, OperationStatus, StatusReport};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::clock::Sleeper;
use crate::error::{CapabilityError, CheckpointError};
use crate::evaluation::{EvaluationResult, ResultRecord};
use crate::scoring::Scorer;
use crate::sink::{CallRecordSink, FailureEntry, FailureSink, ResultSink};
use crate::work_item::WorkItem;

/// Records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}

#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<String, Checkpoint>>,
    saves: Mutex<Vec<usize>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, run_key: &str) -> Option<Checkpoint> {
        self.entries.lock().get(run_key).cloned()
    }

    pub fn put(&self, run_key: &str, checkpoint: Checkpoint) {
        self.entries.lock().insert(run_key.to_string(), checkpoint);
    }

    /// `next_index` of every save, in order.
    pub fn saved_indices(&self) -> Vec<usize> {
        self.saves.lock().clone()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, run_key: &str) -> Option<Checkpoint> {
        self.get(run_key)
    }

    async fn save(&self, run_key: &str, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.saves.lock().push(checkpoint.next_index);
        self.put(run_key, checkpoint.clone());
        Ok(())
    }

    async fn clear(&self, run_key: &str) -> Result<(), CheckpointError> {
        self.entries.lock().remove(run_key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFailureSink {
    entries: Mutex<Vec<FailureEntry>>,
}

impl MemoryFailureSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<FailureEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl FailureSink for MemoryFailureSink {
    async fn record(&self, entry: &FailureEntry) -> anyhow::Result<()> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryResultSink {
    emitted: Mutex<Option<(Vec<ResultRecord>, Vec<ResultRecord>)>>,
}

impl MemoryResultSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn emitted(&self) -> Option<(Vec<ResultRecord>, Vec<ResultRecord>)> {
        self.emitted.lock().clone()
    }
}

#[async_trait]
impl ResultSink for MemoryResultSink {
    async fn emit(&self, accepted: &[ResultRecord], rejected: &[ResultRecord]) -> anyhow::Result<()> {
        *self.emitted.lock() = Some((accepted.to_vec(), rejected.to_vec()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCallSink {
    rows: Mutex<Vec<CallRecord>>,
}

impl MemoryCallSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rows(&self) -> Vec<CallRecord> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl CallRecordSink for MemoryCallSink {
    async fn append(&self, rows: &[CallRecord]) -> anyhow::Result<()> {
        self.rows.lock().extend_from_slice(rows);
        Ok(())
    }
}

pub fn candidate(id: &str, full_name: &str) -> WorkItem {
    let first_name = full_name.split_whitespace().next().unwrap_or_default();
    let value = json!({
        "id": id,
        "Full_Name": full_name,
        "First_Name": first_name,
        "Email": format!("{}@example.com", id),
        "Phone": "+919000000000",
        "Current_Job_Title": "Frontend Engineer",
        "Experience_in_Years": 6,
        "Skill_Set": "React, TypeScript",
    });
    WorkItem::from_value(0, value).unwrap()
}

pub fn evaluation_json(recommendation: &str, score: f64) -> Value {
    json!({
        "score": score,
        "recommendation": recommendation,
        "reasoning": "evaluated",
        "strong_points": ["react"],
        "areas_of_concern": [],
    })
}

#[derive(Debug, Clone)]
pub enum ScoreScript {
    Reply(Value),
    /// Fails transiently `n` times, then replies.
    FailThenReply(u32, Value),
    AlwaysFail,
    Permanent,
    /// Never completes, like a scorer call in flight when the process dies.
    Hang,
}

/// Scorer whose behaviour is scripted per candidate name. Unscripted
/// candidates get a rejection.
#[derive(Default)]
pub struct ScriptedScorer {
    scripts: Mutex<HashMap<String, ScoreScript>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedScorer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, full_name: &str, script: ScoreScript) {
        self.scripts.lock().insert(full_name.to_string(), script);
    }

    pub fn calls(&self, full_name: &str) -> u32 {
        self.calls.lock().get(full_name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Scorer for ScriptedScorer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn score(&self, _context: &str, profile: &str) -> Result<EvaluationResult, CapabilityError> {
        let name = profile
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("Name: "))
            .unwrap_or_default()
            .to_string();
        let attempt = {
            let mut calls = self.calls.lock();
            let count = calls.entry(name.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let script = self
            .scripts
            .lock()
            .get(&name)
            .cloned()
            .unwrap_or_else(|| ScoreScript::Reply(evaluation_json("Reject", 3.0)));

        match script {
            ScoreScript::Reply(value) => Ok(EvaluationResult::from_value(&value)),
            ScoreScript::FailThenReply(failures, value) => {
                if attempt <= failures {
                    Err(CapabilityError::transient("scorer overloaded"))
                } else {
                    Ok(EvaluationResult::from_value(&value))
                }
            }
            ScoreScript::AlwaysFail => Err(CapabilityError::transient("scorer unavailable")),
            ScoreScript::Permanent => Err(CapabilityError::permanent("request rejected")),
            ScoreScript::Hang => std::future::pending().await,
        }
    }
}

pub fn status_report(status: &str, payload: Value) -> StatusReport {
    StatusReport {
        status: OperationStatus::from_external(status),
        payload,
    }
}

/// Replays scripted initiation and poll results. Once the script runs out
/// every poll reports `registered`.
#[derive(Default)]
pub struct ScriptedCallService {
    initiate_error: Option<CapabilityError>,
    polls: Mutex<VecDeque<Result<StatusReport, CapabilityError>>>,
    poll_count: Mutex<u32>,
    initiated: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

impl ScriptedCallService {
    pub fn with_statuses(statuses: &[&str]) -> Self {
        let polls = statuses
            .iter()
            .map(|s| Ok(status_report(s, json!({"call_status": s}))))
            .collect();
        Self::with_polls(polls)
    }

    pub fn with_polls(polls: Vec<Result<StatusReport, CapabilityError>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            ..Default::default()
        }
    }

    pub fn failing_initiation(err: CapabilityError) -> Self {
        Self {
            initiate_error: Some(err),
            ..Default::default()
        }
    }

    pub fn poll_count(&self) -> u32 {
        *self.poll_count.lock()
    }

    /// Target and dynamic variables of every initiation, in order.
    pub fn initiated(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.initiated.lock().clone()
    }
}

#[async_trait]
impl CallService for ScriptedCallService {
    async fn initiate(
        &self,
        target: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<OperationHandle, CapabilityError> {
        let mut initiated = self.initiated.lock();
        initiated.push((target.to_string(), vars.clone()));
        match &self.initiate_error {
            Some(err) => Err(err.clone()),
            None => Ok(OperationHandle(format!("call-{}", initiated.len()))),
        }
    }

    async fn poll_status(&self, _handle: &OperationHandle) -> Result<StatusReport, CapabilityError> {
        *self.poll_count.lock() += 1;
        self.polls.lock().pop_front().unwrap_or_else(|| {
            Ok(status_report(
                "registered",
                json!({"call_status": "registered"}),
            ))
        })
    }
}
