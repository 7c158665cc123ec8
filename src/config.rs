use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::calls::TrackerSettings;
use crate::checkpoint::encode_run_key;
use crate::evaluation::classifier::DEFAULT_POSITIVE_LABEL;
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};
use crate::scoring::prompt::DEFAULT_SYSTEM_PROMPT;

const DEFAULT_RUN_KEY: &str = "default";
const DEFAULT_INPUT_PATH: &str = "json/detailed_candidates.json";
const DEFAULT_STATE_DIR: &str = "json";
const DEFAULT_CSV_PATH: &str = "csv/candidate_responses.csv";
const DEFAULT_BASE_DELAY_SECS: u64 = 5;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_MAX_POLLS: u32 = 20;
const DEFAULT_QUIESCENCE_SECS: u64 = 10;
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    Evaluate,
    Call,
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "evaluate" | "eval" | "score" => Ok(Self::Evaluate),
            "call" | "calls" => Ok(Self::Call),
            other => Err(format!("unknown pipeline mode: {}", other)),
        }
    }
}

impl std::fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Evaluate => "evaluate",
            Self::Call => "call",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerBackend {
    Gemini,
    Ollama,
}

impl FromStr for ScorerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" | "local" => Ok(Self::Ollama),
            other => Err(format!("unknown scorer backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: PipelineMode,
    pub run_key: String,
    pub input_path: PathBuf,
    pub job_description_path: Option<PathBuf>,
    pub system_prompt_path: Option<PathBuf>,
    pub state_dir: PathBuf,
    pub csv_path: PathBuf,
    pub positive_label: String,
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub poll_interval_secs: u64,
    pub max_polls: u32,
    pub quiescence_secs: u64,
    pub scorer_backend: ScorerBackend,
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub retell_api_key: Option<String>,
    pub retell_from_number: Option<String>,
    pub status_port: Option<u16>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let var = &var;
        Self {
            mode: env_parse(var, "PIPELINE_MODE", PipelineMode::Evaluate),
            run_key: env_string(var, "RUN_KEY", DEFAULT_RUN_KEY),
            input_path: PathBuf::from(env_string(var, "INPUT_PATH", DEFAULT_INPUT_PATH)),
            job_description_path: var("JOB_DESCRIPTION_PATH").map(PathBuf::from),
            system_prompt_path: var("SYSTEM_PROMPT_PATH").map(PathBuf::from),
            state_dir: PathBuf::from(env_string(var, "STATE_DIR", DEFAULT_STATE_DIR)),
            csv_path: PathBuf::from(env_string(var, "CSV_PATH", DEFAULT_CSV_PATH)),
            positive_label: env_string(var, "POSITIVE_LABEL", DEFAULT_POSITIVE_LABEL),
            max_attempts: env_parse(var, "MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
            base_delay_secs: env_parse(var, "BASE_DELAY_SECS", DEFAULT_BASE_DELAY_SECS),
            poll_interval_secs: env_parse(var, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS),
            max_polls: env_parse(var, "MAX_POLLS", DEFAULT_MAX_POLLS),
            quiescence_secs: env_parse(var, "QUIESCENCE_SECS", DEFAULT_QUIESCENCE_SECS),
            scorer_backend: env_parse(var, "SCORER_BACKEND", ScorerBackend::Gemini),
            google_api_key: var("GOOGLE_API_KEY"),
            gemini_model: env_string(var, "GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            ollama_url: env_string(var, "OLLAMA_URL", DEFAULT_OLLAMA_URL),
            ollama_model: env_string(var, "OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL),
            retell_api_key: var("RETELL_API_KEY"),
            retell_from_number: var("RETELL_FROM_NUMBER"),
            status_port: var("STATUS_PORT").and_then(|v| v.parse().ok()),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.base_delay_secs))
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_polls: self.max_polls.max(1),
            quiescence: Duration::from_secs(self.quiescence_secs),
        }
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.state_dir.join("checkpoints")
    }

    pub fn failure_log_path(&self) -> PathBuf {
        self.state_dir.join(format!(
            "{}-{}.failures.ndjson",
            self.mode,
            encode_run_key(&self.run_key)
        ))
    }

    /// Evaluation context handed to the scorer with every profile.
    pub async fn load_job_description(&self) -> Result<String> {
        match &self.job_description_path {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read job description {}", path.display())),
            None => anyhow::bail!("JOB_DESCRIPTION_PATH must be set in evaluate mode"),
        }
    }

    pub async fn load_system_prompt(&self) -> Result<String> {
        match &self.system_prompt_path {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt {}", path.display())),
            None => Ok(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    pub fn print_banner(&self) {
        let scorer = match self.scorer_backend {
            ScorerBackend::Gemini => format!("gemini ({})", self.gemini_model),
            ScorerBackend::Ollama => format!("ollama ({})", self.ollama_model),
        };
        let status = self
            .status_port
            .map(|p| format!("port {}", p))
            .unwrap_or_else(|| "disabled".to_string());

        tracing::info!("╔══════════════════════════════════════════════════╗");
        tracing::info!("║           screening-runner v{}                ║", env!("CARGO_PKG_VERSION"));
        tracing::info!("╠══════════════════════════════════════════════════╣");
        tracing::info!("║  Mode:              {:<28}║", self.mode);
        tracing::info!("║  Run key:           {:<28}║", self.run_key);
        tracing::info!("║  Input:             {:<28}║", self.input_path.display());
        tracing::info!("║  State dir:         {:<28}║", self.state_dir.display());
        tracing::info!("║  Max attempts:      {:<28}║", self.max_attempts);
        tracing::info!("║  Base delay:        {:<25}s ║", self.base_delay_secs);
        match self.mode {
            PipelineMode::Evaluate => {
                tracing::info!("║  Scorer:            {:<28}║", scorer);
                tracing::info!("║  Accept label:      {:<28}║", self.positive_label);
            }
            PipelineMode::Call => {
                tracing::info!("║  Poll interval:     {:<25}s ║", self.poll_interval_secs);
                tracing::info!("║  Max polls:         {:<28}║", self.max_polls);
                tracing::info!("║  CSV export:        {:<28}║", self.csv_path.display());
            }
        }
        tracing::info!("║  Status server:     {:<28}║", status);
        tracing::info!("╚══════════════════════════════════════════════════╝");
    }
}

fn env_parse<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(var: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    var(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
