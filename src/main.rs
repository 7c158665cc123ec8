mod calls;
mod checkpoint;
mod cleanup;
mod clock;
mod config;
mod error;
mod evaluation;
mod handlers;
mod metrics;
mod pipeline;
mod retry;
mod scoring;
mod sink;
mod work_item;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::calls::{CallExecutor, CallTracker, RetellClient};
use crate::checkpoint::{checkpoint_file_name, FileCheckpointStore};
use crate::clock::TokioSleeper;
use crate::config::{Config, PipelineMode, ScorerBackend};
use crate::evaluation::{EvaluationExecutor, ResultClassifier};
use crate::metrics::Metrics;
use crate::pipeline::{ItemExecutor, PipelineDriver};
use crate::retry::RetryController;
use crate::scoring::{GeminiScorer, OllamaScorer, Scorer};
use crate::sink::{CsvCallSink, JsonResultSink, NdjsonFailureLog};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("screening_runner=info".parse().unwrap()),
        )
        .init();

    let config = config::Config::from_env();
    config.print_banner();

    tokio::select! {
        result = run(config) => {
            if let Err(e) = result {
                error!("Run failed: {:#}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, progress is kept in the last checkpoint");
            std::process::exit(130);
        }
    }

    info!("Shutdown complete");
}

async fn run(config: Config) -> Result<()> {
    let checkpoint_dir = config.checkpoint_dir();
    tokio::fs::create_dir_all(&checkpoint_dir)
        .await
        .with_context(|| format!("Failed to create {}", checkpoint_dir.display()))?;
    let checkpoint_key = pipeline::checkpoint_key(&config.mode.to_string(), &config.run_key);
    cleanup::reap_stale_temp_files(&checkpoint_dir, &checkpoint_file_name(&checkpoint_key)).await;

    let items = work_item::load_work_items(&config.input_path).await?;
    let metrics = Metrics::new();

    if let Some(port) = config.status_port {
        let state = Arc::new(handlers::AppState {
            mode: config.mode,
            run_key: config.run_key.clone(),
            total_items: items.len(),
            metrics: metrics.clone(),
            started_at: chrono::Utc::now(),
        });
        tokio::spawn(handlers::serve(state, port));
    }

    let sleeper = Arc::new(TokioSleeper);
    let executor: Arc<dyn ItemExecutor> = match config.mode {
        PipelineMode::Evaluate => {
            let scorer = build_scorer(&config).await?;
            let context = config.load_job_description().await?;
            Arc::new(EvaluationExecutor::new(
                scorer,
                RetryController::new(config.retry_policy(), sleeper),
                ResultClassifier::new(config.positive_label.clone()),
                context,
                metrics.clone(),
            ))
        }
        PipelineMode::Call => {
            let api_key = config
                .retell_api_key
                .clone()
                .context("RETELL_API_KEY must be set in call mode")?;
            let from_number = config
                .retell_from_number
                .clone()
                .context("RETELL_FROM_NUMBER must be set in call mode")?;
            let service = Arc::new(RetellClient::new(api_key, from_number)?);
            let tracker = CallTracker::new(service, sleeper, config.tracker_settings());
            Arc::new(CallExecutor::new(tracker, metrics.clone()))
        }
    };

    let failures = NdjsonFailureLog::new(config.failure_log_path());
    info!("Failed items are logged to {}", failures.path().display());

    let mut driver = PipelineDriver::new(
        config.run_key.clone(),
        Arc::new(FileCheckpointStore::new(checkpoint_dir)),
        executor,
        Arc::new(failures),
        metrics,
    );
    driver = match config.mode {
        PipelineMode::Evaluate => {
            driver.with_result_sink(Arc::new(JsonResultSink::new(config.state_dir.clone())))
        }
        PipelineMode::Call => {
            let sink = CsvCallSink::new(config.csv_path.clone());
            info!("Appending call rows to {}", sink.path().display());
            driver.with_call_sink(Arc::new(sink))
        }
    };

    let summary = driver.run(&items).await?;
    info!(
        "Run {} finished: {} accepted, {} rejected, {} failed this session",
        summary.run_key, summary.accepted, summary.rejected, summary.failed
    );
    Ok(())
}

async fn build_scorer(config: &Config) -> Result<Arc<dyn Scorer>> {
    let system_prompt = config.load_system_prompt().await?;
    let scorer: Arc<dyn Scorer> = match config.scorer_backend {
        ScorerBackend::Gemini => {
            let api_key = config
                .google_api_key
                .clone()
                .context("GOOGLE_API_KEY must be set for the gemini scorer")?;
            Arc::new(GeminiScorer::new(
                api_key,
                config.gemini_model.clone(),
                system_prompt,
            )?)
        }
        ScorerBackend::Ollama => Arc::new(OllamaScorer::new(
            config.ollama_url.clone(),
            config.ollama_model.clone(),
            system_prompt,
        )?),
    };
    info!("Using {} scorer", scorer.name());
    Ok(scorer)
}
