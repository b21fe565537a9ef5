use anyhow::{Context, Result};
use clap::Parser;
use job_matcher::core::{ConfigManager, FsOps};
use job_matcher::job_analysis::{HttpPageFetcher, JobPipeline, OpenAiOracle};
use job_matcher::utils::run_timestamp;
use job_matcher::Cli;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, info_span, Instrument};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigManager::load(&cli)?;
    config.ensure_directories().await?;

    let log_path = init_logging(&config.logs_dir)?;
    info!("Run log: {}", log_path.display());
    config.log_summary();

    let resume = FsOps::read_file_safe(&config.resume_path)
        .await
        .context("Error loading resume")?;
    info!("Resume loaded successfully");

    let oracle = OpenAiOracle::new(
        config.oracle.api_key.clone(),
        config.oracle.base_url.clone(),
        config.oracle.model.clone(),
    )?;
    let fetcher = HttpPageFetcher::new()?;

    let pipeline = JobPipeline::new(fetcher, oracle, resume, config.pipeline_settings());
    let span = info_span!("run", run_id = %uuid::Uuid::new_v4());

    let outcome = pipeline
        .run(&config.search_categories, config.max_pages)
        .instrument(span)
        .await;

    match outcome {
        Ok(outcome) => {
            info!(
                pages = outcome.pages_fetched,
                harvested = outcome.harvested,
                unique = outcome.unique,
                analyzed = outcome.analyzed.len(),
                skipped = outcome.skipped,
                "Run finished"
            );
            Ok(())
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            Err(e)
        }
    }
}

/// Console output plus a JSON run log in `logs_dir`.
fn init_logging(logs_dir: &Path) -> Result<PathBuf> {
    let path = logs_dir.join(format!("analyzer_log_{}.txt", run_timestamp()));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .json()
                .with_writer(Mutex::new(file))
                .with_current_span(true)
                .with_span_list(false),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(path)
}
