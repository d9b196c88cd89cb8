use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ticket_sentiment::{
    classifier::MlServiceClient,
    config::{Config, LogFormat},
    ingest::{IngestPayload, IngestionOrchestrator, JobQueue, RawTicket, DEFAULT_QUEUE_CAPACITY},
    insights::InsightsService,
    jobs::{JobStatus, JobTracker},
    mapping::ColumnMapper,
    storage::SqliteStorage,
};

#[derive(Parser)]
#[command(name = "ticket-sentiment", version, about = "Ticket sentiment ingestion and trajectory analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a CSV export (or a JSON array of records with --json)
    Ingest {
        path: PathBuf,

        /// Treat the file as a JSON array of {id, summary, description, comments}
        #[arg(long)]
        json: bool,

        /// Job id (generated when omitted)
        #[arg(long)]
        job_id: Option<String>,
    },

    /// List recent jobs
    Jobs {
        /// queued, running, completed or failed
        #[arg(long)]
        status: Option<JobStatus>,

        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show one job
    Job { job_id: String },

    /// Trajectory and causal analysis over stored tickets
    Analyze {
        /// Overrides MIN_SAMPLE_SIZE
        #[arg(long)]
        min_sample_size: Option<usize>,

        #[arg(long, default_value = "1000")]
        limit: usize,

        /// Print the full analysis as JSON instead of the text report
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "ticket-sentiment starting");

    match cli.command {
        Commands::Ingest { path, json, job_id } => ingest(config, path, json, job_id).await,
        Commands::Jobs { status, limit } => {
            let tracker = JobTracker::connect(&config.job_store).await;
            let jobs = tracker.list_jobs(status, limit).await?;
            println!("{}", serde_json::to_string_pretty(&jobs)?);
            Ok(())
        }
        Commands::Job { job_id } => {
            let tracker = JobTracker::connect(&config.job_store).await;
            match tracker.get_job(&job_id).await? {
                Some(job) => {
                    println!("{}", serde_json::to_string_pretty(&job)?);
                    Ok(())
                }
                None => anyhow::bail!("job not found: {}", job_id),
            }
        }
        Commands::Analyze {
            min_sample_size,
            limit,
            json,
        } => {
            let storage = open_storage(&config).await?;
            let service = InsightsService::new(
                storage,
                min_sample_size.unwrap_or(config.ingest.min_sample_size),
            );
            let insights = service.analyze(limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&insights)?);
            } else {
                print!("{}", insights.report);
            }
            Ok(())
        }
    }
}

async fn ingest(
    config: Config,
    path: PathBuf,
    json: bool,
    job_id: Option<String>,
) -> anyhow::Result<()> {
    let payload = if json {
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let records: Vec<RawTicket> =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        IngestPayload::Records { records }
    } else {
        IngestPayload::CsvFile { path }
    };

    let storage = open_storage(&config).await?;
    let classifier = match MlServiceClient::new(&config.classifier, config.request.clone()) {
        Ok(c) => {
            info!(base_url = %config.classifier.base_url, "Classifier client initialized");
            Arc::new(c)
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize classifier client");
            return Err(e.into());
        }
    };
    if !classifier.check_health().await {
        warn!("Classifier service not healthy; fragments will use fallback sentiment");
    }

    let tracker = JobTracker::connect(&config.job_store).await;
    info!(backend = tracker.backend_name(), "Job tracker ready");

    let orchestrator = Arc::new(
        IngestionOrchestrator::new(
            storage,
            classifier,
            tracker.clone(),
            Arc::new(ColumnMapper::new()),
            config.ingest.clone(),
        )
        .with_classifier_timeout(Duration::from_millis(config.classifier.timeout_ms)),
    );

    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping at next chunk");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let (queue, worker) = JobQueue::channel(orchestrator, DEFAULT_QUEUE_CAPACITY);
    let worker = tokio::spawn(worker.run());

    let job_id = job_id.unwrap_or_else(JobQueue::new_job_id);
    queue.submit(&job_id, payload).await?;
    drop(queue);
    worker.await.context("ingest worker panicked")?;

    let job = tracker
        .get_job(&job_id)
        .await?
        .with_context(|| format!("job record {} missing", job_id))?;
    println!("{}", serde_json::to_string_pretty(&job)?);

    if job.status == JobStatus::Failed {
        anyhow::bail!(
            "job {} failed: {}",
            job_id,
            job.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn open_storage(config: &Config) -> anyhow::Result<Arc<SqliteStorage>> {
    match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            Ok(Arc::new(s))
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            Err(e.into())
        }
    }
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
