mod backend;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use beacon_core::batch::{BatchConfig, BatchCoordinator, TracingBatchObserver};
use beacon_core::job::{AnalysisJob, AnalysisOptions, Priority};
use beacon_core::queue::JobQueue;
use beacon_core::worker::{AnalysisWorker, TracingWorkerReporter, WorkerConfig};
use beacon_db::{Database, DatabaseConfig};

use crate::backend::{ActiveBackend, live_pipeline, select_backend};

#[derive(Parser)]
#[command(name = "beacon", version, about = "Website authority analyzer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a URL: enqueue, wait for completion, print the result
    Analyze {
        /// Target URL to analyze
        url: String,

        /// User identifier to attach to the job
        #[arg(short, long)]
        user: Option<String>,

        /// Scheduling priority: high, normal, or low
        #[arg(short, long, default_value = "normal")]
        priority: String,

        /// Skip the Core Web Vitals observation window
        #[arg(long, default_value_t = false)]
        no_performance: bool,

        /// Skip AI-platform heuristics
        #[arg(long, default_value_t = false)]
        no_ai_factors: bool,

        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },

    /// Show the queue-tracked state of a job
    Status {
        /// Job id returned by analyze
        id: String,
    },

    /// Show queue counts by state
    Stats,

    /// Analyze many URLs with bounded concurrency
    Batch {
        /// URLs to analyze
        urls: Vec<String>,

        /// CSV/text file with one URL per line (first column)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// How many URLs run concurrently
        #[arg(short, long, default_value_t = 3)]
        concurrency: usize,

        /// Pause between chunks, in milliseconds
        #[arg(long, default_value_t = 500)]
        pause_ms: u64,
    },

    /// Run an analysis worker against the distributed queue
    Worker {
        /// Worker identifier (defaults to a generated one)
        #[arg(short, long)]
        worker_id: Option<String>,

        /// Queue poll interval in seconds
        #[arg(short, long, default_value_t = 5)]
        poll_interval: u64,
    },

    /// Remove terminal job records older than the given age
    Cleanup {
        /// Maximum age in hours
        #[arg(long, default_value_t = 24)]
        hours: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("beacon=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            url,
            user,
            priority,
            no_performance,
            no_ai_factors,
            timeout,
        } => {
            cmd_analyze(
                &url,
                user,
                &priority,
                no_performance,
                no_ai_factors,
                Duration::from_secs(timeout),
            )
            .await?;
        }
        Commands::Status { id } => cmd_status(&id).await?,
        Commands::Stats => cmd_stats().await?,
        Commands::Batch {
            urls,
            file,
            concurrency,
            pause_ms,
        } => cmd_batch(urls, file, concurrency, Duration::from_millis(pause_ms)).await?,
        Commands::Worker {
            worker_id,
            poll_interval,
        } => cmd_worker(worker_id, Duration::from_secs(poll_interval)).await?,
        Commands::Cleanup { hours } => cmd_cleanup(Duration::from_secs(hours * 3600)).await?,
    }

    Ok(())
}

fn parse_priority(raw: &str) -> Result<Priority> {
    match raw.to_lowercase().as_str() {
        "high" => Ok(Priority::High),
        "normal" => Ok(Priority::Normal),
        "low" => Ok(Priority::Low),
        other => bail!("Unknown priority '{other}' (expected high, normal, or low)"),
    }
}

async fn open_queue() -> Result<JobQueue<ActiveBackend>> {
    let pipeline = live_pipeline()?;
    let (backend, kind) = select_backend(pipeline).await;
    Ok(JobQueue::new(backend, kind))
}

async fn cmd_analyze(
    url: &str,
    user: Option<String>,
    priority: &str,
    no_performance: bool,
    no_ai_factors: bool,
    timeout: Duration,
) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid URL: {url}"))?;
    let priority = parse_priority(priority)?;

    let mut job = AnalysisJob::new(url).with_priority(priority).with_options(AnalysisOptions {
        include_screenshots: false,
        include_performance: !no_performance,
        include_ai_factors: !no_ai_factors,
    });
    if let Some(user) = user {
        job = job.with_user(user);
    }

    let queue = open_queue().await?;
    let id = queue.enqueue(job).await?;
    tracing::info!(%id, backend = queue.backend_kind().as_str(), "Job enqueued, waiting");

    // Poll until the job turns terminal.
    let deadline = tokio::time::Instant::now() + timeout;
    let mut last_progress = 0u8;
    loop {
        if tokio::time::Instant::now() >= deadline {
            bail!("Timed out after {}s waiting for job {id}", timeout.as_secs());
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        let Some(record) = queue.status(&id).await? else {
            bail!("Job {id} disappeared from the queue");
        };
        if record.progress != last_progress {
            last_progress = record.progress;
            tracing::info!(progress = record.progress, status = %record.status, "Working");
        }
        if record.status.is_terminal() {
            match record.result {
                Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                None => {
                    bail!(
                        "Job {id} ended {} without a result: {}",
                        record.status,
                        record.failure_reason.unwrap_or_else(|| "unknown".into())
                    );
                }
            }
            return Ok(());
        }
    }
}

async fn cmd_status(id: &str) -> Result<()> {
    let queue = open_queue().await?;
    match queue.status(id).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("No job found with id {id}"),
    }
    Ok(())
}

async fn cmd_stats() -> Result<()> {
    let queue = open_queue().await?;
    let stats = queue.stats().await?;
    println!("Queue backend: {}", queue.backend_kind().as_str());
    println!("  waiting:   {}", stats.waiting);
    println!("  active:    {}", stats.active);
    println!("  completed: {}", stats.completed);
    println!("  failed:    {}", stats.failed);
    println!("  total:     {}", stats.total);
    Ok(())
}

async fn cmd_batch(
    mut urls: Vec<String>,
    file: Option<PathBuf>,
    concurrency: usize,
    pause: Duration,
) -> Result<()> {
    if let Some(path) = file {
        urls.extend(read_url_file(&path)?);
    }
    if urls.is_empty() {
        bail!("No URLs given (pass them as arguments or via --file)");
    }

    let pipeline = live_pipeline()?;
    let coordinator = BatchCoordinator::new(
        pipeline,
        BatchConfig {
            concurrency,
            pause_between_chunks: pause,
        },
    );

    tracing::info!(total = urls.len(), concurrency, "Starting batch");
    let report = coordinator.run(&urls, &TracingBatchObserver).await;
    tracing::info!(
        completed = report.completed,
        failed = report.failed,
        "Batch finished"
    );

    println!("{}", serde_json::to_string_pretty(&report.results)?);
    Ok(())
}

/// One URL per line; extra CSV columns are ignored.
fn read_url_file(path: &PathBuf) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to read URL file: {}", path.display()))?;

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(url) = record.get(0) {
            let url = url.trim();
            if !url.is_empty() {
                urls.push(url.to_string());
            }
        }
    }
    Ok(urls)
}

async fn cmd_worker(worker_id: Option<String>, poll_interval: Duration) -> Result<()> {
    // Workers only make sense against the shared queue; there is no local
    // fallback here.
    let config = DatabaseConfig::from_env()?;
    let db = Database::connect(&config)
        .await
        .context("Worker requires the distributed backend")?;
    db.migrate().await?;

    let pipeline = live_pipeline()?;
    let mut worker_config = WorkerConfig::default().with_poll_interval(poll_interval);
    if let Some(id) = worker_id {
        worker_config = worker_config.with_worker_id(id);
    }

    let worker = AnalysisWorker::new(db.queue_backend(), pipeline, worker_config);

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, shutting down");
            shutdown.cancel();
        }
    });

    worker.run(token, &TracingWorkerReporter).await?;
    Ok(())
}

async fn cmd_cleanup(max_age: Duration) -> Result<()> {
    let queue = open_queue().await?;
    let removed = queue.cleanup(max_age).await?;
    println!("Removed {removed} terminal job records");
    Ok(())
}
