// crates/pipeline-cli/src/main.rs
// ============================================================================
// Module: Pipeline CLI Entry Point
// Description: Command dispatcher for the HTTP surface, the worker loop, and
//              one-off job submission.
// Dependencies: clap, pipeline-config, pipeline-core, pipeline-drivers,
//               pipeline-http, pipeline-queue, pipeline-store-sqlite,
//               pipeline-worker, tokio, tracing, tracing-subscriber
// ============================================================================

//! Unifies the original implementation's two separate entry points
//! (`backend/api/server.py`'s uvicorn process and `backend/orchestrator.py`'s
//! `main_loop` process) into one binary with `serve` and `worker`
//! subcommands, plus a `submit` convenience command for local testing —
//! following the teacher CLI's clap-derive subcommand shape.

use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use pipeline_config::EngineConfig;
use pipeline_drivers::StandardDrivers;
use pipeline_http::AppState;
use pipeline_queue::JobQueue;
use pipeline_queue::SqliteJobQueue;
use pipeline_store_sqlite::SqliteArtifactStore;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors that can terminate the CLI, each mapped to a non-zero exit code.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration could not be read from the environment.
    #[error(transparent)]
    Config(#[from] pipeline_config::ConfigError),
    /// The job queue backend could not be opened or queried.
    #[error(transparent)]
    Queue(#[from] pipeline_queue::QueueError),
    /// The artifact store backend could not be opened.
    #[error(transparent)]
    Store(#[from] pipeline_core::store::ArtifactStoreError),
    /// A data directory could not be created or the HTTP listener could not
    /// bind.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The `--run-config` argument was not valid JSON.
    #[error("invalid run config JSON: {0}")]
    RunConfig(#[from] serde_json::Error),
}

#[derive(Debug, Parser)]
#[command(name = "pipeline", about = "Data-analysis pipeline orchestrator")]
struct Cli {
    /// Which subcommand to run.
    #[command(subcommand)]
    command: Command,

    /// Path to the job queue's SQLite database.
    #[arg(long, global = true, default_value = "pipeline-data/jobs.db")]
    queue_db: PathBuf,

    /// Path to the artifact store's SQLite database.
    #[arg(long, global = true, default_value = "pipeline-data/artifacts.db")]
    store_db: PathBuf,

    /// Directory for non-document artifact files (charts, reports).
    #[arg(long, global = true, default_value = "pipeline-data/files")]
    store_dir: PathBuf,

    /// Optional TOML file overriding `EngineConfig`'s environment variables
    /// (consulted by the `worker` subcommand only).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the HTTP surface for the six run-lifecycle operations (spec.md §6).
    Serve {
        /// Address to bind the HTTP listener to.
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: SocketAddr,
    },
    /// Runs the worker loop that drives queued runs to a terminal state.
    Worker,
    /// Enqueues a single run and prints its run id, without starting a worker.
    Submit {
        /// Path or URI to the dataset.
        file_path: String,
        /// Run configuration as a JSON object (spec.md §6's recognized
        /// options); defaults to an empty object.
        #[arg(long)]
        run_config: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();
}

fn ensure_parent_dir(path: &Path) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn open_queue(path: &Path) -> Result<SqliteJobQueue, CliError> {
    ensure_parent_dir(path)?;
    Ok(SqliteJobQueue::open(path)?)
}

fn open_store(db_path: &Path, base_dir: &Path) -> Result<SqliteArtifactStore, CliError> {
    ensure_parent_dir(db_path)?;
    std::fs::create_dir_all(base_dir)?;
    Ok(SqliteArtifactStore::open(db_path, base_dir)?)
}

async fn serve(cli: &Cli, addr: SocketAddr) -> Result<(), CliError> {
    let queue: Arc<dyn JobQueue> = Arc::new(open_queue(&cli.queue_db)?);
    let store = Arc::new(open_store(&cli.store_db, &cli.store_dir)?);
    let state = AppState::new(queue, store);
    let router = pipeline_http::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP surface listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn worker(cli: &Cli) -> Result<(), CliError> {
    let engine = Arc::new(EngineConfig::from_env_and_file(cli.config.as_deref())?);
    let queue: Arc<dyn JobQueue> = Arc::new(open_queue(&cli.queue_db)?);
    let store = Arc::new(open_store(&cli.store_db, &cli.store_dir)?);
    let dispatch = Arc::new(StandardDrivers::new());

    let sweeper_handle = tokio::spawn(pipeline_queue::run_cleanup_sweeper(
        Arc::clone(&queue),
        engine.cleanup_interval,
        engine.job_timeout_minutes,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let loop_handle = tokio::spawn(pipeline_worker::run_loop(queue, store, dispatch, engine, shutdown_rx));

    shutdown_signal().await;
    sweeper_handle.abort();
    let _ = shutdown_tx.send(());
    loop_handle.await.map_err(|error| {
        CliError::Io(std::io::Error::other(error.to_string()))
    })?;
    Ok(())
}

#[allow(
    clippy::print_stdout,
    reason = "the submit subcommand's entire job is printing the allocated run id"
)]
fn submit(cli: &Cli, file_path: &str, run_config: Option<&str>) -> Result<(), CliError> {
    let queue = open_queue(&cli.queue_db)?;
    let run_config = match run_config {
        Some(raw) => serde_json::from_str(raw)?,
        None => serde_json::Value::Object(serde_json::Map::new()),
    };
    let run_id = queue.enqueue(file_path, run_config)?;
    println!("{}", run_id.as_str());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to install ctrl-c handler; shutting down anyway");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Serve { addr } => serve(&cli, *addr).await,
        Command::Worker => worker(&cli).await,
        Command::Submit { file_path, run_config } => {
            submit(&cli, file_path, run_config.as_deref())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "fatal error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::Cli;
    use super::open_queue;
    use super::open_store;
    use super::submit;
    use clap::Parser;

    fn test_cli(dir: &std::path::Path) -> Cli {
        Cli::try_parse_from([
            "pipeline",
            "--queue-db",
            dir.join("nested/jobs.db").to_str().expect("utf8"),
            "--store-db",
            dir.join("nested/artifacts.db").to_str().expect("utf8"),
            "--store-dir",
            dir.join("nested/files").to_str().expect("utf8"),
            "submit",
            "input.csv",
        ])
        .expect("valid cli args")
    }

    #[test]
    fn open_queue_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = test_cli(dir.path());
        open_queue(&cli.queue_db).expect("queue opens despite missing parent dir");
    }

    #[test]
    fn open_store_creates_missing_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = test_cli(dir.path());
        open_store(&cli.store_db, &cli.store_dir).expect("store opens despite missing dirs");
    }

    #[test]
    fn submit_enqueues_with_default_run_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = test_cli(dir.path());
        submit(&cli, "input.csv", None).expect("submit succeeds");
    }

    #[test]
    fn submit_rejects_malformed_run_config_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cli = test_cli(dir.path());
        let result = submit(&cli, "input.csv", Some("not json"));
        assert!(result.is_err());
    }
}
