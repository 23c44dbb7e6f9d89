//! # ido daemon
//!
//! Personal activity-intelligence daemon: observes the desktop through the
//! perception layer, distils the raw stream into actions, events, and
//! activities, and keeps the SQLite substrate tidy.
//!
//! The binary is the composition root: it loads configuration, opens the
//! database and thumbnail store (both fatal on failure), wires the
//! coordinator, and drives a clean shutdown on SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ido_config::{Config, ConfigLoader};
use ido_core::llm::OpenAiChatClient;
use ido_core::{Coordinator, Database};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command line arguments for the ido daemon.
#[derive(Parser, Debug)]
#[command(name = "ido-daemon")]
#[command(about = "Personal activity-intelligence daemon")]
struct Args {
    /// Path to config.toml (defaults to the platform config dir)
    #[arg(short, long, env = "IDO_CONFIG")]
    config: Option<PathBuf>,

    /// Override the SQLite database path
    #[arg(long, env = "IDO_DATABASE_PATH")]
    database: Option<PathBuf>,

    /// Log to stderr only, skipping the rolling log file
    #[arg(long)]
    no_log_file: bool,
}

fn init_tracing(
    config: &Config,
    no_log_file: bool,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    if no_log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    }

    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir).with_context(|| {
        format!("failed to create log directory {}", log_dir.display())
    })?;
    let file_appender =
        tracing_appender::rolling::daily(&log_dir, "ido_backend.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Ok(Some(guard))
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received ctrl-c");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let mut config = loader.load().context("failed to load configuration")?;
    if let Some(database) = args.database {
        config.database.path = Some(database);
    }

    let _log_guard = init_tracing(&config, args.no_log_file)?;

    let db_path = config.database_path();
    info!(path = %db_path.display(), "opening database");
    let db = Database::open(&db_path)
        .await
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    let image_manager = Arc::new(
        ido_core::image::ImageManager::new(
            config.image_storage_path(),
            config.image.memory_cache_size,
            config.image.enable_memory_cache,
        )
        .context("failed to acquire thumbnail storage")?,
    );

    let llm = OpenAiChatClient::from_config(&config.llm)
        .map(|client| Arc::new(client) as Arc<dyn ido_core::llm::LlmClient>);
    if llm.is_none() {
        warn!(
            "no LLM model configured (llm.model is empty); running \
             restricted"
        );
    }

    let mut coordinator =
        Coordinator::new(config, db, image_manager, llm);
    coordinator.start().await?;
    if let Some(last_error) = coordinator.last_error() {
        warn!("coordinator degraded: {last_error}");
    }

    wait_for_shutdown_signal().await;

    info!("shutting down");
    coordinator.stop(false).await;
    Ok(())
}
