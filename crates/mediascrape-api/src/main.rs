//! mediascrape-api - HTTP API server and in-process worker pool

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediascrape_api::{router, spawn_event_bridge, AppState, ServerConfig, StorageBackend};
use mediascrape_core::env::env_clamped;
use mediascrape_core::{defaults, EventBus, Store};
use mediascrape_db::{create_pool_with_config, Database, MemoryStore, PoolConfig};
use mediascrape_jobs::{
    JobOrchestrator, OrchestratorConfig, TargetProcessor, WorkerBuilder, WorkerConfig,
};
use mediascrape_scraper::{FetchConfig, HttpFetcher};

/// How long open connections may outlive the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let _file_guard = init_tracing(&log_format, log_file.as_deref());

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ServerConfig::from_env()?;
    let store = open_store(&config).await?;

    let event_bus = Arc::new(EventBus::default());
    let orchestrator = JobOrchestrator::new(store.clone(), OrchestratorConfig::from_env())
        .with_events(event_bus.clone());

    let fetcher = Arc::new(HttpFetcher::new(FetchConfig::from_env())?);
    let worker = WorkerBuilder::new(store.tasks.clone())
        .with_config(WorkerConfig::from_env())
        .with_handler(TargetProcessor::new(orchestrator.clone(), fetcher))
        .build()?;
    let worker_handle = worker.start();
    let bridge = spawn_event_bridge(worker_handle.events(), event_bus.clone());

    let app = router(AppState::new(orchestrator, event_bus), &config);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, storage = ?config.storage_backend, "Starting server");

    let (signal_tx, signal_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(true);
    });

    // Streaming clients may keep connections open; stop waiting for them
    // after a grace period.
    let mut graceful_rx = signal_rx.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = graceful_rx.wait_for(|stop| *stop).await;
    });
    let mut grace_rx = signal_rx;
    tokio::select! {
        result = async { server.await } => result?,
        _ = async {
            let _ = grace_rx.wait_for(|stop| *stop).await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Open connections did not close in time"),
    }

    info!("HTTP server stopped, draining worker pool");
    worker_handle.shutdown_and_wait().await?;
    bridge.abort();
    info!("Shutdown complete");

    Ok(())
}

fn init_tracing(
    log_format: &str,
    log_file: Option<&str>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "mediascrape_api=debug,mediascrape_jobs=info,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("mediascrape-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            // No ANSI in files unless asked for.
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
        None
    } else {
        let mut layer = tracing_subscriber::fmt::layer();
        if let Some(ansi) = log_ansi {
            layer = layer.with_ansi(ansi);
        }
        registry.with(layer).init();
        None
    }
}

async fn open_store(config: &ServerConfig) -> anyhow::Result<Store> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = create_pool_with_config(&config.database_url, PoolConfig::from_env()).await?;
            let lease_secs = env_clamped("TASK_LEASE_SECS", defaults::TASK_LEASE_SECS, 1, u64::MAX);
            let db = Database::with_task_lease(pool, Duration::from_secs(lease_secs));
            db.migrate().await?;
            info!(subsystem = "db", "Migrations applied");
            Ok(db.store())
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all data is lost on restart");
            Ok(MemoryStore::new().into_store())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
