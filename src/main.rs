use clap::Parser;
use intake::config::{AppConfig, RunMode};
use intake::ingest::queue::intake_queue;
use intake::pipeline::metrics::PipelineMetrics;
use intake::pipeline::transform::HeaderKeys;
use intake::pipeline::worker::WorkerPool;
use intake::storage::writer::{EventStore, PgEventStore};
use intake::{app, storage};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;

#[derive(Parser)]
#[command(name = "intake", about = "Analytics event intake service")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

fn init_tracing(mode: RunMode) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| mode.default_filter().into());

    match mode {
        RunMode::Release => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        RunMode::Debug => tracing_subscriber::fmt().with_env_filter(filter).init(),
        RunMode::Test => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Tracing depends on the run mode, so config errors go straight to stderr.
    let config = match AppConfig::load(Some(&cli.config)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Fatal error loading config: {e}");
            return Err(e.into());
        }
    };
    if let Err(msg) = config.validate() {
        eprintln!("Configuration error: {msg}");
        return Err(msg.into());
    }

    init_tracing(config.server.mode);

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        mode = %config.server.mode,
        db_host = %config.database.host,
        db_name = %config.database.dbname,
        "starting intake"
    );

    let pool = storage::postgres::create_pool(&config.database).await?;
    storage::postgres::init_schema(&pool).await?;
    tracing::info!("database initialized");

    let store: Arc<dyn EventStore> = Arc::new(PgEventStore::new(pool.clone()));
    let metrics = PipelineMetrics::new();
    let (queue, receiver) = intake_queue(config.ingest.queue_capacity);

    let keys = HeaderKeys {
        user_id: config.ingest.user_id_header.clone(),
        user_agent: config.ingest.user_agent_header.clone(),
    };
    let workers = WorkerPool::spawn(
        receiver,
        store.clone(),
        metrics.clone(),
        keys,
        &config.pipeline,
    );

    // The router owns the only producer handles, so the queue closes when the
    // server stops.
    let app = app::build_router(config.ingest.clone(), queue, store, metrics.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("http server stopped, draining intake queue");
    let unfinished = workers
        .join(Duration::from_secs(config.pipeline.shutdown_timeout_secs))
        .await;

    let snap = metrics.snapshot();
    tracing::info!(
        accepted = snap.accepted,
        writes_ok = snap.writes_ok,
        write_failures = snap.write_failures,
        parse_failures = snap.parse_failures,
        unfinished_workers = unfinished,
        "shutdown complete"
    );

    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    tracing::info!("shutting down, no longer accepting events");
}
