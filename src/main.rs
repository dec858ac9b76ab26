use std::sync::Arc;

mod config;
mod handlers;
mod metrics;
mod middleware;
mod registry;
mod server;
mod store;

use tokio::sync::watch;
use tracing::info;

use config::Config;
use metrics::{pipeline, MetricsCollector, Telemetry};
use registry::Registration;
use store::RecordStore;

/// Shared application state available to every handler via
/// `State<Arc<AppState<S>>>`.
pub struct AppState<S> {
    /// Record store the CRUD surface passes through to.
    pub store: S,

    /// In-memory metric sink, read by the export endpoints.
    pub collector: Arc<MetricsCollector>,

    /// Hand-off into the telemetry pipeline, used by the call
    /// instrumentor.
    pub telemetry: Telemetry,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "student_info_service=info".to_string()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fatal: {err}");
            std::process::exit(1);
        }
    };

    if config.store_url == "mem" {
        info!("using volatile in-memory record store");
        serve(store::mem::MemStore::new(), config).await;
    } else {
        info!(url = %config.store_url, "connecting to record store");
        serve(store::redis::connect(&config.store_url).await, config).await;
    }
}

async fn serve<S: RecordStore>(store: S, config: Config) {
    // Telemetry: the collector sink behind a bounded hand-off queue.
    let collector = Arc::new(MetricsCollector::new());
    let telemetry =
        pipeline::spawn_exporter(collector.clone(), config.telemetry_queue);

    // Registration runs as its own task from process start. It retries
    // forever on failure and never touches the serving path; shutdown
    // is the only thing that cancels it.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let registration = Registration {
        name: config::SERVICE_NAME.to_string(),
        host: config.advertised_host.clone(),
        port: config.listen_port,
        kind: config::SERVICE_KIND.to_string(),
    };
    tokio::spawn(registry::run(
        registration,
        config.registry_endpoint.clone(),
        config.registry_retry_interval,
        shutdown_rx,
    ));

    let state = Arc::new(AppState {
        store,
        collector,
        telemetry,
    });
    let app = server::create_router(state);

    let addr = format!("0.0.0.0:{}", config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("fatal: cannot bind {addr}: {e}");
            std::process::exit(1);
        });

    info!(%addr, registry = %config.registry_endpoint, "student-info service listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
    {
        eprintln!("fatal: server error: {e}");
        std::process::exit(1);
    }
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
}
