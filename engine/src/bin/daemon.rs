//! service-watchd
//!
//! Watches OS services on the configured watchlist, restarts the ones that go
//! down and serves the REST/SSE API.

#[path = "daemon/config.rs"]
mod config;

use config::DaemonConfig;
use std::sync::Arc;
use sw_engine::adapters::rest::{build_router, serve_on_tcp};
use sw_engine::application::Application;
use sw_engine::domain::ports::{ServiceController, WatchlistStore};
use sw_engine::domain::{EventBroadcaster, EventPublisher, WatchlistRegistry};
use sw_engine::infrastructure::{create_controller, EventJournal, JsonFileWatchlistStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DaemonConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    let controller_kind = config.controller_kind()?;
    info!(
        listen_addr = %config.listen_addr,
        watchlist_file = %config.watchlist_file.display(),
        interval_secs = config.monitor_interval_secs,
        controller = %controller_kind.resolve(),
        "Starting service-watchd"
    );

    let controller: Arc<dyn ServiceController> = create_controller(controller_kind);
    let store: Arc<dyn WatchlistStore> =
        Arc::new(JsonFileWatchlistStore::new(&config.watchlist_file));
    let registry = Arc::new(WatchlistRegistry::load(store, controller.clone())?);

    let broadcaster = Arc::new(EventBroadcaster::new());
    let mut publisher = EventPublisher::new(broadcaster.clone());
    if config.enable_event_log {
        let journal = EventJournal::open(&config.event_log_dir)?;
        info!(dir = %config.event_log_dir.display(), "Event journal enabled");
        publisher = publisher.with_sink(Arc::new(journal));
    }

    let app = Arc::new(Application::new(registry, controller, Arc::new(publisher)));

    let cancellation_token = CancellationToken::new();
    let monitor = app.monitor(config.monitor_interval());
    let monitor_handle = {
        let token = cancellation_token.clone();
        tokio::spawn(async move { monitor.run(token).await })
    };

    let shutdown = {
        let token = cancellation_token.clone();
        let broadcaster = broadcaster.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            token.cancel();
            // End open event streams so the server can drain
            broadcaster.close_all();
        }
    };

    let result = serve_on_tcp(config.socket_addr()?, build_router(app), shutdown).await;

    cancellation_token.cancel();
    if let Err(e) = monitor_handle.await {
        warn!(error = %e, "Monitor task ended abnormally");
    }

    info!("service-watchd stopped");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
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
}
