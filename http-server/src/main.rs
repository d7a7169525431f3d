use cross_matcher::Exchange;
use cross_matcher::clock::{Clock, SystemClock};
use cross_matcher::persistence::JsonFileStore;
use cross_matcher::session::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod middleware;
mod notifier;
mod routes;
mod tasks;

use notifier::UdpNotifier;

// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub exchange: Arc<Exchange>,
    pub notifier: Arc<UdpNotifier>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::load();

    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .init();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sessions = Arc::new(SessionManager::new(settings.session_timeout, clock.clone()));
    let notifier = UdpNotifier::spawn(settings.notify_queue);
    let store = Arc::new(JsonFileStore::new(&settings.snapshot_path));

    let exchange = Arc::new(Exchange::open(notifier.clone(), sessions, clock, store));
    tracing::info!(
        resting = exchange.total_orders(),
        next_order_id = exchange.next_order_id(),
        snapshot = %settings.snapshot_path.display(),
        "Exchange ready"
    );

    let (stop_tasks, shutdown) = watch::channel(false);
    let sweeper = tasks::spawn_session_sweeper(
        exchange.clone(),
        notifier.clone(),
        settings.session_sweep_interval,
        shutdown.clone(),
    );
    let snapshots =
        tasks::spawn_snapshot_writer(exchange.clone(), settings.snapshot_interval, shutdown);

    let state = AppState {
        exchange: exchange.clone(),
        notifier,
    };
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr()).await?;
    tracing::info!("Server running on http://{}", settings.bind_addr());
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Let an in-flight periodic snapshot finish before the final one
    let _ = stop_tasks.send(true);
    for task in [sweeper, snapshots] {
        if let Err(e) = task.await {
            tracing::error!("Background task failed: {}", e);
        }
    }
    exchange.shutdown()?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
