use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::sync::watch;
use tracing::info;

use podium_aoc::ScoreSource;
use podium_store::HistoryStore;

mod http;

pub use http::{health_router, main_router};

/// Startup configuration, assembled once in `main` and passed by reference
/// to everything that needs it.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub main_addr: SocketAddr,
    pub health_addr: SocketAddr,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<HistoryStore>,
    pub source: Arc<dyn ScoreSource>,
}

/// Run the main and health listeners until a shutdown signal arrives.
pub async fn run(config: &ServiceConfig, state: AppState) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    tokio::try_join!(
        serve("main", config.main_addr, main_router(state), shutdown_rx.clone()),
        serve("health", config.health_addr, health_router(), shutdown_rx),
    )?;
    info!("service stopped");
    Ok(())
}

/// One managed HTTP listener: bind, serve, drain on shutdown. Both the main
/// API and the health endpoint run through this.
pub async fn serve(
    name: &'static str,
    addr: SocketAddr,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {name} listener on {addr}"))?;
    info!("{name} listener on http://{addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            info!("{name} listener is shutting down");
        })
        .await?;
    info!("{name} listener gracefully shut down");
    Ok(())
}

/// Resolves when the process receives SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            futures::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => futures::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = futures::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
