use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};

use manhwa_forum_api::{
    config::Config,
    middleware::init_tracing,
    routes::create_router,
    state::AppState,
    store,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize tracing: {}", e);
        std::process::exit(1);
    }

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                "Configuration loaded successfully (environment: {:?}, store backend: {:?})",
                config.environment, config.backend
            );
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    for gap in &config.gaps {
        warn!("Configuration gap: {}", gap);
    }

    // A missing or unreachable database degrades the service instead of stopping it
    let document_store = store::open(&config).await;

    let app = create_router(AppState::new(document_store, config.connection_env));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            info!("Server listening on {}", addr);
            listener
        }
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

/// Graceful shutdown signal handler
/// Listens for SIGTERM and SIGINT signals
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM signal, initiating graceful shutdown");
        },
    }
}
