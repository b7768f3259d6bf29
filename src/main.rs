//! FRSaaS backend
//!
//! Main application entry point

use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use frsaas::{
    build_router,
    config::Settings,
    database::{create_pool, run_migrations, PoolOptions},
    response,
    utils::logging,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let settings = Settings::new()?;
    settings.validate()?;

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = logging::init_logging(&settings.logging)?;

    info!("Starting {}...", frsaas::info());
    response::init_category(&settings.app.app_no);

    // Initialize database connection
    info!("Connecting to database...");
    let pool = create_pool(&PoolOptions::from(&settings.database)).await?;
    run_migrations(&pool).await?;

    // Initialize services
    info!("Initializing services...");
    let bind_address = settings.bind_address();
    let state = AppState::new(settings, pool)?;

    let health = state.services.health_check().await;
    if !health.is_healthy() {
        warn!("Redis is unreachable, sessions and verification codes will fail until it recovers");
    }

    let limiter_cleanup = state
        .v_code_limiter
        .start_cleanup(Duration::from_secs(state.settings.rate_limit.cleanup_interval_seconds));

    let app = build_router(state);
    let listener = TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    limiter_cleanup.abort();
    info!("Server has been shut down.");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => warn!(error = %e, "Failed to listen for SIGTERM"),
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
