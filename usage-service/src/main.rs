use std::net::SocketAddr;
use std::sync::Arc;

use service_core::observability::init_tracing;
use tokio::signal;
use usage_service::{
    build_router,
    config::UsageConfig,
    services::{AccountService, MongoDb, RolloverScheduler, SystemClock},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Fail fast on invalid configuration
    let config = UsageConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    usage_service::services::metrics::init_metrics();

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting water usage service"
    );

    let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database).await?;
    db.initialize_indexes().await?;
    tracing::info!("Database initialized successfully");

    let store = Arc::new(db);
    let clock = Arc::new(SystemClock::new(config.rollover.utc_offset));

    let accounts = AccountService::new(store.clone(), clock.clone());
    if accounts.ensure_admin_exists(&config.admin.password).await? {
        tracing::info!("Seeded admin account");
    }

    let scheduler = RolloverScheduler::new(store.clone(), clock.clone(), config.rollover.clone());
    let scheduler_shutdown = scheduler.shutdown_token();
    let scheduler_handle = scheduler.spawn();

    let state = AppState::new(config.clone(), store, clock);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler_shutdown.cancel();
    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = %e, "Rollover scheduler task failed");
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
