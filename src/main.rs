//! Psychometric Analysis Engine - service entry point
//!
//! Loads configuration, connects to PostgreSQL, runs migrations, starts the
//! scheduled recalculation job and serves the HTTP API until shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use psychometric_engine::adapters::http::{build_router, PsychometricsAppState};
use psychometric_engine::adapters::postgres::{
    PostgresItemCatalog, PostgresItemStatisticsRepository, PostgresReliabilityRepository,
    PostgresResponseSource,
};
use psychometric_engine::application::{RecalculationJob, RecalculationJobConfig};
use psychometric_engine::config::{AppConfig, LogFormat, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.server);
    config.validate().context("Invalid configuration")?;

    info!(
        environment = ?config.server.environment,
        job_enabled = config.job.enabled,
        "Starting psychometric engine"
    );

    // Database
    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .max_lifetime(config.database.max_lifetime())
        .connect(config.database.url())
        .await
        .context("Failed to connect to database")?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
        info!("Database migrations applied");
    }

    // Adapters and handlers
    let state = PsychometricsAppState::new(
        Arc::new(PostgresItemCatalog::new(pool.clone())),
        Arc::new(PostgresResponseSource::new(pool.clone())),
        Arc::new(PostgresItemStatisticsRepository::new(pool.clone())),
        Arc::new(PostgresReliabilityRepository::new(pool.clone())),
        &config.analysis,
        config.job.progress_log_every,
    );

    // Scheduled recalculation
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let job_handle = if config.job.enabled {
        let job = RecalculationJob::new(
            state.calculate_item_statistics.clone(),
            state.calculate_reliability.clone(),
            RecalculationJobConfig::default()
                .with_interval(config.job.interval())
                .with_run_on_start(config.job.run_on_start),
        );
        Some(tokio::spawn(async move {
            if let Err(e) = job.run(shutdown_rx).await {
                error!(error = %e, "Recalculation job stopped with error");
            }
        }))
    } else {
        info!("Scheduled recalculation disabled");
        None
    };

    // HTTP server
    let addr = config.server.socket_addr().context("Invalid bind address")?;
    let app = build_router(state, &config.server);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the job between entities and wait for it
    let _ = shutdown_tx.send(true);
    if let Some(handle) = job_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "Recalculation job task failed");
        }
    }

    pool.close().await;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    match server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
