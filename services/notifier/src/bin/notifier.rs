//! services/notifier/src/bin/notifier.rs
//!
//! The long-running service: daily scheduled passes plus the HTTP trigger.

use axum::Router;
use notifier_lib::{
    bootstrap::{build_runner, init_tracing, log_delivery_settings},
    config::Config,
    error::NotifierError,
    scheduler::spawn_daily_scheduler,
    web::{rest::ApiDoc, router, state::AppState},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), NotifierError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    init_tracing(&config);
    info!("Configuration loaded. Starting notifier...");
    log_delivery_settings(&config);

    // --- 2. Connect to Database & Initialize Adapters ---
    let runner = build_runner(&config).await?;

    // --- 3. Start the Daily Scheduler ---
    let shutdown = CancellationToken::new();
    let scheduler = spawn_daily_scheduler(
        runner.clone(),
        config.daily_run_at,
        config.scheduler_poll,
        shutdown.clone(),
    );

    // --- 4. Create the Web Router ---
    let app_state = Arc::new(AppState { runner });
    let app = Router::new()
        .merge(router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // --- 6. Stop the Scheduler ---
    shutdown.cancel();
    scheduler
        .await
        .map_err(|e| NotifierError::Internal(format!("Scheduler task failed: {}", e)))?;
    info!("Notifier stopped");
    Ok(())
}

/// Resolves on Ctrl-C and cancels `token`, so the scheduler stops with the server.
async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Cannot listen for the shutdown signal: {}", e);
            }
            info!("Shutdown requested");
        }
        _ = token.cancelled() => {}
    }
    token.cancel();
}
