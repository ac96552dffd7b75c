//! services/notifier/src/bootstrap.rs
//!
//! Startup wiring shared by the long-running service and the one-shot binary:
//! logging, the read-only database pool and the adapter graph behind a `PassRunner`.

use async_openai::{config::OpenAIConfig, Client};
use compliance_core::ports::ContentRenderer;
use compliance_core::{Dispatcher, NotificationPipeline};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::adapters::{OpenAiRenderer, SmtpMailTransport, SqliteRowStore, TemplateRenderer};
use crate::config::{Config, RendererKind};
use crate::error::NotifierError;
use crate::scheduler::PassRunner;

/// Installs the global tracing subscriber at the configured level.
pub fn init_tracing(config: &Config) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Logs the settings that change behaviour without being errors.
pub fn log_delivery_settings(config: &Config) {
    let delivery = &config.delivery;
    info!(
        "Mail server {}:{}, sender {}, primary recipient {}",
        config.smtp.server, config.smtp.port, delivery.from, delivery.primary
    );
    match &delivery.secondary {
        Some(secondary) => info!("Urgent escalations go to {}", secondary),
        None => warn!("RECIPIENT_EMAIL_2 is not set; urgent items will not be escalated"),
    }
    if delivery.dry_run {
        warn!("DRY_RUN is enabled: no e-mail will be sent");
    }
    let tables: Vec<&str> = config.entity_types.iter().map(|e| e.table.as_str()).collect();
    info!("Tracked tables: {}", tables.join(", "));
}

/// Connects to the database and assembles the pipeline behind a `PassRunner`.
pub async fn build_runner(config: &Config) -> Result<Arc<PassRunner>, NotifierError> {
    // --- 1. Connect to the Database (read-only) ---
    info!("Connecting to database...");
    let options = SqliteConnectOptions::from_str(&config.database_url)?.read_only(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    let store = Arc::new(SqliteRowStore::new(pool));

    // --- 2. Initialize Service Adapters ---
    let renderer: Arc<dyn ContentRenderer> = match &config.renderer {
        RendererKind::Template => Arc::new(TemplateRenderer::new()),
        RendererKind::OpenAi { api_key, model } => {
            info!("Using the AI renderer with model {}", model);
            let openai_config = OpenAIConfig::new().with_api_key(api_key.as_str());
            Arc::new(OpenAiRenderer::new(Client::with_config(openai_config), model.clone()))
        }
    };
    let transport = Arc::new(SmtpMailTransport::new(config.smtp.clone()));

    // --- 3. Assemble the Pipeline ---
    let dispatcher = Dispatcher::new(renderer, transport, config.delivery.clone());
    let pipeline = NotificationPipeline::new(store, config.entity_types.clone(), dispatcher);
    Ok(Arc::new(PassRunner::new(Arc::new(pipeline))))
}
