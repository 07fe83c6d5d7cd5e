use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gymdesk_core::api::{create_router, AppState};
use gymdesk_core::assistant::configure_lm;
use gymdesk_core::{Config, EventBus, GymDb};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gymdesk=debug,gymdesk_core=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🏋️ GymDesk starting up...");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Configuration loaded");
    info!("  LLM API: {}", config.llm_api_url);
    info!("  Model: {}", config.llm_model);
    info!("  Embedding model: {}", config.embedding_model);
    info!("  Gym timezone: {}", config.gym_timezone);

    // Run database migrations first
    {
        use diesel::prelude::*;
        use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
        pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

        let mut conn = diesel::PgConnection::establish(&config.database_url)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
        info!("Database migrations applied");
    }

    // Configure DSRs LM globally (required before any assistant session)
    configure_lm(&config.llm_api_url, &config.llm_api_key, &config.llm_model).await?;
    info!("DSRs LM configured");

    if config.langsmith_api_key.is_some() {
        info!("LangSmith API key present");
    }
    if config.resend_api_key.is_none() {
        warn!("RESEND_API_KEY not set - ticket emails disabled");
    }
    if let Some(ref to) = config.email_override_recipient {
        warn!("📧 Testing mode: all email goes to {}", to);
    }
    if !config.invites_enabled() {
        warn!("AUTH_URL / AUTH_SERVICE_KEY not set - team invites disabled");
    }

    let events = EventBus::new();
    let db = Arc::new(GymDb::connect(&config.database_url, events.clone())?);
    let port = config.http_port;
    let state = AppState::build(config, db, events)?;

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🏋️ GymDesk API listening on port {}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;

    Ok(())
}
