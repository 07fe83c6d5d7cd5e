//! Embed knowledge base entries that have no embedding yet
//!
//! Usage:
//!   cargo run --bin embed-knowledge
//!
//! Entries whose content changed have their embedding cleared, so running
//! this after edits refreshes them too.

use anyhow::Result;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gymdesk_core::embedding::EmbeddingService;
use gymdesk_core::{Config, EventBus, GymDb};

/// Pause between entries to stay under the provider's rate limit
const PAUSE: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "embed_knowledge=info,gymdesk_core=info,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let db = GymDb::connect(&config.database_url, EventBus::new())?;
    let embeddings = EmbeddingService::new(
        &config.llm_api_url,
        &config.llm_api_key,
        &config.embedding_model,
    );

    let pending = db.knowledge().missing_embeddings()?;
    if pending.is_empty() {
        info!("No knowledge base entries need embeddings");
        return Ok(());
    }
    info!("Found {} entries to embed", pending.len());

    let mut embedded = 0usize;
    for (i, entry) in pending.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(PAUSE).await;
        }

        let embedding = match embeddings.embed(&entry.embedding_text).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Skipping entry {}: embedding failed: {}", entry.id, e);
                continue;
            }
        };

        match db.knowledge().set_embedding(entry.id, embedding) {
            Ok(()) => {
                embedded += 1;
                info!("✅ Embedded entry {} ({}/{})", entry.id, i + 1, pending.len());
            }
            Err(e) => error!("Failed to store embedding for {}: {}", entry.id, e),
        }
    }

    info!(
        "Done: {} embedded, {} failed",
        embedded,
        pending.len() - embedded
    );
    Ok(())
}
