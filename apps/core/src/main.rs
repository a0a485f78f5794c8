// StudioChat Backend Entry Point
// "The Brain" - classifier, flow engine and knowledge-grounded generation
// behind the studio's chat widget.

mod actors;
mod brain;
mod config;
mod database;
mod error;
mod flow;
mod fs_manager;
mod http;
mod knowledge;
mod models;
mod net;
mod prompt;
mod rate_limiter;

#[cfg(test)]
mod tests;

use crate::actors::supervisor::SupervisorHandle;
use crate::config::Settings;
use crate::fs_manager::PortablePathManager;
use crate::knowledge::KnowledgeStore;
use std::sync::Arc;
use tracing::{error, info};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let formatting_layer = BunyanFormattingLayer::new("studiochat-core".into(), std::io::stdout);

    Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let settings = Settings::from_env()?;

    // Initialize File System (Portable)
    if let Err(e) = PortablePathManager::init() {
        error!("Failed to initialize portable file system: {}", e);
    }

    // Initialize Database. A broken database degrades the service (no
    // history, no analytics) but never blocks the chat itself.
    let db_url = format!("sqlite://{}", settings.db_path.to_string_lossy());
    let pool = match database::init_db(&db_url).await {
        Ok(pool) => Some(pool),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            None
        }
    };

    // Load the knowledge corpus.
    let store = Arc::new(KnowledgeStore::load(&settings.knowledge_dir));
    if store.is_empty() {
        error!(
            "Knowledge base is empty; check {:?}. Replies will lack studio facts.",
            settings.knowledge_dir
        );
    }

    // Spawn the actor system.
    let supervisor = SupervisorHandle::new(&settings, store.clone());

    // Serve.
    let state = http::AppState::new(&settings, supervisor, store, pool);
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!("StudioChat listening on {}", settings.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
