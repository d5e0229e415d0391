//! CLI subcommands. Thin glue over the library crates.

pub mod dispatch;
pub mod init;
pub mod status;
pub mod submit;

use anyhow::Context;
use std::sync::Arc;
use taskloom_config::AppConfig;
use taskloom_core::namespace::Namespace;
use taskloom_core::provider::EmbeddingProvider;
use taskloom_memory::{InMemoryVectorIndex, MemoryManager, SqliteStore};
use taskloom_providers::{HashEmbedder, HttpEmbeddingProvider};

/// Everything a subcommand needs: config, resolved namespace, and a wired
/// memory manager over the SQLite store.
pub struct AppContext {
    pub config: AppConfig,
    pub namespace: Namespace,
    pub memory: Arc<MemoryManager>,
}

/// Open the stores for the configured project. Fatal if the namespace
/// marker is missing — run `taskloom init` first.
pub async fn open() -> anyhow::Result<AppContext> {
    let config = AppConfig::load().context("Failed to load config")?;

    let namespace = Namespace::read_from(&config.namespace_path())
        .context("No namespace resolved — run `taskloom init` first")?;

    let database = config.database_path();
    let store = Arc::new(
        SqliteStore::new(&format!("sqlite://{}", database.display()))
            .await
            .context("Failed to open database")?,
    );

    let vectors = Arc::new(
        InMemoryVectorIndex::with_all_collections(config.embedding.dimension)
            .await
            .context("Failed to create vector collections")?,
    );

    let embedder: Arc<dyn EmbeddingProvider> = if config.embedding.api_url.is_empty() {
        Arc::new(HashEmbedder::new(config.embedding.dimension))
    } else {
        Arc::new(HttpEmbeddingProvider::new(
            config.embedding.api_url.clone(),
            config.embedding.api_key.clone().unwrap_or_default(),
            config.embedding.model.clone(),
            config.embedding.dimension,
        )?)
    };

    let memory = Arc::new(
        MemoryManager::new(store.clone(), store, vectors, embedder)
            .with_history_window(config.context.history_window)
            .with_search_top_k(config.context.search_top_k),
    );

    Ok(AppContext {
        config,
        namespace,
        memory,
    })
}
