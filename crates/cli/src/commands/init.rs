//! `taskloom init` — Initialize the data directory and namespace marker.

use anyhow::Context;
use taskloom_config::AppConfig;
use taskloom_core::namespace::Namespace;
use taskloom_memory::SqliteStore;

pub async fn run(namespace: &str) -> anyhow::Result<()> {
    let namespace = Namespace::new(namespace).context("Invalid namespace")?;
    let config = AppConfig::load().context("Failed to load config")?;

    std::fs::create_dir_all(&config.data_dir).context("Cannot create data directory")?;

    // Write a sample config next to the data dir if none exists yet
    let config_path = std::path::Path::new("taskloom.toml");
    if !config_path.exists() {
        std::fs::write(config_path, AppConfig::default_toml())
            .context("Cannot write taskloom.toml")?;
        println!("  Wrote taskloom.toml");
    }

    namespace
        .write_to(&config.namespace_path())
        .context("Cannot write namespace marker")?;

    // Open the database once so migrations run now, not on first dispatch
    let database = config.database_path();
    SqliteStore::new(&format!("sqlite://{}", database.display()))
        .await
        .context("Failed to initialize database")?;

    println!("Initialized project '{namespace}'");
    println!("  Data dir:  {}", config.data_dir.display());
    println!("  Database:  {}", database.display());
    Ok(())
}
