use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use citemetrics::config::Config;
use citemetrics::rest;
use citemetrics::snapshot::SnapshotStore;
use citemetrics::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let adapters = config.build_adapters();
    tracing::info!(
        "initialized {} sources, data_dir={}",
        adapters.len(),
        config.data_dir.display()
    );

    let engine = Arc::new(Engine::new(
        adapters,
        SnapshotStore::new(&config.data_dir),
        config.per_source_timeout,
        config.run_timeout,
    ));
    let router = rest::build_router(engine);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;

    Ok(())
}
