use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use media_preload_backend::api::{self, AppState};
use media_preload_backend::config::EngineConfig;
use media_preload_backend::services::{
    AssetCatalog, ImageOptimizer, PerformanceMonitor, PreloadCoordinator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Load engine config
    let config_path = std::env::var("ENGINE_CONFIG_PATH").ok().map(PathBuf::from);
    let config = EngineConfig::load(config_path).await?;

    // Load asset catalog
    let catalog_path = std::env::var("CATALOG_PATH").ok().map(PathBuf::from);
    let catalog = AssetCatalog::load(catalog_path.clone()).await?;
    tracing::info!("Asset catalog ready ({} entries)", catalog.len());

    // Initialize preload coordinator and optimizer
    let coordinator = PreloadCoordinator::with_http(&config)?;
    let optimizer = ImageOptimizer::new(coordinator);

    // Start performance monitor
    let monitor = PerformanceMonitor::new(optimizer.clone(), config.stats_interval());
    tokio::spawn(monitor.start());

    let app = api::create_router(AppState {
        optimizer: Arc::new(optimizer),
        catalog: Arc::new(catalog),
        catalog_path,
    });

    // Run the server
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("🚀 Server listening on {}", addr);
    tracing::info!(
        "📊 Performance monitor started (interval: {}s)",
        config.stats_interval().as_secs()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
