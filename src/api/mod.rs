pub mod error;
pub mod health;
pub mod images;
pub mod media;
pub mod preload;
pub mod response;
pub mod stats;

use axum::{
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::services::{AssetCatalog, ImageOptimizer};

#[derive(Clone)]
pub struct AppState {
    pub optimizer: Arc<ImageOptimizer>,
    pub catalog: Arc<AssetCatalog>,
    /// 目录文件路径，设置后目录变更会写回磁盘
    pub catalog_path: Option<PathBuf>,
}

/// 构建应用路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Media Preload Engine API v1.0" }))
        // Health
        .route("/api/health", get(health::health_check))
        // Catalog
        .route("/api/media", get(media::get_media_list).post(media::create_media))
        .route("/api/media/critical", get(media::get_critical_media))
        .route(
            "/api/media/:id",
            get(media::get_media_detail)
                .put(media::update_media)
                .delete(media::delete_media),
        )
        .route("/api/media/:id/optimized", get(media::get_optimized_media))
        // Image optimization
        .route("/api/images/optimize", post(images::optimize_image))
        .route("/api/images/optimize/batch", post(images::optimize_images))
        // Preload
        .route("/api/preload", post(preload::preload_images))
        .route("/api/preload/critical", post(preload::preload_critical))
        .route("/api/preload/status", get(preload::get_preload_status))
        .route("/api/preload/clear", post(preload::clear_preloaded))
        .route("/api/preload/resource", get(preload::get_preloaded_resource))
        // Stats
        .route("/api/stats/memory", get(stats::get_memory_stats))
        .route("/api/stats/performance", get(stats::get_performance_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
