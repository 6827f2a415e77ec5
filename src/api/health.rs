use axum::{
    extract::State,
    response::IntoResponse,
};
use serde_json::json;

use super::AppState;
use super::error::ApiResult;
use super::response::success;

/// 健康检查端点
pub async fn health_check(
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let coordinator = state.optimizer.coordinator();
    let preload_status = if coordinator.is_disposed() {
        "disposed"
    } else {
        "running"
    };

    Ok(success(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "catalog_entries": state.catalog.len(),
        "preload": preload_status
    })))
}
