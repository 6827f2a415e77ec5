use axum::{
    extract::State,
    response::IntoResponse,
};

use super::AppState;
use super::error::ApiResult;
use super::response::success;

/// 预加载内存占用
pub async fn get_memory_stats(
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.optimizer.memory_snapshot()))
}

/// 加载性能统计
pub async fn get_performance_stats(
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.optimizer.performance_snapshot()))
}
