use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::response::success;
use crate::services::{OptimizeImageOptions, OptimizedImageSummary};
use super::AppState;

/// 批量优化的数量上限
const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct OptimizeImageRequest {
    pub url: String,
    #[serde(flatten)]
    pub options: OptimizeImageOptions,
}

#[derive(Debug, Deserialize)]
pub struct BatchOptimizeRequest {
    pub urls: Vec<String>,
    #[serde(flatten)]
    pub options: OptimizeImageOptions,
}

/// 优化单张图片
pub async fn optimize_image(
    State(state): State<AppState>,
    Json(request): Json<OptimizeImageRequest>,
) -> ApiResult<impl IntoResponse> {
    let image = state.optimizer.optimize_image(&request.url, &request.options);
    Ok(success(image.summary()))
}

/// 批量优化图片（共用同一组选项）
pub async fn optimize_images(
    State(state): State<AppState>,
    Json(request): Json<BatchOptimizeRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.urls.is_empty() {
        return Err(ApiError::BadRequest("urls must not be empty".to_string()));
    }
    if request.urls.len() > MAX_BATCH_SIZE {
        return Err(ApiError::BadRequest(format!(
            "Too many urls: {} (max {})",
            request.urls.len(),
            MAX_BATCH_SIZE
        )));
    }

    let summaries: Vec<OptimizedImageSummary> = state
        .optimizer
        .optimize_images(&request.urls, &request.options)
        .iter()
        .map(|image| image.summary())
        .collect();

    Ok(success(summaries))
}
