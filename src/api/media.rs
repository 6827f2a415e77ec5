use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::response::{success, ApiResponse};
use crate::models::{Dimensions, MediaCategory, MediaDescriptor, MediaPriority};
use crate::services::{ImageFit, ImageFormat, OptimizeImageOptions, TransformOptions};
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct MediaListParams {
    pub category: Option<String>,
}

/// 创建描述符请求
#[derive(Debug, Deserialize)]
pub struct CreateMediaRequest {
    pub id: Option<String>,
    pub name: String,
    pub category: MediaCategory,
    pub src: String,
    pub alt: Option<String>,
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub priority: MediaPriority,
}

/// 更新描述符请求（缺省字段保持不变）
#[derive(Debug, Deserialize)]
pub struct UpdateMediaRequest {
    pub name: Option<String>,
    pub category: Option<MediaCategory>,
    pub src: Option<String>,
    pub alt: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub priority: Option<MediaPriority>,
}

/// 优化参数（查询字符串）
#[derive(Debug, Default, Deserialize)]
pub struct OptimizedMediaParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub quality: Option<u8>,
    pub format: Option<ImageFormat>,
    pub fit: Option<ImageFit>,
    #[serde(default)]
    pub responsive: bool,
}

/// 获取媒体列表，可按类别过滤
pub async fn get_media_list(
    State(state): State<AppState>,
    Query(params): Query<MediaListParams>,
) -> ApiResult<impl IntoResponse> {
    let items = match params.category.as_deref() {
        Some(raw) => {
            let category: MediaCategory = raw.parse().map_err(ApiError::BadRequest)?;
            state.catalog.by_category(category)
        }
        None => state.catalog.all_active(),
    };

    Ok(success(items))
}

/// 获取关键图片列表
pub async fn get_critical_media(
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(state.catalog.by_critical_priority()))
}

/// 获取媒体详情
pub async fn get_media_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let descriptor = state
        .catalog
        .lookup(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Media {} not found", id)))?;

    Ok(success(descriptor))
}

/// 获取优化后的媒体地址（高优先级描述符会自动开始预加载）
pub async fn get_optimized_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<OptimizedMediaParams>,
) -> ApiResult<impl IntoResponse> {
    let descriptor = state
        .catalog
        .lookup(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Media {} not found", id)))?;

    let options = OptimizeImageOptions {
        transform: TransformOptions {
            width: params.width,
            height: params.height,
            quality: params.quality,
            format: params.format,
            fit: params.fit,
        },
        responsive: params.responsive,
        ..Default::default()
    };

    let image = state.optimizer.optimize_media_descriptor(&descriptor, &options);
    Ok(success(image.summary()))
}

/// 创建描述符
pub async fn create_media(
    State(state): State<AppState>,
    Json(request): Json<CreateMediaRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut descriptor = MediaDescriptor::new(request.name, request.category, request.src)
        .with_priority(request.priority);
    if let Some(id) = request.id {
        descriptor = descriptor.with_id(id);
    }
    descriptor.alt = request.alt;
    descriptor.dimensions = request.dimensions;

    state.catalog.add(descriptor.clone())?;
    persist_catalog(&state).await?;

    tracing::info!("Created media descriptor: {}", descriptor.id);
    Ok(ApiResponse::success_with_message(descriptor, "Media created"))
}

/// 更新描述符
pub async fn update_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateMediaRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut descriptor = state
        .catalog
        .lookup(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Media {} not found", id)))?;

    if let Some(name) = request.name {
        descriptor.name = name;
    }
    if let Some(category) = request.category {
        descriptor.category = category;
    }
    if let Some(src) = request.src {
        descriptor.src = src;
    }
    if request.alt.is_some() {
        descriptor.alt = request.alt;
    }
    if request.dimensions.is_some() {
        descriptor.dimensions = request.dimensions;
    }
    if let Some(priority) = request.priority {
        descriptor.priority = priority;
    }

    state.catalog.update(descriptor)?;
    persist_catalog(&state).await?;

    let updated = state
        .catalog
        .lookup(&id)
        .ok_or_else(|| ApiError::Internal(format!("Media {} vanished after update", id)))?;
    Ok(ApiResponse::success_with_message(updated, "Media updated"))
}

/// 软删除描述符
pub async fn delete_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.catalog.soft_delete(&id)?;
    persist_catalog(&state).await?;

    tracing::info!("Soft-deleted media descriptor: {}", id);
    Ok(ApiResponse::<()>::message(format!("Media {} deleted", id)))
}

/// 配置了目录文件时，变更后写回磁盘
async fn persist_catalog(state: &AppState) -> ApiResult<()> {
    if let Some(path) = &state.catalog_path {
        state
            .catalog
            .save(path)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to save catalog: {}", e)))?;
    }
    Ok(())
}
