use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::api::error::{ApiError, ApiResult};
use crate::api::response::{success, success_message, ApiResponse, BatchError, BatchResponse};
use crate::models::DescriptorValidator;
use crate::services::preload::{LoadOutcome, TaskInfo};
use crate::services::{PreloadHooks, PreloadOptions, PreloadPriority, PreloadStrategy, ResourceStatus};
use super::AppState;

/// 单次预加载请求的地址数量上限
const MAX_PRELOAD_BATCH: usize = 50;
/// 客户端可请求的重试次数上限
const MAX_PRELOAD_RETRIES: u32 = 5;
/// 客户端可请求的单次超时上限
const MAX_PRELOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct PreloadRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub priority: Option<PreloadPriority>,
    #[serde(default)]
    pub strategy: Option<PreloadStrategy>,
    pub timeout_ms: Option<u64>,
    pub retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CriticalPreloadRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UrlParams {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ResourceParams {
    pub url: String,
    /// 未加载时先加载（只允许受信任来源）
    #[serde(default)]
    pub fetch: bool,
}

#[derive(Debug, Serialize)]
pub struct PreloadStatusResponse {
    pub url: String,
    pub status: ResourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// 把地址分成可加载的和被拒绝的（只允许受信任来源）
fn partition_trusted(urls: Vec<String>) -> ApiResult<(Vec<String>, Vec<BatchError>)> {
    if urls.is_empty() {
        return Err(ApiError::BadRequest("urls must not be empty".to_string()));
    }
    if urls.len() > MAX_PRELOAD_BATCH {
        return Err(ApiError::BadRequest(format!(
            "Too many urls: {} (max {})",
            urls.len(),
            MAX_PRELOAD_BATCH
        )));
    }

    let mut accepted = Vec::with_capacity(urls.len());
    let mut rejected = Vec::new();
    for url in urls {
        match DescriptorValidator::validate_src(&url) {
            Ok(()) => accepted.push(url),
            Err(e) => {
                tracing::warn!("Rejected preload of {}: {}", url, e);
                rejected.push(BatchError {
                    id: url,
                    error: e.to_string(),
                });
            }
        }
    }
    Ok((accepted, rejected))
}

fn batch_response(results: Vec<(String, LoadOutcome)>, mut errors: Vec<BatchError>) -> BatchResponse {
    let success_count = results.iter().filter(|(_, outcome)| outcome.is_ok()).count();
    for (url, outcome) in results {
        if let Err(e) = outcome {
            errors.push(BatchError {
                id: url,
                error: e.to_string(),
            });
        }
    }
    let failure_count = errors.len();
    BatchResponse::new(success_count, failure_count).with_errors(errors)
}

/// 在默认选项上应用请求参数，重试次数和超时有上限
fn request_options(defaults: PreloadOptions, request: &PreloadRequest) -> PreloadOptions {
    let mut options = defaults;
    if let Some(priority) = request.priority {
        options = options.with_priority(priority);
    }
    if let Some(strategy) = request.strategy {
        options = options.with_strategy(strategy);
    }
    if let Some(timeout_ms) = request.timeout_ms {
        options = options.with_timeout(Duration::from_millis(timeout_ms).min(MAX_PRELOAD_TIMEOUT));
    }
    if let Some(retries) = request.retries {
        options = options.with_retries(retries.min(MAX_PRELOAD_RETRIES));
    }
    options
}

/// 批量预加载
pub async fn preload_images(
    State(state): State<AppState>,
    Json(request): Json<PreloadRequest>,
) -> ApiResult<impl IntoResponse> {
    let options = request_options(state.optimizer.coordinator().default_options(), &request);
    let (accepted, rejected) = partition_trusted(request.urls)?;

    let results = state
        .optimizer
        .preload_images(&accepted, &options, PreloadHooks::default())
        .await;

    Ok(batch_response(results, rejected))
}

/// 预加载关键资源，响应中附带 `Link` 头
pub async fn preload_critical(
    State(state): State<AppState>,
    Json(request): Json<CriticalPreloadRequest>,
) -> ApiResult<Response> {
    let (accepted, rejected) = partition_trusted(request.urls)?;

    let results = state.optimizer.preload_critical_images(&accepted).await;
    let batch = batch_response(results, rejected);
    let status = batch.status();

    let mut response = (status, Json(ApiResponse::success(batch))).into_response();
    if let Some(link) = state.optimizer.coordinator().link_header() {
        let value: HeaderValue = link
            .parse()
            .map_err(|e| ApiError::Internal(format!("Invalid Link header: {}", e)))?;
        response.headers_mut().insert(header::LINK, value);
    }

    Ok(response)
}

/// 查询地址的预加载状态
pub async fn get_preload_status(
    State(state): State<AppState>,
    Query(params): Query<UrlParams>,
) -> ApiResult<impl IntoResponse> {
    let coordinator = state.optimizer.coordinator();

    Ok(success(PreloadStatusResponse {
        status: coordinator.status(&params.url),
        task: coordinator.task_info(&params.url),
        last_error: coordinator.last_error(&params.url).map(|e| e.to_string()),
        url: params.url,
    }))
}

/// 清除预加载数据，地址列表为空时全部清除
pub async fn clear_preloaded(
    State(state): State<AppState>,
    Json(request): Json<ClearRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.urls.is_empty() {
        state.optimizer.clear_preloaded::<String>(None);
        return Ok(success_message("All preloaded resources cleared".to_string()));
    }

    state.optimizer.clear_preloaded(Some(&request.urls[..]));
    Ok(success_message(format!(
        "Cleared {} preloaded resources",
        request.urls.len()
    )))
}

/// 返回已预加载资源的内容
pub async fn get_preloaded_resource(
    State(state): State<AppState>,
    Query(params): Query<ResourceParams>,
) -> ApiResult<Response> {
    let resource = match state.optimizer.coordinator().get(&params.url) {
        Some(resource) => resource,
        None if params.fetch => {
            DescriptorValidator::validate_src(&params.url)?;
            let options = state.optimizer.coordinator().default_options();
            state
                .optimizer
                .preload_image(&params.url, &options, PreloadHooks::default())
                .await?
        }
        None => {
            return Err(ApiError::NotFound(format!(
                "Resource {} is not preloaded",
                params.url
            )))
        }
    };

    let content_type = resource
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        resource.data.clone(),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(retries: Option<u32>, timeout_ms: Option<u64>) -> PreloadRequest {
        PreloadRequest {
            urls: Vec::new(),
            priority: Some(PreloadPriority::High),
            strategy: None,
            timeout_ms,
            retries,
        }
    }

    #[test]
    fn test_request_options_are_clamped() {
        let options = request_options(PreloadOptions::default(), &request(Some(u32::MAX), Some(u64::MAX)));
        assert_eq!(options.retries, MAX_PRELOAD_RETRIES);
        assert_eq!(options.timeout, MAX_PRELOAD_TIMEOUT);
        assert_eq!(options.priority, PreloadPriority::High);
    }

    #[test]
    fn test_request_options_keep_defaults() {
        let options = request_options(PreloadOptions::default(), &request(None, None));
        assert_eq!(options.retries, 2);
        assert_eq!(options.timeout, Duration::from_millis(10_000));

        let options = request_options(PreloadOptions::default(), &request(Some(0), Some(500)));
        assert_eq!(options.retries, 0);
        assert_eq!(options.timeout, Duration::from_millis(500));
    }
}
