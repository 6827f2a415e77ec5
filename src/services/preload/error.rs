// 预加载错误类型定义
//
// 所有错误都实现 Clone：同一个任务的结果会分发给所有等待者

use std::time::Duration;
use thiserror::Error;

/// 单次获取的错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("网络错误: {0}")]
    Network(String),

    #[error("HTTP 错误: 状态码 {0}")]
    HttpStatus(u16),

    #[error("无效的 URL: {0}")]
    InvalidUrl(String),

    #[error("获取任务中断: {0}")]
    Aborted(String),
}

/// 加载错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// 超过超时预算仍未完成
    #[error("加载超时 ({0:?})")]
    Timeout(Duration),

    /// 获取或解码失败
    #[error("加载失败: {0}")]
    Failure(#[from] FetchError),

    /// 重试次数耗尽，携带最后一次错误
    #[error("重试耗尽，共尝试 {attempts} 次: {last}")]
    RetryExhausted { attempts: u32, last: Box<LoadError> },

    /// 协调器已释放
    #[error("预加载协调器已释放")]
    Disposed,
}

impl LoadError {
    /// 重试耗尽前的最后一个错误（非 RetryExhausted 时返回自身）
    pub fn last_error(&self) -> &LoadError {
        match self {
            LoadError::RetryExhausted { last, .. } => last.last_error(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.last_error(), LoadError::Timeout(_))
    }
}

// 实现从 reqwest::Error 到 FetchError 的转换
impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_status() {
            if let Some(status) = err.status() {
                return FetchError::HttpStatus(status.as_u16());
            }
        }
        if err.is_builder() {
            if let Some(url) = err.url() {
                return FetchError::InvalidUrl(url.to_string());
            }
        }
        FetchError::Network(err.to_string())
    }
}

impl From<tokio::task::JoinError> for FetchError {
    fn from(err: tokio::task::JoinError) -> Self {
        FetchError::Aborted(err.to_string())
    }
}
