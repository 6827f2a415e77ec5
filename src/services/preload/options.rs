// 预加载选项与回调

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::LoadError;
use crate::config::PreloadDefaults;

/// 预加载优先级
///
/// 批量加载时决定处理顺序和窗口大小
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PreloadPriority {
    High,
    Low,
    #[default]
    Auto,
}

impl PreloadPriority {
    /// 批量加载的窗口大小：high 为 3，其余为 1
    pub fn window_size(&self) -> usize {
        match self {
            PreloadPriority::High => 3,
            PreloadPriority::Low | PreloadPriority::Auto => 1,
        }
    }
}

/// 加载策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PreloadStrategy {
    #[default]
    Preload,
    Lazy,
    Eager,
}

/// 预加载选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadOptions {
    pub priority: PreloadPriority,
    pub strategy: PreloadStrategy,
    /// 单次尝试的超时预算（默认 10 秒）
    pub timeout: Duration,
    /// 首次失败后的额外尝试次数（默认 2）
    pub retries: u32,
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self::from(&PreloadDefaults::default())
    }
}

impl From<&PreloadDefaults> for PreloadOptions {
    fn from(defaults: &PreloadDefaults) -> Self {
        Self {
            priority: PreloadPriority::default(),
            strategy: PreloadStrategy::default(),
            timeout: Duration::from_millis(defaults.timeout_ms),
            retries: defaults.retries,
        }
    }
}

impl PreloadOptions {
    pub fn with_priority(mut self, priority: PreloadPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_strategy(mut self, strategy: PreloadStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

pub type LoadCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&str, &LoadError) + Send + Sync>;
pub type ProgressCallback = Arc<dyn Fn(&str, u8) + Send + Sync>;

/// 请求回调
///
/// 仅用于通知，不影响任务状态机。
/// 每个请求恰好收到一次终止通知（on_load 或 on_error）。
#[derive(Clone, Default)]
pub struct PreloadHooks {
    pub on_load: Option<LoadCallback>,
    pub on_error: Option<ErrorCallback>,
    /// 进度百分比（尽力而为，仅在能获知总大小时上报）
    pub on_progress: Option<ProgressCallback>,
}

impl PreloadHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_load(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_load = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&str, &LoadError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(&str, u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub(crate) fn notify_load(&self, location: &str) {
        if let Some(callback) = &self.on_load {
            callback(location);
        }
    }

    pub(crate) fn notify_error(&self, location: &str, error: &LoadError) {
        if let Some(callback) = &self.on_error {
            callback(location, error);
        }
    }
}

impl fmt::Debug for PreloadHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreloadHooks")
            .field("on_load", &self.on_load.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}
