// 图片优化门面 - 组合 URL 变体生成与预加载协调
//
// 本模块提供：
// - 单张/批量图片的地址优化与响应式变体
// - 按描述符优先级自动预加载
// - 加载统计（请求数、错误数、平均加载耗时）
// - 定期输出统计快照的后台任务

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::preload::{
    LoadError, LoadOutcome, LocationExtractor, MemorySnapshot, ObservedElement, PreloadCoordinator, PreloadHooks,
    PreloadOptions, PreloadPriority, PreloadTicket, Rect,
};
use super::variants::{TransformOptions, UrlOptimizer, VariantSet, FALLBACK_LOCATION};
use crate::models::{Dimensions, MediaDescriptor, MediaPriority};

/// 图片优化选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizeImageOptions {
    #[serde(flatten)]
    pub transform: TransformOptions,
    #[serde(default)]
    pub priority: PreloadPriority,
    /// 创建后立即在后台预加载
    #[serde(default)]
    pub preload: bool,
    /// 生成五档响应式变体（需要同时提供尺寸）
    #[serde(default)]
    pub responsive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

/// 优化后的图片
#[derive(Clone)]
pub struct OptimizedImage {
    pub location: String,
    pub optimized_location: String,
    pub variant_set: Option<VariantSet>,
    pub dimensions: Option<Dimensions>,
    pub priority: PreloadPriority,
    optimizer: ImageOptimizer,
}

/// `OptimizedImage` 的可序列化视图（包含当前加载状态）
#[derive(Debug, Clone, Serialize)]
pub struct OptimizedImageSummary {
    pub location: String,
    pub optimized_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_set: Option<VariantSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srcset: Option<String>,
    pub is_preloaded: bool,
    pub is_loading: bool,
}

impl OptimizedImage {
    pub fn is_preloaded(&self) -> bool {
        self.optimizer.is_preloaded(&self.optimized_location)
    }

    pub fn is_loading(&self) -> bool {
        self.optimizer.is_loading(&self.optimized_location)
    }

    /// 预加载优化后的地址并等待结果
    pub async fn preload(&self) -> LoadOutcome {
        let options = self.optimizer.preload_options(self.priority);
        self.optimizer
            .preload_image(&self.optimized_location, &options, PreloadHooks::default())
            .await
    }

    /// 清除该图片的预加载数据
    pub fn clear(&self) {
        let locations = [self.optimized_location.as_str()];
        self.optimizer.clear_preloaded(Some(&locations[..]));
    }

    /// 响应式变体的 `srcset` 字符串
    pub fn srcset(&self) -> Option<String> {
        match (&self.variant_set, self.dimensions) {
            (Some(variants), Some(dimensions)) => Some(UrlOptimizer::srcset(variants, dimensions)),
            _ => None,
        }
    }

    pub fn summary(&self) -> OptimizedImageSummary {
        OptimizedImageSummary {
            location: self.location.clone(),
            optimized_location: self.optimized_location.clone(),
            variant_set: self.variant_set.clone(),
            srcset: self.srcset(),
            is_preloaded: self.is_preloaded(),
            is_loading: self.is_loading(),
        }
    }

    /// 在后台预加载（不等待结果）
    fn spawn_preload(&self) {
        if self.optimized_location == FALLBACK_LOCATION {
            return;
        }
        let image = self.clone();
        tokio::spawn(async move {
            let _ = image.preload().await;
        });
    }
}

impl std::fmt::Debug for OptimizedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizedImage")
            .field("location", &self.location)
            .field("optimized_location", &self.optimized_location)
            .field("variant_set", &self.variant_set)
            .field("priority", &self.priority)
            .finish()
    }
}

/// 性能统计快照
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSnapshot {
    pub total_requested: u64,
    pub loaded_count: usize,
    pub loading_count: usize,
    pub error_count: u64,
    /// 请求开始到成功回调的平均耗时（毫秒）
    pub average_load_time_ms: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct TrackerState {
    total_requested: u64,
    error_count: u64,
    completed: u64,
    average_load_time_ms: f64,
    started: HashMap<String, Instant>,
}

/// 加载统计
///
/// 已加载/加载中数量不在这里计数，而是生成快照时从协调器实时读取
#[derive(Default)]
pub struct PerformanceTracker {
    state: Mutex<TrackerState>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 记录一次请求
    ///
    /// 已加载的地址（`cached`）只计数，不参与平均耗时；
    /// 同一地址以最早的开始时间为准
    pub fn record_request(&self, location: &str, cached: bool) {
        let mut state = self.state();
        state.total_requested += 1;
        if cached {
            return;
        }
        state
            .started
            .entry(location.to_string())
            .or_insert_with(Instant::now);
    }

    pub fn record_success(&self, location: &str) {
        let mut state = self.state();
        let Some(started) = state.started.remove(location) else {
            return;
        };
        let sample = started.elapsed().as_secs_f64() * 1000.0;
        state.completed += 1;
        // 增量均值
        state.average_load_time_ms += (sample - state.average_load_time_ms) / state.completed as f64;
    }

    pub fn record_error(&self, location: &str) {
        let mut state = self.state();
        state.error_count += 1;
        state.started.remove(location);
    }

    /// 包装调用方回调，先更新统计再转发
    pub fn hooks(self: &Arc<Self>, user: PreloadHooks) -> PreloadHooks {
        let on_load = {
            let tracker = Arc::clone(self);
            let user = user.on_load.clone();
            move |location: &str| {
                tracker.record_success(location);
                if let Some(callback) = &user {
                    callback(location);
                }
            }
        };
        let on_error = {
            let tracker = Arc::clone(self);
            let user = user.on_error.clone();
            move |location: &str, error: &LoadError| {
                tracker.record_error(location);
                if let Some(callback) = &user {
                    callback(location, error);
                }
            }
        };

        PreloadHooks {
            on_progress: user.on_progress,
            ..PreloadHooks::new().on_load(on_load).on_error(on_error)
        }
    }

    pub fn snapshot(&self, coordinator: &PreloadCoordinator) -> PerformanceSnapshot {
        let memory = coordinator.memory_snapshot();
        let state = self.state();
        PerformanceSnapshot {
            total_requested: state.total_requested,
            loaded_count: memory.loaded_count,
            loading_count: memory.loading_count,
            error_count: state.error_count,
            average_load_time_ms: state.average_load_time_ms,
            timestamp: Utc::now(),
        }
    }
}

/// 图片优化门面
#[derive(Clone)]
pub struct ImageOptimizer {
    coordinator: PreloadCoordinator,
    tracker: Arc<PerformanceTracker>,
}

impl ImageOptimizer {
    pub fn new(coordinator: PreloadCoordinator) -> Self {
        Self {
            coordinator,
            tracker: Arc::new(PerformanceTracker::new()),
        }
    }

    pub fn coordinator(&self) -> &PreloadCoordinator {
        &self.coordinator
    }

    fn preload_options(&self, priority: PreloadPriority) -> PreloadOptions {
        self.coordinator.default_options().with_priority(priority)
    }

    fn track(&self, location: &str) {
        let cached = self.coordinator.is_preloaded(location);
        self.tracker.record_request(location, cached);
    }

    /// 优化单张图片，`options.preload` 为 true 时在后台预加载
    pub fn optimize_image(&self, location: &str, options: &OptimizeImageOptions) -> OptimizedImage {
        let optimized_location = UrlOptimizer::optimize(location, &options.transform);
        let variant_set = match options.dimensions {
            Some(dimensions) if options.responsive => {
                Some(UrlOptimizer::responsive_set(location, Some(dimensions)))
            }
            _ => None,
        };

        let image = OptimizedImage {
            location: location.to_string(),
            optimized_location,
            variant_set,
            dimensions: options.dimensions,
            priority: options.priority,
            optimizer: self.clone(),
        };

        if options.preload {
            image.spawn_preload();
        }
        image
    }

    pub fn optimize_images<S: AsRef<str>>(
        &self,
        locations: &[S],
        options: &OptimizeImageOptions,
    ) -> Vec<OptimizedImage> {
        locations
            .iter()
            .map(|location| self.optimize_image(location.as_ref(), options))
            .collect()
    }

    /// 按描述符优化
    ///
    /// 使用描述符的地址和尺寸（选项中的尺寸优先）。
    /// 描述符优先级为 high 且地址既未加载也不在加载中时，自动在后台预加载
    pub fn optimize_media_descriptor(
        &self,
        descriptor: &MediaDescriptor,
        options: &OptimizeImageOptions,
    ) -> OptimizedImage {
        let critical = descriptor.priority == MediaPriority::High;
        let options = OptimizeImageOptions {
            dimensions: options.dimensions.or(descriptor.dimensions),
            priority: if critical {
                PreloadPriority::High
            } else {
                options.priority
            },
            preload: false,
            ..options.clone()
        };

        let image = self.optimize_image(&descriptor.src, &options);
        let idle = !image.is_preloaded() && !image.is_loading();
        if critical && idle {
            debug!("高优先级描述符，自动预加载: {}", descriptor.id);
            image.spawn_preload();
        }
        image
    }

    /// 预加载单个地址
    pub async fn preload_image(&self, location: &str, options: &PreloadOptions, hooks: PreloadHooks) -> LoadOutcome {
        self.track(location);
        self.coordinator
            .request(location, options, self.tracker.hooks(hooks))
            .await
    }

    pub async fn preload_images<S: AsRef<str>>(
        &self,
        locations: &[S],
        options: &PreloadOptions,
        hooks: PreloadHooks,
    ) -> Vec<(String, LoadOutcome)> {
        for location in locations {
            self.track(location.as_ref());
        }
        self.coordinator
            .request_many(locations, options, self.tracker.hooks(hooks))
            .await
    }

    /// 关键图片：创建提前获取提示并以 high 优先级加载
    pub async fn preload_critical_images<S: AsRef<str>>(&self, locations: &[S]) -> Vec<(String, LoadOutcome)> {
        for location in locations {
            self.track(location.as_ref());
        }
        self.coordinator
            .request_critical(locations, self.tracker.hooks(PreloadHooks::default()))
            .await
    }

    pub fn is_preloaded(&self, location: &str) -> bool {
        self.coordinator.is_preloaded(location)
    }

    pub fn is_loading(&self, location: &str) -> bool {
        self.coordinator.is_loading(location)
    }

    /// 清除指定地址；传入 None 时全部清除
    pub fn clear_preloaded<S: AsRef<str>>(&self, locations: Option<&[S]>) {
        match locations {
            Some(locations) => self.coordinator.clear_preloaded(locations),
            None => self.coordinator.clear_all(),
        }
    }

    pub fn memory_snapshot(&self) -> MemorySnapshot {
        self.coordinator.memory_snapshot()
    }

    pub fn performance_snapshot(&self) -> PerformanceSnapshot {
        self.tracker.snapshot(&self.coordinator)
    }

    /// 注册懒加载元素
    pub fn observe(&self, element: ObservedElement, extractor: Option<LocationExtractor>) {
        self.coordinator.observe(element, extractor);
    }

    /// 视口变化，返回新发起的懒加载请求
    ///
    /// 统计通过回调更新，丢弃返回的凭据不影响计数
    pub fn update_viewport(&self, viewport: Rect) -> Vec<PreloadTicket> {
        let options = self.coordinator.lazy_options();
        let hooks = self.tracker.hooks(PreloadHooks::default());
        self.coordinator
            .take_viewport_hits(viewport)
            .iter()
            .map(|location| {
                self.track(location);
                self.coordinator.begin(location, &options, hooks.clone())
            })
            .collect()
    }
}

/// 定期输出性能快照
pub struct PerformanceMonitor {
    optimizer: ImageOptimizer,
    interval: Duration,
}

impl PerformanceMonitor {
    pub fn new(optimizer: ImageOptimizer, interval: Duration) -> Self {
        Self { optimizer, interval }
    }

    /// 启动定期快照任务
    pub async fn start(self) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;
            let snapshot = self.optimizer.performance_snapshot();
            info!(
                "预加载统计: 请求 {} 次, 已加载 {}, 加载中 {}, 错误 {}, 平均耗时 {:.1}ms",
                snapshot.total_requested,
                snapshot.loaded_count,
                snapshot.loading_count,
                snapshot.error_count,
                snapshot.average_load_time_ms
            );
        }
    }
}
