// 预加载协调器 - 资源加载的调度中心
//
// 本模块负责：
// - 按地址去重（同一地址同时只有一个加载任务）
// - 超时控制与指数退避重试
// - 批量加载的优先级窗口
// - 关键资源的提前获取提示
// - 视口触发的懒加载
//
// 任务状态：Queued -> Loading -> (Backoff -> Loading)* -> 已加载 | 失败
// 到达终止状态后任务即移出进行中索引。

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::error::{FetchError, LoadError};
use super::fetcher::{FetchedResource, HttpFetcher, ProgressFn, ResourceFetcher};
use super::hints::EarlyFetchHint;
use super::observer::{data_src_extractor, LocationExtractor, ObservedElement, Rect, ViewportObserver};
use super::options::{PreloadHooks, PreloadOptions, PreloadPriority, PreloadStrategy};
use crate::config::EngineConfig;
use crate::models::Dimensions;

/// 已加载并保留以供复用的资源
#[derive(Debug)]
pub struct LoadedResource {
    pub location: String,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    /// 观察到的原始尺寸
    pub natural_size: Option<Dimensions>,
    pub loaded_at: DateTime<Utc>,
    /// 从任务开始到加载成功的耗时（包含重试）
    pub load_duration: Duration,
}

impl LoadedResource {
    fn new(location: String, fetched: FetchedResource, load_duration: Duration) -> Self {
        Self {
            location,
            data: fetched.data,
            content_type: fetched.content_type,
            natural_size: fetched.natural_size,
            loaded_at: Utc::now(),
            load_duration,
        }
    }
}

/// 一次请求的最终结果
pub type LoadOutcome = Result<Arc<LoadedResource>, LoadError>;

/// 进行中任务的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Loading,
    /// 失败后等待重试
    Backoff,
}

/// 地址的对外可见状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    NotLoaded,
    Loading,
    Loaded,
    /// 最近一次任务重试耗尽；可以重新请求
    Failed,
}

/// 进行中任务的只读视图
#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    pub location: String,
    pub priority: PreloadPriority,
    pub strategy: PreloadStrategy,
    pub state: TaskState,
    /// 当前尝试序号（从 0 开始）
    pub attempt: u32,
    pub max_attempts: u32,
}

/// 内存占用快照
#[derive(Debug, Clone, Serialize)]
pub struct MemorySnapshot {
    pub loaded_count: usize,
    pub loading_count: usize,
    pub hint_count: usize,
    pub failed_count: usize,
    /// 已加载资源的字节总数
    pub total_bytes: usize,
    pub loaded_locations: Vec<String>,
}

/// 任务的回调登记表，任务结束时逐个通知
type Listeners = Arc<Mutex<Vec<PreloadHooks>>>;

struct InFlightTask {
    options: PreloadOptions,
    state: TaskState,
    attempt: u32,
    result: watch::Receiver<Option<LoadOutcome>>,
    listeners: Listeners,
}

struct Shared {
    fetcher: Arc<dyn ResourceFetcher>,
    /// 已加载索引：无容量上限、无过期，只能显式清除
    loaded: Cache<String, Arc<LoadedResource>>,
    in_flight: Mutex<HashMap<String, InFlightTask>>,
    hints: Mutex<HashMap<String, EarlyFetchHint>>,
    failures: Mutex<HashMap<String, LoadError>>,
    observer: Mutex<ViewportObserver>,
    defaults: PreloadOptions,
    backoff_base: Duration,
    disposed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn notify(hooks: &PreloadHooks, location: &str, outcome: &LoadOutcome) {
    match outcome {
        Ok(_) => hooks.notify_load(location),
        Err(err) => hooks.notify_error(location, err),
    }
}

/// 预加载协调器
///
/// 克隆开销很小，所有克隆共享同一组索引。
/// `begin` 会派生后台任务，必须在 tokio 运行时内调用。
#[derive(Clone)]
pub struct PreloadCoordinator {
    shared: Arc<Shared>,
}

impl PreloadCoordinator {
    /// 创建协调器
    pub fn new(fetcher: Arc<dyn ResourceFetcher>, config: &EngineConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                fetcher,
                loaded: Cache::builder().build(),
                in_flight: Mutex::new(HashMap::new()),
                hints: Mutex::new(HashMap::new()),
                failures: Mutex::new(HashMap::new()),
                observer: Mutex::new(ViewportObserver::new(config.observer.clone())),
                defaults: PreloadOptions::from(&config.preload),
                backoff_base: config.backoff_base(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// 使用 HTTP 获取器创建协调器
    pub fn with_http(config: &EngineConfig) -> Result<Self, FetchError> {
        Ok(Self::new(Arc::new(HttpFetcher::new()?), config))
    }

    /// 配置中的默认选项
    pub fn default_options(&self) -> PreloadOptions {
        self.shared.defaults.clone()
    }

    /// 发起请求（同步登记，立即返回凭据）
    ///
    /// - 已加载：凭据直接持有结果，不访问网络
    /// - 进行中：附加到已有任务
    /// - 否则：创建新任务并在后台执行
    ///
    /// 回调在登记时绑定到任务，由任务结束时触发，
    /// 丢弃凭据不会取消任务，也不会丢失 on_load / on_error 通知
    pub fn begin(&self, location: &str, options: &PreloadOptions, hooks: PreloadHooks) -> PreloadTicket {
        if self.is_disposed() {
            return PreloadTicket::ready(location, Err(LoadError::Disposed), &hooks);
        }

        let mut in_flight = lock(&self.shared.in_flight);

        // 驱动任务先写入已加载索引再移出进行中索引，所以在锁内检查
        if let Some(resource) = self.shared.loaded.get(location) {
            drop(in_flight);
            debug!("资源已加载，直接复用: {}", location);
            return PreloadTicket::ready(location, Ok(resource), &hooks);
        }

        if let Some(task) = in_flight.get(location) {
            debug!("附加到进行中的任务: {}", location);
            lock(&task.listeners).push(hooks);
            return PreloadTicket::pending(location, task.result.clone());
        }

        let progress: ProgressFn = match hooks.on_progress.clone() {
            Some(callback) => {
                let target = location.to_string();
                Arc::new(move |percent| callback(&target, percent))
            }
            None => Arc::new(|_| {}),
        };

        let (tx, rx) = watch::channel(None);
        let listeners: Listeners = Arc::new(Mutex::new(vec![hooks]));
        in_flight.insert(
            location.to_string(),
            InFlightTask {
                options: options.clone(),
                state: TaskState::Queued,
                attempt: 0,
                result: rx.clone(),
                listeners: Arc::clone(&listeners),
            },
        );
        drop(in_flight);

        lock(&self.shared.failures).remove(location);

        debug!(
            "创建加载任务: {} (优先级: {:?}, 策略: {:?})",
            location, options.priority, options.strategy
        );

        let this = self.clone();
        tokio::spawn(this.drive(location.to_string(), options.clone(), tx, listeners, progress));

        PreloadTicket::pending(location, rx)
    }

    /// 请求单个地址并等待结果
    pub async fn request(&self, location: &str, options: &PreloadOptions, hooks: PreloadHooks) -> LoadOutcome {
        self.begin(location, options, hooks).wait().await
    }

    /// 批量请求
    ///
    /// - high：保持输入顺序，每个窗口 3 个
    /// - low：倒序处理，每个窗口 1 个
    /// - auto：保持输入顺序，每个窗口 1 个
    ///
    /// 窗口严格顺序执行（上一个窗口全部到达终止状态后才开始下一个），
    /// 窗口内的任务互相竞争，没有顺序保证
    pub async fn request_many<S: AsRef<str>>(
        &self,
        locations: &[S],
        options: &PreloadOptions,
        hooks: PreloadHooks,
    ) -> Vec<(String, LoadOutcome)> {
        if locations.is_empty() {
            return Vec::new();
        }

        let mut ordered: Vec<&str> = locations.iter().map(AsRef::as_ref).collect();
        if options.priority == PreloadPriority::Low {
            ordered.reverse();
        }
        let window = options.priority.window_size();

        info!(
            "开始批量预加载，共 {} 个地址 (优先级: {:?}, 窗口: {})",
            ordered.len(),
            options.priority,
            window
        );

        let mut results = Vec::with_capacity(ordered.len());
        for chunk in ordered.chunks(window) {
            let tickets: Vec<PreloadTicket> = chunk
                .iter()
                .map(|location| self.begin(location, options, hooks.clone()))
                .collect();

            for ticket in tickets {
                let location = ticket.location().to_string();
                results.push((location, ticket.wait().await));
            }
        }

        info!(
            "批量预加载完成，成功: {}, 失败: {}",
            results.iter().filter(|(_, r)| r.is_ok()).count(),
            results.iter().filter(|(_, r)| r.is_err()).count()
        );

        results
    }

    /// 关键资源：先同步创建/替换提前获取提示，再以 high 优先级正常加载
    ///
    /// 提示本身不保证资源被保留，也不会通知调用方，所以仍需走正常加载路径
    pub async fn request_critical<S: AsRef<str>>(
        &self,
        locations: &[S],
        hooks: PreloadHooks,
    ) -> Vec<(String, LoadOutcome)> {
        if !self.is_disposed() {
            let mut hints = lock(&self.shared.hints);
            for location in locations {
                let location = location.as_ref();
                hints.remove(location);
                hints.insert(location.to_string(), EarlyFetchHint::new(location));
            }
        }

        let options = self.default_options().with_priority(PreloadPriority::High);
        self.request_many(locations, &options, hooks).await
    }

    /// 注册懒加载元素，未提供提取器时读取元素的 data_src
    pub fn observe(&self, element: ObservedElement, extractor: Option<LocationExtractor>) {
        if self.is_disposed() {
            return;
        }
        debug!("观察元素: {}", element.id);
        lock(&self.shared.observer).observe(element, extractor.unwrap_or_else(data_src_extractor));
    }

    pub fn unobserve(&self, id: &str) -> bool {
        lock(&self.shared.observer).unobserve(id)
    }

    /// 元素布局变化
    pub fn update_element_bounds(&self, id: &str, bounds: Rect) -> bool {
        lock(&self.shared.observer).update_bounds(id, bounds)
    }

    /// 视口变化：对首次相交的元素发起 lazy 请求，并注销这些元素
    pub fn update_viewport(&self, viewport: Rect, hooks: PreloadHooks) -> Vec<PreloadTicket> {
        let options = self.lazy_options();
        self.take_viewport_hits(viewport)
            .iter()
            .map(|location| self.begin(location, &options, hooks.clone()))
            .collect()
    }

    /// 注销首次相交的元素，返回其中尚未加载的地址
    pub fn take_viewport_hits(&self, viewport: Rect) -> Vec<String> {
        let hits = lock(&self.shared.observer).take_intersecting(viewport);

        hits.into_iter()
            .filter_map(|(element, location)| {
                let Some(location) = location else {
                    debug!("元素 {} 没有可加载的地址", element.id);
                    return None;
                };
                (!self.is_preloaded(&location)).then_some(location)
            })
            .collect()
    }

    /// 视口触发请求使用的选项
    pub fn lazy_options(&self) -> PreloadOptions {
        self.default_options().with_strategy(PreloadStrategy::Lazy)
    }

    pub fn is_preloaded(&self, location: &str) -> bool {
        self.shared.loaded.contains_key(location)
    }

    pub fn is_loading(&self, location: &str) -> bool {
        lock(&self.shared.in_flight).contains_key(location)
    }

    pub fn status(&self, location: &str) -> ResourceStatus {
        if self.is_preloaded(location) {
            ResourceStatus::Loaded
        } else if self.is_loading(location) {
            ResourceStatus::Loading
        } else if lock(&self.shared.failures).contains_key(location) {
            ResourceStatus::Failed
        } else {
            ResourceStatus::NotLoaded
        }
    }

    /// 已加载的资源
    pub fn get(&self, location: &str) -> Option<Arc<LoadedResource>> {
        self.shared.loaded.get(location)
    }

    /// 最近一次失败的错误
    pub fn last_error(&self, location: &str) -> Option<LoadError> {
        lock(&self.shared.failures).get(location).cloned()
    }

    pub fn task_info(&self, location: &str) -> Option<TaskInfo> {
        lock(&self.shared.in_flight).get(location).map(|task| TaskInfo {
            location: location.to_string(),
            priority: task.options.priority,
            strategy: task.options.strategy,
            state: task.state,
            attempt: task.attempt,
            max_attempts: task.options.retries.saturating_add(1),
        })
    }

    /// 当前所有提前获取提示（按地址排序）
    pub fn hints(&self) -> Vec<EarlyFetchHint> {
        let mut hints: Vec<EarlyFetchHint> = lock(&self.shared.hints).values().cloned().collect();
        hints.sort_by(|a, b| a.location.cmp(&b.location));
        hints
    }

    /// 所有提示合并成的 `Link` 头，无提示时返回 None
    pub fn link_header(&self) -> Option<String> {
        let hints = self.hints();
        if hints.is_empty() {
            return None;
        }
        Some(
            hints
                .iter()
                .map(EarlyFetchHint::to_link_value)
                .collect::<Vec<_>>()
                .join(", "),
        )
    }

    /// 清除指定地址的已加载资源、提示和失败记录
    pub fn clear_preloaded<S: AsRef<str>>(&self, locations: &[S]) {
        let mut hints = lock(&self.shared.hints);
        let mut failures = lock(&self.shared.failures);
        for location in locations {
            let location = location.as_ref();
            self.shared.loaded.invalidate(location);
            hints.remove(location);
            failures.remove(location);
        }
        debug!("已清除 {} 个地址的预加载数据", locations.len());
    }

    pub fn clear_location(&self, location: &str) {
        self.clear_preloaded(&[location]);
    }

    /// 清除全部已加载资源、提示和失败记录
    pub fn clear_all(&self) {
        let keys: Vec<Arc<String>> = self.shared.loaded.iter().map(|(key, _)| key).collect();
        for key in &keys {
            self.shared.loaded.invalidate(key.as_str());
        }
        lock(&self.shared.hints).clear();
        lock(&self.shared.failures).clear();
        info!("已清除全部预加载数据 ({} 个资源)", keys.len());
    }

    pub fn memory_snapshot(&self) -> MemorySnapshot {
        let mut loaded_locations = Vec::new();
        let mut total_bytes = 0;
        for (key, resource) in self.shared.loaded.iter() {
            loaded_locations.push((*key).clone());
            total_bytes += resource.data.len();
        }
        loaded_locations.sort();

        MemorySnapshot {
            loaded_count: loaded_locations.len(),
            loading_count: lock(&self.shared.in_flight).len(),
            hint_count: lock(&self.shared.hints).len(),
            failed_count: lock(&self.shared.failures).len(),
            total_bytes,
            loaded_locations,
        }
    }

    /// 释放协调器：清空所有索引并断开视口观察
    ///
    /// 之后的请求立即以 `LoadError::Disposed` 失败；
    /// 已在进行中的任务仍会通知各自的等待者，但结果不再写入索引
    pub fn dispose(&self) {
        self.shared.disposed.store(true, Ordering::SeqCst);
        lock(&self.shared.observer).disconnect();
        lock(&self.shared.in_flight).clear();
        self.clear_all();
        info!("预加载协调器已释放");
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// 第 attempt 次失败后的退避时间：2^attempt × 基数
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.shared
            .backoff_base
            .saturating_mul(1u32 << attempt.min(16))
    }

    fn set_task_state(&self, location: &str, state: TaskState, attempt: u32) {
        if let Some(task) = lock(&self.shared.in_flight).get_mut(location) {
            task.state = state;
            task.attempt = attempt;
        }
    }

    /// 任务驱动：重试循环
    async fn drive(
        self,
        location: String,
        options: PreloadOptions,
        tx: watch::Sender<Option<LoadOutcome>>,
        listeners: Listeners,
        progress: ProgressFn,
    ) {
        let started = Instant::now();
        let max_attempts = options.retries.saturating_add(1);
        let mut attempt = 0u32;

        let outcome = loop {
            self.set_task_state(&location, TaskState::Loading, attempt);
            debug!("开始加载: {} (尝试 {}/{})", location, attempt + 1, max_attempts);

            match self.load_once(&location, options.timeout, progress.clone()).await {
                Ok(fetched) => {
                    break Ok(Arc::new(LoadedResource::new(
                        location.clone(),
                        fetched,
                        started.elapsed(),
                    )));
                }
                Err(err) if attempt < options.retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        "加载失败 (尝试 {}/{}): {} - 错误: {}，{:?} 后重试",
                        attempt + 1,
                        max_attempts,
                        location,
                        err,
                        delay
                    );
                    self.set_task_state(&location, TaskState::Backoff, attempt);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        "加载失败，已尝试 {} 次: {} - 错误: {}",
                        attempt + 1,
                        location,
                        err
                    );
                    break Err(LoadError::RetryExhausted {
                        attempts: attempt + 1,
                        last: Box::new(err),
                    });
                }
            }
        };

        self.finish(&location, &tx, &listeners, outcome);
    }

    /// 写入索引、移出进行中索引、通知所有登记的回调，最后唤醒等待者
    fn finish(
        &self,
        location: &str,
        tx: &watch::Sender<Option<LoadOutcome>>,
        listeners: &Listeners,
        outcome: LoadOutcome,
    ) {
        if !self.is_disposed() {
            match &outcome {
                Ok(resource) => {
                    info!(
                        "资源加载成功: {} ({} 字节, 耗时 {:?})",
                        location,
                        resource.data.len(),
                        resource.load_duration
                    );
                    self.shared
                        .loaded
                        .insert(location.to_string(), Arc::clone(resource));
                }
                Err(err) => {
                    lock(&self.shared.failures).insert(location.to_string(), err.clone());
                }
            }
        }

        lock(&self.shared.in_flight).remove(location);

        // 移出进行中索引后不会再有新的登记
        let listeners = std::mem::take(&mut *lock(listeners));
        for hooks in &listeners {
            notify(hooks, location, &outcome);
        }

        tx.send_replace(Some(outcome));
    }

    /// 执行一次加载（带超时控制）
    async fn load_once(
        &self,
        location: &str,
        timeout: Duration,
        progress: ProgressFn,
    ) -> Result<FetchedResource, LoadError> {
        let fetcher = Arc::clone(&self.shared.fetcher);
        let target = location.to_string();
        let attempt_started = Instant::now();
        let mut handle = tokio::spawn(async move { fetcher.fetch(&target, progress).await });

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(result)) => result.map_err(LoadError::from),
            Ok(Err(join_error)) => Err(LoadError::Failure(FetchError::from(join_error))),
            Err(_) => {
                // 超时不中断底层获取
                self.repair_on_late_success(location.to_string(), handle, attempt_started);
                Err(LoadError::Timeout(timeout))
            }
        }
    }

    /// 超时的获取若之后成功，静默写入已加载索引（不触发任何回调）
    fn repair_on_late_success(
        &self,
        location: String,
        handle: JoinHandle<Result<FetchedResource, FetchError>>,
        attempt_started: Instant,
    ) {
        let this = self.clone();
        tokio::spawn(async move {
            let Ok(Ok(fetched)) = handle.await else {
                return;
            };
            if this.is_disposed() || this.is_preloaded(&location) {
                return;
            }

            debug!("超时后的迟到结果已写入缓存: {}", location);
            let resource = LoadedResource::new(location.clone(), fetched, attempt_started.elapsed());
            this.shared.loaded.insert(location.clone(), Arc::new(resource));
            lock(&this.shared.failures).remove(&location);
        });
    }
}

enum TicketState {
    Ready(LoadOutcome),
    Pending(watch::Receiver<Option<LoadOutcome>>),
}

/// 请求凭据
///
/// 只用于等待结果；回调由协调器触发，与凭据是否被等待无关
pub struct PreloadTicket {
    location: String,
    state: TicketState,
}

impl PreloadTicket {
    /// 立即完成的请求，当场通知回调
    fn ready(location: &str, outcome: LoadOutcome, hooks: &PreloadHooks) -> Self {
        notify(hooks, location, &outcome);
        Self {
            location: location.to_string(),
            state: TicketState::Ready(outcome),
        }
    }

    fn pending(location: &str, rx: watch::Receiver<Option<LoadOutcome>>) -> Self {
        Self {
            location: location.to_string(),
            state: TicketState::Pending(rx),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// 结果是否已经可用
    pub fn is_ready(&self) -> bool {
        match &self.state {
            TicketState::Ready(_) => true,
            TicketState::Pending(rx) => rx.borrow().is_some(),
        }
    }

    /// 等待终止结果
    pub async fn wait(self) -> LoadOutcome {
        match self.state {
            TicketState::Ready(outcome) => outcome,
            TicketState::Pending(mut rx) => {
                let received = rx
                    .wait_for(Option::is_some)
                    .await
                    .map(|value| (*value).clone());
                match received {
                    Ok(Some(outcome)) => outcome,
                    _ => Err(LoadError::Failure(FetchError::Aborted(
                        "任务在产生结果前结束".to_string(),
                    ))),
                }
            }
        }
    }
}

impl std::fmt::Debug for PreloadTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadTicket")
            .field("location", &self.location)
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// 固定延迟后成功的获取器
    struct CountingFetcher {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl ResourceFetcher for CountingFetcher {
        async fn fetch(&self, _location: &str, progress: ProgressFn) -> Result<FetchedResource, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            progress(100);
            Ok(FetchedResource::from_bytes(vec![1, 2, 3], None))
        }
    }

    fn coordinator(delay: Duration) -> (PreloadCoordinator, Arc<CountingFetcher>) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            delay,
        });
        let coordinator = PreloadCoordinator::new(fetcher.clone(), &EngineConfig::default());
        (coordinator, fetcher)
    }

    #[tokio::test(start_paused = true)]
    async fn test_loaded_resource_is_served_without_fetch() {
        let (coordinator, fetcher) = coordinator(Duration::from_millis(10));
        let options = PreloadOptions::default();

        coordinator.request("https://x/a.jpg", &options, PreloadHooks::default()).await.unwrap();
        let ticket = coordinator.begin("https://x/a.jpg", &options, PreloadHooks::default());
        assert!(ticket.is_ready());
        ticket.wait().await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_info_while_loading() {
        let (coordinator, _fetcher) = coordinator(Duration::from_secs(1));
        let options = PreloadOptions::default().with_priority(PreloadPriority::High);

        let ticket = coordinator.begin("https://x/a.jpg", &options, PreloadHooks::default());
        let info = coordinator.task_info("https://x/a.jpg").unwrap();
        assert_eq!(info.priority, PreloadPriority::High);
        assert_eq!(info.max_attempts, 3);
        assert_eq!(coordinator.status("https://x/a.jpg"), ResourceStatus::Loading);

        ticket.wait().await.unwrap();
        assert!(coordinator.task_info("https://x/a.jpg").is_none());
        assert_eq!(coordinator.status("https://x/a.jpg"), ResourceStatus::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hooks_fire_once_per_request() {
        let (coordinator, _fetcher) = coordinator(Duration::from_millis(10));
        let loads = Arc::new(AtomicUsize::new(0));
        let progress = Arc::new(AtomicUsize::new(0));

        let hooks = {
            let loads = loads.clone();
            let progress = progress.clone();
            PreloadHooks::new()
                .on_load(move |_| {
                    loads.fetch_add(1, Ordering::SeqCst);
                })
                .on_progress(move |_, _| {
                    progress.fetch_add(1, Ordering::SeqCst);
                })
        };

        let first = coordinator.begin("https://x/a.jpg", &PreloadOptions::default(), hooks.clone());
        let second = coordinator.begin("https://x/a.jpg", &PreloadOptions::default(), hooks);
        first.wait().await.unwrap();
        second.wait().await.unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 2);
        // 进度只由任务的创建者接收
        assert_eq!(progress.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_request_notifies_immediately() {
        let (coordinator, _fetcher) = coordinator(Duration::from_millis(10));
        let options = PreloadOptions::default();
        coordinator.request("https://x/a.jpg", &options, PreloadHooks::default()).await.unwrap();

        let loads = Arc::new(AtomicUsize::new(0));
        let hooks = {
            let loads = loads.clone();
            PreloadHooks::new().on_load(move |_| {
                loads.fetch_add(1, Ordering::SeqCst);
            })
        };
        drop(coordinator.begin("https://x/a.jpg", &options, hooks));

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_delay_doubles() {
        let (coordinator, _fetcher) = coordinator(Duration::ZERO);
        assert_eq!(coordinator.backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(coordinator.backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(coordinator.backoff_delay(2), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_critical_request_replaces_hint() {
        let (coordinator, _fetcher) = coordinator(Duration::from_millis(10));
        let locations = ["https://x/hero.jpg"];

        coordinator.request_critical(&locations, PreloadHooks::default()).await;
        let first = coordinator.hints();
        coordinator.request_critical(&locations, PreloadHooks::default()).await;
        let second = coordinator.hints();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert!(coordinator
            .link_header()
            .unwrap()
            .starts_with("<https://x/hero.jpg>; rel=preload"));

        coordinator.clear_preloaded(&locations);
        assert!(coordinator.hints().is_empty());
        assert!(coordinator.link_header().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_clears_and_rejects() {
        let (coordinator, _fetcher) = coordinator(Duration::from_millis(10));
        coordinator
            .request("https://x/a.jpg", &PreloadOptions::default(), PreloadHooks::default())
            .await
            .unwrap();
        coordinator.observe(
            ObservedElement::new("el", Rect::new(0.0, 0.0, 10.0, 10.0)).with_data_src("https://x/b.jpg"),
            None,
        );

        coordinator.dispose();

        assert!(!coordinator.is_preloaded("https://x/a.jpg"));
        assert!(coordinator
            .update_viewport(Rect::new(0.0, 0.0, 100.0, 100.0), PreloadHooks::default())
            .is_empty());
        let result = coordinator
            .request("https://x/c.jpg", &PreloadOptions::default(), PreloadHooks::default())
            .await;
        assert_eq!(result.unwrap_err(), LoadError::Disposed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_snapshot() {
        let (coordinator, _fetcher) = coordinator(Duration::from_millis(10));
        let options = PreloadOptions::default();
        coordinator.request("https://x/a.jpg", &options, PreloadHooks::default()).await.unwrap();
        coordinator.request("https://x/b.jpg", &options, PreloadHooks::default()).await.unwrap();

        let snapshot = coordinator.memory_snapshot();
        assert_eq!(snapshot.loaded_count, 2);
        assert_eq!(snapshot.total_bytes, 6);
        assert_eq!(snapshot.loaded_locations, vec!["https://x/a.jpg", "https://x/b.jpg"]);

        coordinator.clear_location("https://x/a.jpg");
        assert_eq!(coordinator.memory_snapshot().loaded_locations, vec!["https://x/b.jpg"]);

        coordinator.clear_all();
        assert_eq!(coordinator.memory_snapshot().loaded_count, 0);
    }
}
