// 预加载模块
//
// 负责：
// - 资源获取（网络接缝）
// - 任务去重、超时与重试
// - 关键资源提示
// - 视口触发的懒加载

pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod hints;
pub mod observer;
pub mod options;

pub use coordinator::{
    LoadOutcome, LoadedResource, MemorySnapshot, PreloadCoordinator, PreloadTicket, ResourceStatus,
    TaskInfo, TaskState,
};
pub use error::{FetchError, LoadError};
pub use fetcher::{FetchedResource, HttpFetcher, ProgressFn, ResourceFetcher};
pub use hints::{EarlyFetchHint, HintDestination};
pub use observer::{data_src_extractor, LocationExtractor, ObservedElement, Rect, ViewportObserver};
pub use options::{PreloadHooks, PreloadOptions, PreloadPriority, PreloadStrategy};
