pub mod catalog;
pub mod optimizer;
pub mod preload;
pub mod variants;

pub use catalog::{AssetCatalog, CatalogError};
pub use optimizer::{
    ImageOptimizer, OptimizeImageOptions, OptimizedImage, OptimizedImageSummary, PerformanceMonitor,
    PerformanceSnapshot, PerformanceTracker,
};
pub use preload::{
    LoadError, LoadedResource, MemorySnapshot, PreloadCoordinator, PreloadHooks, PreloadOptions,
    PreloadPriority, PreloadStrategy, ResourceFetcher, ResourceStatus,
};
pub use variants::{ImageFit, ImageFormat, TransformOptions, UrlOptimizer, VariantSet, FALLBACK_LOCATION};
