// 媒体预加载与优化引擎
//
// 本库提供：
// - 资源目录与来源验证
// - URL 变体生成
// - 预加载协调（去重、重试、优先级窗口、懒加载）
// - 图片优化门面与性能统计
// - HTTP API 路由

pub mod api;
pub mod config;
pub mod models;
pub mod services;

pub use config::EngineConfig;
pub use services::{AssetCatalog, ImageOptimizer, PreloadCoordinator};
