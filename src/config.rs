// 引擎配置 - 预加载默认参数与统计周期
//
// 配置存储在 engine_config.json 中：
// - 文件不存在时使用默认配置并写入文件
// - 文件损坏时备份旧文件并使用默认配置
//
// 受信任域名和扩展名列表是编译期常量，不在此配置

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

/// 预加载默认参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreloadDefaults {
    /// 单次加载超时（毫秒）
    pub timeout_ms: u64,
    /// 额外重试次数
    pub retries: u32,
}

impl Default for PreloadDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retries: 2,
        }
    }
}

/// 视口观察参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObserverSettings {
    /// 视口外扩的提前加载距离（像素）
    pub root_margin_px: f64,
    /// 触发加载的可见比例
    pub threshold: f64,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            root_margin_px: 50.0,
            threshold: 0.1,
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub preload: PreloadDefaults,

    /// 重试退避基数（毫秒），第 n 次重试前等待 2^n × 基数
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default)]
    pub observer: ObserverSettings,

    /// 性能快照刷新周期（秒）
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_stats_interval_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            preload: PreloadDefaults::default(),
            backoff_base_ms: default_backoff_base_ms(),
            observer: ObserverSettings::default(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl EngineConfig {
    /// 默认配置文件路径
    pub const DEFAULT_CONFIG_PATH: &'static str = "engine_config.json";

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs.max(1))
    }

    /// 从配置文件加载配置
    ///
    /// # 行为
    /// - 如果配置文件不存在，使用默认配置并创建文件
    /// - 如果配置文件损坏，使用默认配置并备份旧文件
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_PATH));

        if !config_path.exists() {
            tracing::info!("配置文件不存在，使用默认配置: {:?}", config_path);
            let config = Self::default();
            config.save(&config_path).await?;
            return Ok(config);
        }

        let content = match fs::read_to_string(&config_path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("读取配置文件失败，使用默认配置: {}", e);
                return Ok(Self::default());
            }
        };

        match serde_json::from_str::<EngineConfig>(&content) {
            Ok(config) => {
                tracing::info!("成功加载引擎配置: {:?}", config_path);
                Ok(config)
            }
            Err(e) => {
                tracing::warn!("配置文件损坏，使用默认配置: {}", e);
                backup_corrupted(&config_path).await?;
                let config = Self::default();
                config.save(&config_path).await?;
                Ok(config)
            }
        }
    }

    /// 保存配置到文件
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        fs::write(path, json).await?;
        tracing::debug!("已保存引擎配置: {:?}", path);
        Ok(())
    }
}

/// 备份损坏的文件为 `<name>.corrupted`
pub(crate) async fn backup_corrupted(path: &Path) -> Result<(), std::io::Error> {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".corrupted");
    fs::rename(path, &backup).await?;
    tracing::warn!("已备份损坏文件: {:?}", backup);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.preload.timeout_ms, 10_000);
        assert_eq!(config.preload.retries, 2);
        assert_eq!(config.backoff_base(), Duration::from_secs(1));
        assert_eq!(config.observer.root_margin_px, 50.0);
        assert_eq!(config.observer.threshold, 0.1);
    }

    #[tokio::test]
    async fn test_load_missing_file_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/engine_config.json");

        let config = EngineConfig::load(Some(path.clone())).await.unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_load_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine_config.json");
        fs::write(&path, r#"{ "preload": { "timeout_ms": 5000, "retries": 0 } }"#)
            .await
            .unwrap();

        let config = EngineConfig::load(Some(path)).await.unwrap();
        assert_eq!(config.preload.timeout_ms, 5000);
        assert_eq!(config.preload.retries, 0);
        assert_eq!(config.backoff_base_ms, 1000);
        assert_eq!(config.stats_interval_secs, 30);
    }

    #[tokio::test]
    async fn test_load_corrupted_file_backs_up() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine_config.json");
        fs::write(&path, "{ not json").await.unwrap();

        let config = EngineConfig::load(Some(path.clone())).await.unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(temp_dir.path().join("engine_config.json.corrupted").exists());
        assert!(path.exists());
    }
}
