// 资源获取器 - 预加载协调器与网络之间的接缝
//
// 协调器只依赖 ResourceFetcher trait，生产环境使用基于 reqwest 的 HttpFetcher，
// 测试中替换为脚本化的实现。

use async_trait::async_trait;
use reqwest::Client;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::error::FetchError;
use crate::models::Dimensions;

/// 进度回调（百分比 0-100）
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// 一次成功获取的结果
#[derive(Debug, Clone, Default)]
pub struct FetchedResource {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    /// 从文件头探测到的原始尺寸（非图片或无法识别时为 None）
    pub natural_size: Option<Dimensions>,
}

impl FetchedResource {
    /// 由原始字节构建，自动探测尺寸
    pub fn from_bytes(data: Vec<u8>, content_type: Option<String>) -> Self {
        let natural_size = probe_dimensions(&data);
        Self {
            data,
            content_type,
            natural_size,
        }
    }
}

/// 资源获取器
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// 获取一个资源
    ///
    /// 超时由调用方控制，实现不需要自行计时
    async fn fetch(&self, location: &str, progress: ProgressFn) -> Result<FetchedResource, FetchError>;
}

/// 基于 HTTP 的资源获取器
#[derive(Clone)]
pub struct HttpFetcher {
    /// HTTP 客户端（连接池复用）
    client: Client,
}

impl HttpFetcher {
    /// 创建新的 HTTP 获取器
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .pool_max_idle_per_host(10) // 每个主机最多保持 10 个空闲连接
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| FetchError::Network(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self { client })
    }

    /// 使用已有的客户端
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, location: &str, progress: ProgressFn) -> Result<FetchedResource, FetchError> {
        let url = url::Url::parse(location).map_err(|_| FetchError::InvalidUrl(location.to_string()))?;

        let mut response = self.client.get(url).send().await?;

        // 检查 HTTP 状态码
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let total = response.content_length().filter(|len| *len > 0);

        // 分块读取响应体，已知总大小时上报真实字节进度
        let mut data = Vec::with_capacity(total.unwrap_or(0).min(16 * 1024 * 1024) as usize);
        let mut last_percent = 0u8;
        while let Some(chunk) = response.chunk().await? {
            data.extend_from_slice(&chunk);
            if let Some(total) = total {
                let percent = ((data.len() as u64 * 100) / total).min(100) as u8;
                if percent > last_percent {
                    last_percent = percent;
                    progress(percent);
                }
            }
        }

        if last_percent < 100 {
            progress(100);
        }

        debug!("资源获取完成: {} ({} 字节)", location, data.len());
        Ok(FetchedResource::from_bytes(data, content_type))
    }
}

/// 从文件头探测图片尺寸，不做完整解码
pub fn probe_dimensions(data: &[u8]) -> Option<Dimensions> {
    image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
        .map(|(width, height)| Dimensions::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1x1 PNG
    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn test_probe_png_dimensions() {
        assert_eq!(probe_dimensions(PNG_1X1), Some(Dimensions::new(1, 1)));
    }

    #[test]
    fn test_probe_non_image() {
        assert_eq!(probe_dimensions(b"%PDF-1.7 not an image"), None);
        assert_eq!(probe_dimensions(&[]), None);
    }

    #[test]
    fn test_fetched_resource_from_bytes() {
        let resource = FetchedResource::from_bytes(PNG_1X1.to_vec(), Some("image/png".to_string()));
        assert_eq!(resource.natural_size, Some(Dimensions::new(1, 1)));
        assert_eq!(resource.data.len(), PNG_1X1.len());
    }

    #[tokio::test]
    async fn test_http_fetcher_rejects_invalid_url() {
        let fetcher = HttpFetcher::new().unwrap();
        let result = fetcher.fetch("not a url", Arc::new(|_| {})).await;
        assert_eq!(result.unwrap_err(), FetchError::InvalidUrl("not a url".to_string()));
    }

    #[tokio::test]
    #[ignore] // 需要网络连接，默认忽略
    async fn test_fetch_real_image() {
        let fetcher = HttpFetcher::new().unwrap();
        let resource = fetcher
            .fetch("https://httpbin.org/image/png", Arc::new(|_| {}))
            .await
            .unwrap();
        assert!(resource.natural_size.is_some());
    }
}
