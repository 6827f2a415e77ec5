// 提前获取提示 - 关键资源的 `rel=preload` 提示
//
// 每个地址同时最多存在一个提示，服务端以 `Link` 响应头的形式发出

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 提示对应的资源类型（`as` 属性）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HintDestination {
    Image,
    Video,
    Audio,
    Fetch,
}

impl HintDestination {
    /// 根据路径扩展名推断资源类型，无法识别时视为图片
    pub fn from_location(location: &str) -> Self {
        let path = url::Url::parse(location)
            .map(|u| u.path().to_ascii_lowercase())
            .unwrap_or_else(|_| location.to_ascii_lowercase());

        let extension = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        match extension {
            "mp4" | "webm" | "mov" | "ogv" => HintDestination::Video,
            "mp3" | "wav" | "ogg" | "m4a" | "aac" | "flac" => HintDestination::Audio,
            "pdf" | "doc" | "docx" => HintDestination::Fetch,
            _ => HintDestination::Image,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HintDestination::Image => "image",
            HintDestination::Video => "video",
            HintDestination::Audio => "audio",
            HintDestination::Fetch => "fetch",
        }
    }
}

/// 提前获取提示
///
/// `crossorigin=anonymous`：同源请求携带凭据，跨源请求不携带
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EarlyFetchHint {
    pub location: String,
    pub destination: HintDestination,
    pub cross_origin: &'static str,
    pub fetch_priority: &'static str,
    pub created_at: DateTime<Utc>,
}

impl EarlyFetchHint {
    pub fn new(location: impl Into<String>) -> Self {
        let location = location.into();
        Self {
            destination: HintDestination::from_location(&location),
            location,
            cross_origin: "anonymous",
            fetch_priority: "high",
            created_at: Utc::now(),
        }
    }

    /// 渲染为 `Link` 头的单个值
    pub fn to_link_value(&self) -> String {
        format!(
            "<{}>; rel=preload; as={}; crossorigin={}; fetchpriority={}",
            self.location,
            self.destination.as_str(),
            self.cross_origin,
            self.fetch_priority
        )
    }
}
