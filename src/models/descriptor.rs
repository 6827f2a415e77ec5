// 媒体描述符 - 目录中单个媒体资源的元数据
//
// 描述符只描述资源的身份、位置和元数据，不持有资源内容本身

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 媒体类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Video,
    Document,
    Audio,
}

impl MediaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCategory::Image => "image",
            MediaCategory::Video => "video",
            MediaCategory::Document => "document",
            MediaCategory::Audio => "audio",
        }
    }
}

impl std::fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaCategory::Image),
            "video" => Ok(MediaCategory::Video),
            "document" => Ok(MediaCategory::Document),
            "audio" => Ok(MediaCategory::Audio),
            _ => Err(format!("Invalid media category: {}", s)),
        }
    }
}

/// 描述符优先级
///
/// `High` 的图片属于关键资源，会在页面构建时提前加载
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaPriority {
    High,
    #[default]
    Medium,
    Low,
}

/// 资源的原始尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// 媒体描述符（目录条目）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// 稳定标识
    pub id: String,
    /// 显示名称
    pub name: String,
    pub category: MediaCategory,
    /// 规范资源地址（未经任何优化变换）
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub priority: MediaPriority,
    /// 软删除标记，false 时对所有目录查询不可见
    #[serde(default = "default_active")]
    pub active: bool,
    pub last_modified: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl MediaDescriptor {
    /// 创建新的描述符（自动生成 ID）
    pub fn new(name: impl Into<String>, category: MediaCategory, src: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            category,
            src: src.into(),
            alt: None,
            dimensions: None,
            priority: MediaPriority::default(),
            active: true,
            last_modified: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = Some(alt.into());
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some(Dimensions::new(width, height));
        self
    }

    pub fn with_priority(mut self, priority: MediaPriority) -> Self {
        self.priority = priority;
        self
    }

    /// 是否为关键图片（高优先级、有效状态的图片）
    pub fn is_critical_image(&self) -> bool {
        self.active && self.category == MediaCategory::Image && self.priority == MediaPriority::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_descriptor_defaults() {
        let descriptor = MediaDescriptor::new("Hero", MediaCategory::Image, "https://images.unsplash.com/hero.jpg");
        assert!(descriptor.active);
        assert_eq!(descriptor.priority, MediaPriority::Medium);
        assert!(uuid::Uuid::parse_str(&descriptor.id).is_ok());
    }

    #[test]
    fn test_descriptor_json_roundtrip_uses_lowercase_enums() {
        let descriptor = MediaDescriptor::new("Promo", MediaCategory::Video, "https://cdn.shopify.com/promo.mp4")
            .with_id("promo")
            .with_priority(MediaPriority::High);

        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("\"category\":\"video\""));
        assert!(json.contains("\"priority\":\"high\""));

        let parsed: MediaDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, descriptor);
    }

    #[test]
    fn test_missing_active_defaults_to_true() {
        let json = r#"{
            "id": "a",
            "name": "A",
            "category": "image",
            "src": "https://images.unsplash.com/a.png",
            "last_modified": "2026-01-27T15:30:00Z"
        }"#;
        let parsed: MediaDescriptor = serde_json::from_str(json).unwrap();
        assert!(parsed.active);
        assert!(parsed.dimensions.is_none());
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("audio".parse::<MediaCategory>(), Ok(MediaCategory::Audio));
        assert!("podcast".parse::<MediaCategory>().is_err());
    }

    #[test]
    fn test_is_critical_image() {
        let hero = MediaDescriptor::new("Hero", MediaCategory::Image, "https://images.unsplash.com/h.jpg")
            .with_priority(MediaPriority::High);
        assert!(hero.is_critical_image());

        let mut inactive = hero.clone();
        inactive.active = false;
        assert!(!inactive.is_critical_image());
    }
}
