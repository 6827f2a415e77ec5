// 资源目录 - 已知媒体描述符的静态注册表
//
// 本模块提供：
// - 按 ID / 类别 / 关键优先级查询（只返回有效状态的条目）
// - 追加、更新、软删除（变更结果必须通过来源验证，否则拒绝且不改变状态）
// - 从 JSON 文件加载目录

use crate::models::{
    DescriptorValidator, MediaCategory, MediaDescriptor, MediaPriority, ValidationError,
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// 目录变更错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("验证失败: {0}")]
    Validation(#[from] ValidationError),

    #[error("描述符不存在: {0}")]
    NotFound(String),

    #[error("描述符已存在: {0}")]
    Duplicate(String),
}

/// 资源目录
///
/// 条目按插入顺序保存，查询结果保持该顺序
#[derive(Debug, Default)]
pub struct AssetCatalog {
    entries: RwLock<Vec<MediaDescriptor>>,
}

impl AssetCatalog {
    /// 用给定条目创建目录
    ///
    /// 静态条目不做验证，无效条目在查询时被过滤
    pub fn new(entries: Vec<MediaDescriptor>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// 店面内置的媒体资源
    pub fn builtin() -> Self {
        let entries = vec![
            MediaDescriptor::new(
                "Storefront hero",
                MediaCategory::Image,
                "https://images.unsplash.com/photo-1441986300917-64674bd600d8.jpg",
            )
            .with_id("hero-storefront")
            .with_alt("Storefront interior")
            .with_dimensions(1920, 1080)
            .with_priority(MediaPriority::High),
            MediaDescriptor::new(
                "Concierge portrait",
                MediaCategory::Image,
                "https://abc123.public.blob.vercel-storage.com/concierge-portrait-Qm7vX2",
            )
            .with_id("concierge-portrait")
            .with_alt("Concierge at the front desk")
            .with_dimensions(1200, 1600)
            .with_priority(MediaPriority::High),
            MediaDescriptor::new(
                "Product grid background",
                MediaCategory::Image,
                "https://cdn.shopify.com/s/files/1/grid-background.webp",
            )
            .with_id("grid-background")
            .with_dimensions(2560, 1440)
            .with_priority(MediaPriority::Low),
            MediaDescriptor::new(
                "Brand film",
                MediaCategory::Video,
                "https://res.cloudinary.com/storefront/video/upload/brand-film.mp4",
            )
            .with_id("brand-film")
            .with_priority(MediaPriority::High),
            MediaDescriptor::new(
                "Shipping policy",
                MediaCategory::Document,
                "https://abc123.public.blob.vercel-storage.com/shipping-policy-8fJ2kL",
            )
            .with_id("shipping-policy"),
            MediaDescriptor::new(
                "Lobby ambience",
                MediaCategory::Audio,
                "https://res.cloudinary.com/storefront/video/upload/lobby-ambience.mp3",
            )
            .with_id("lobby-ambience")
            .with_priority(MediaPriority::Low),
        ];

        Self::new(entries)
    }

    /// 从 JSON 文件加载目录
    ///
    /// # 行为
    /// - 文件不存在：使用内置目录
    /// - 文件损坏：备份为 `*.corrupted` 并使用内置目录
    pub async fn load(path: Option<PathBuf>) -> Result<Self, std::io::Error> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };

        if !path.exists() {
            info!("目录文件不存在，使用内置目录: {:?}", path);
            return Ok(Self::builtin());
        }

        let content = fs::read_to_string(&path).await?;
        match serde_json::from_str::<Vec<MediaDescriptor>>(&content) {
            Ok(entries) => {
                info!("成功加载资源目录: {:?} ({} 条)", path, entries.len());
                Ok(Self::new(entries))
            }
            Err(e) => {
                warn!("目录文件损坏，使用内置目录: {}", e);
                crate::config::backup_corrupted(&path).await?;
                Ok(Self::builtin())
            }
        }
    }

    /// 保存目录到 JSON 文件（包含软删除的条目）
    pub async fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(&self.snapshot())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json).await
    }

    /// 按 ID 查找有效状态的描述符
    pub fn lookup(&self, id: &str) -> Option<MediaDescriptor> {
        self.read()
            .iter()
            .find(|d| d.active && d.id == id)
            .cloned()
    }

    /// 按类别查询（有效状态且通过来源验证）
    pub fn by_category(&self, category: MediaCategory) -> Vec<MediaDescriptor> {
        self.query(|d| d.category == category)
    }

    /// 查询关键图片（高优先级图片，有效状态且通过来源验证）
    pub fn by_critical_priority(&self) -> Vec<MediaDescriptor> {
        self.query(|d| d.is_critical_image())
    }

    /// 列出所有有效状态且通过来源验证的描述符
    pub fn all_active(&self) -> Vec<MediaDescriptor> {
        self.query(|_| true)
    }

    /// 追加描述符
    pub fn add(&self, descriptor: MediaDescriptor) -> Result<(), CatalogError> {
        DescriptorValidator::validate(&descriptor).map_err(|e| {
            warn!("拒绝添加描述符 {}: {}", descriptor.id, e);
            e
        })?;

        let mut entries = self.write();
        if entries.iter().any(|d| d.id == descriptor.id) {
            return Err(CatalogError::Duplicate(descriptor.id));
        }

        debug!("添加描述符: {}", descriptor.id);
        entries.push(descriptor);
        Ok(())
    }

    /// 更新描述符（按 ID 整体替换）
    pub fn update(&self, mut descriptor: MediaDescriptor) -> Result<(), CatalogError> {
        DescriptorValidator::validate(&descriptor).map_err(|e| {
            warn!("拒绝更新描述符 {}: {}", descriptor.id, e);
            e
        })?;

        let mut entries = self.write();
        let slot = entries
            .iter_mut()
            .find(|d| d.id == descriptor.id)
            .ok_or_else(|| CatalogError::NotFound(descriptor.id.clone()))?;

        descriptor.last_modified = Utc::now();
        debug!("更新描述符: {}", descriptor.id);
        *slot = descriptor;
        Ok(())
    }

    /// 软删除描述符（active = false）
    pub fn soft_delete(&self, id: &str) -> Result<(), CatalogError> {
        let mut entries = self.write();
        let slot = entries
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        let mut updated = slot.clone();
        updated.active = false;
        updated.last_modified = Utc::now();
        DescriptorValidator::validate(&updated)?;

        debug!("软删除描述符: {}", id);
        *slot = updated;
        Ok(())
    }

    /// 所有条目的快照（包含无效状态的条目）
    pub fn snapshot(&self) -> Vec<MediaDescriptor> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn query(&self, filter: impl Fn(&MediaDescriptor) -> bool) -> Vec<MediaDescriptor> {
        self.read()
            .iter()
            .filter(|d| d.active && filter(d) && DescriptorValidator::is_valid(d))
            .cloned()
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<MediaDescriptor>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<MediaDescriptor>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
