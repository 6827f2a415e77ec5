// URL 变体生成器 - 从规范地址派生尺寸/质量/格式变体
//
// 纯函数，无副作用，不访问网络。
// 相同输入总是得到逐字节相同的输出，预加载协调器依赖这一点按地址去重。

use crate::models::validation::is_content_hash_host;
use crate::models::Dimensions;
use serde::{Deserialize, Serialize};
use url::Url;

/// 无法优化时使用的回退地址
pub const FALLBACK_LOCATION: &str = "/placeholder.svg";

/// 表示"尚无图片"的占位符标记
const PLACEHOLDER_TOKENS: &[&str] = &["placeholder-image", "placeholder"];

/// 输出编码格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Webp,
    Avif,
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Webp => "webp",
            ImageFormat::Avif => "avif",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        }
    }
}

/// 缩放适配方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFit {
    Cover,
    Contain,
    Fill,
    Inside,
    Outside,
}

impl ImageFit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFit::Cover => "cover",
            ImageFit::Contain => "contain",
            ImageFit::Fill => "fill",
            ImageFit::Inside => "inside",
            ImageFit::Outside => "outside",
        }
    }
}

/// 变换参数，缺省字段不会出现在输出地址中
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ImageFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<ImageFit>,
}

/// 响应式变体档位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantTier {
    pub name: &'static str,
    /// 宽高上限，None 表示不限制（使用原始尺寸）
    pub max_dimension: Option<u32>,
    pub quality: u8,
}

/// 五个固定档位：thumbnail, small, medium, large, original
pub const VARIANT_TIERS: [VariantTier; 5] = [
    VariantTier { name: "thumbnail", max_dimension: Some(300), quality: 60 },
    VariantTier { name: "small", max_dimension: Some(600), quality: 70 },
    VariantTier { name: "medium", max_dimension: Some(1200), quality: 80 },
    VariantTier { name: "large", max_dimension: Some(1920), quality: 85 },
    VariantTier { name: "original", max_dimension: None, quality: 90 },
];

/// 同一规范地址的五个派生地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSet {
    pub thumbnail: String,
    pub small: String,
    pub medium: String,
    pub large: String,
    pub original: String,
}

impl VariantSet {
    fn uniform(location: &str) -> Self {
        Self {
            thumbnail: location.to_string(),
            small: location.to_string(),
            medium: location.to_string(),
            large: location.to_string(),
            original: location.to_string(),
        }
    }

    /// 按档位顺序迭代 (档位名, 地址)
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("thumbnail", self.thumbnail.as_str()),
            ("small", self.small.as_str()),
            ("medium", self.medium.as_str()),
            ("large", self.large.as_str()),
            ("original", self.original.as_str()),
        ]
        .into_iter()
    }
}

/// URL 优化器
#[derive(Clone, Copy, Debug, Default)]
pub struct UrlOptimizer;

impl UrlOptimizer {
    /// 生成优化后的地址
    ///
    /// # 规则
    /// 1. 空字符串、占位符标记、站内相对路径（非协议相对）返回回退地址
    /// 2. 无法解析为绝对 URL 时返回回退地址
    /// 3. 内容寻址存储的地址追加 `w,h,q,f,fit` 参数以及 `optimize=true&auto=format`
    /// 4. 其他域名原样返回（不假设第三方具备变换能力）
    ///
    /// # 示例
    /// ```
    /// use media_preload_backend::services::variants::{UrlOptimizer, TransformOptions, FALLBACK_LOCATION};
    ///
    /// assert_eq!(UrlOptimizer::optimize("", &TransformOptions::default()), FALLBACK_LOCATION);
    ///
    /// let options = TransformOptions { width: Some(300), ..Default::default() };
    /// let url = UrlOptimizer::optimize("https://a.public.blob.vercel-storage.com/hero-x1", &options);
    /// assert_eq!(url, "https://a.public.blob.vercel-storage.com/hero-x1?w=300&optimize=true&auto=format");
    /// ```
    pub fn optimize(location: &str, options: &TransformOptions) -> String {
        if Self::needs_fallback(location) {
            return FALLBACK_LOCATION.to_string();
        }

        let mut url = match Url::parse(location) {
            Ok(url) => url,
            Err(_) => return FALLBACK_LOCATION.to_string(),
        };

        let transformable = url.host_str().map(is_content_hash_host).unwrap_or(false);
        if !transformable {
            return location.to_string();
        }

        {
            let mut query = url.query_pairs_mut();
            if let Some(width) = options.width {
                query.append_pair("w", &width.to_string());
            }
            if let Some(height) = options.height {
                query.append_pair("h", &height.to_string());
            }
            if let Some(quality) = options.quality {
                query.append_pair("q", &quality.to_string());
            }
            if let Some(format) = options.format {
                query.append_pair("f", format.as_str());
            }
            if let Some(fit) = options.fit {
                query.append_pair("fit", fit.as_str());
            }
            query.append_pair("optimize", "true");
            query.append_pair("auto", "format");
        }

        url.to_string()
    }

    /// 生成五档响应式变体
    ///
    /// - 空地址：五个变体都是回退地址
    /// - 未提供尺寸：五个变体都是原地址
    /// - 否则每档宽高取 `min(档位上限, 原始尺寸)`，质量取档位预设，格式固定为 webp
    pub fn responsive_set(location: &str, dimensions: Option<Dimensions>) -> VariantSet {
        if location.is_empty() {
            return VariantSet::uniform(FALLBACK_LOCATION);
        }

        let Some(dimensions) = dimensions else {
            return VariantSet::uniform(location);
        };

        let [thumbnail, small, medium, large, original] =
            VARIANT_TIERS.map(|tier| Self::optimize(location, &Self::tier_options(&tier, dimensions)));

        VariantSet {
            thumbnail,
            small,
            medium,
            large,
            original,
        }
    }

    /// 生成 `srcset` 字符串（`地址 宽度w`，按宽度升序）
    ///
    /// 地址相同的档位合并为一项，标注其中最大的宽度
    pub fn srcset(variants: &VariantSet, dimensions: Dimensions) -> String {
        let mut entries: Vec<(&str, u32)> = Vec::with_capacity(VARIANT_TIERS.len());

        for ((_, location), tier) in variants.iter().zip(VARIANT_TIERS.iter()) {
            let width = Self::cap(tier.max_dimension, dimensions.width);
            match entries.iter_mut().find(|(seen, _)| *seen == location) {
                Some(entry) => entry.1 = entry.1.max(width),
                None => entries.push((location, width)),
            }
        }

        entries
            .iter()
            .map(|(location, width)| format!("{} {}w", location, width))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn tier_options(tier: &VariantTier, dimensions: Dimensions) -> TransformOptions {
        TransformOptions {
            width: Some(Self::cap(tier.max_dimension, dimensions.width)),
            height: Some(Self::cap(tier.max_dimension, dimensions.height)),
            quality: Some(tier.quality),
            format: Some(ImageFormat::Webp),
            fit: None,
        }
    }

    fn cap(limit: Option<u32>, natural: u32) -> u32 {
        limit.map_or(natural, |limit| limit.min(natural))
    }

    fn needs_fallback(location: &str) -> bool {
        let trimmed = location.trim();
        trimmed.is_empty()
            || PLACEHOLDER_TOKENS.contains(&trimmed)
            || (trimmed.starts_with('/') && !trimmed.starts_with("//"))
    }
}
