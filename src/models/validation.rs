// 描述符验证 - 资源来源的信任检查
//
// 只有来自受信任域名、且扩展名在允许列表内的资源才会出现在目录查询结果中。
// 内容寻址存储使用不透明的哈希路径，因此对其豁免扩展名检查。

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

use super::descriptor::MediaDescriptor;

/// 受信任的资源域名（包含其子域名）
pub const TRUSTED_DOMAINS: &[&str] = &[
    "blob.vercel-storage.com",
    "images.unsplash.com",
    "cdn.shopify.com",
    "res.cloudinary.com",
    "images.pexels.com",
];

/// 内容寻址存储服务的域名
pub const CONTENT_HASH_STORAGE_HOST: &str = "blob.vercel-storage.com";

/// 允许的文件扩展名（图片、视频、文档、音频）
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "avif", "svg", "ico",
    "mp4", "webm", "mov", "ogv",
    "pdf", "doc", "docx",
    "mp3", "wav", "ogg", "m4a", "aac", "flac",
];

/// 验证错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("Untrusted domain: {0}")]
    UntrustedDomain(String),

    #[error("Unsupported file extension: {0}")]
    UnsupportedExtension(String),
}

/// 验证器trait
pub trait Validator {
    type Error;

    fn validate(&self) -> Result<(), Self::Error>;
}

/// 判断 host 是否等于 domain 或为其子域名
pub fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// 判断 host 是否属于内容寻址存储服务
pub fn is_content_hash_host(host: &str) -> bool {
    host_matches(host, CONTENT_HASH_STORAGE_HOST)
}

/// 资源来源验证工具
pub struct DescriptorValidator;

impl DescriptorValidator {
    /// 验证资源地址
    ///
    /// # 规则
    /// 1. 必须是合法的绝对 URL
    /// 2. host 必须等于或属于某个受信任域名
    /// 3. 内容寻址存储豁免扩展名检查，其余路径必须以允许的扩展名结尾
    pub fn validate_src(src: &str) -> Result<(), ValidationError> {
        let url = Url::parse(src).map_err(|_| ValidationError::InvalidUrl(src.to_string()))?;

        let host = url
            .host_str()
            .ok_or_else(|| ValidationError::MissingHost(src.to_string()))?;

        if !TRUSTED_DOMAINS.iter().any(|domain| host_matches(host, domain)) {
            return Err(ValidationError::UntrustedDomain(host.to_string()));
        }

        if is_content_hash_host(host) {
            return Ok(());
        }

        if !Self::has_allowed_extension(url.path()) {
            return Err(ValidationError::UnsupportedExtension(url.path().to_string()));
        }

        Ok(())
    }

    /// 验证描述符
    pub fn validate(descriptor: &MediaDescriptor) -> Result<(), ValidationError> {
        Self::validate_src(&descriptor.src)
    }

    /// 验证描述符，仅返回是否通过
    pub fn is_valid(descriptor: &MediaDescriptor) -> bool {
        Self::validate(descriptor).is_ok()
    }

    /// 检查路径是否以允许的扩展名结尾（大小写不敏感）
    pub fn has_allowed_extension(path: &str) -> bool {
        static EXTENSION_REGEX: OnceLock<Regex> = OnceLock::new();

        let regex = EXTENSION_REGEX.get_or_init(|| {
            let pattern = format!(r"(?i)\.({})$", ALLOWED_EXTENSIONS.join("|"));
            Regex::new(&pattern).expect("扩展名正则表达式编译失败")
        });

        regex.is_match(path)
    }
}

impl Validator for MediaDescriptor {
    type Error = ValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        DescriptorValidator::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::descriptor::MediaCategory;

    fn image(src: &str) -> MediaDescriptor {
        MediaDescriptor::new("test", MediaCategory::Image, src)
    }

    #[test]
    fn test_trusted_domain_with_extension() {
        assert!(DescriptorValidator::is_valid(&image("https://images.unsplash.com/photo-1.jpg")));
        assert!(DescriptorValidator::is_valid(&image("https://cdn.shopify.com/s/files/shirt.WEBP")));
    }

    #[test]
    fn test_subdomain_of_trusted_domain() {
        let descriptor = image("https://eu.res.cloudinary.com/demo/sample.png");
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_untrusted_domain() {
        let result = DescriptorValidator::validate(&image("https://evil.example.com/cat.jpg"));
        assert_eq!(
            result,
            Err(ValidationError::UntrustedDomain("evil.example.com".to_string()))
        );
    }

    #[test]
    fn test_suffix_lookalike_is_not_subdomain() {
        let result = DescriptorValidator::validate(&image("https://evilimages.unsplash.com.attacker.io/a.jpg"));
        assert!(matches!(result, Err(ValidationError::UntrustedDomain(_))));

        assert!(!host_matches("notcdn.shopify.com.evil", "cdn.shopify.com"));
        assert!(!host_matches("xcdn.shopify.com", "cdn.shopify.com"));
    }

    #[test]
    fn test_content_hash_storage_skips_extension_check() {
        let descriptor = image("https://abc123.public.blob.vercel-storage.com/hero-Xy7Qp2");
        assert!(DescriptorValidator::is_valid(&descriptor));
    }

    #[test]
    fn test_disallowed_extension() {
        let result = DescriptorValidator::validate(&image("https://images.unsplash.com/payload.exe"));
        assert!(matches!(result, Err(ValidationError::UnsupportedExtension(_))));

        let no_extension = DescriptorValidator::validate(&image("https://images.unsplash.com/photo"));
        assert!(no_extension.is_err());
    }

    #[test]
    fn test_extension_ignores_query_string() {
        assert!(DescriptorValidator::is_valid(&image("https://images.unsplash.com/a.jpg?w=300")));
    }

    #[test]
    fn test_unparseable_or_relative_url() {
        assert!(matches!(
            DescriptorValidator::validate_src("not a url"),
            Err(ValidationError::InvalidUrl(_))
        ));
        assert!(DescriptorValidator::validate_src("/images/a.jpg").is_err());
        assert!(DescriptorValidator::validate_src("").is_err());
    }

    #[test]
    fn test_url_without_host() {
        assert!(matches!(
            DescriptorValidator::validate_src("data:image/png;base64,AAAA"),
            Err(ValidationError::MissingHost(_))
        ));
    }
}
