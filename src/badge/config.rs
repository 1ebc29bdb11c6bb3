//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `BadgeConfig`，保证运行时行为可观测、可测试。
//! 输出尺寸等参数在进程生命周期内固定：服务创建时读取一次配置快照，之后不再变化。
//!
//! ## 实现思路
//!
//! - `Default` 提供与产品一致的默认值（800×800、10MB、PNG/JPEG/WEBP）。
//! - `ResizeQuality` 负责档位字符串解析与反向输出，并映射到具体滤镜。
//! - `validate` 在服务启动前拦截不合法配置。

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::BadgeError;

/// 徽章资源默认路径。
pub const DEFAULT_BADGE_PATH: &str = "assets/saral-badge.png";
/// 下载文件默认建议名称。
pub const DEFAULT_DOWNLOAD_FILE_NAME: &str = "saral-ai-profile.png";
/// 输出正方形默认边长（像素）。
pub const DEFAULT_OUTPUT_SIZE: u32 = 800;
/// 上传文件默认体积上限（字节）。
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// 徽章合成配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeConfig {
    /// 徽章图片路径，启动时加载一次。
    pub badge_path: String,
    /// 输出正方形边长（像素）。
    pub output_size: u32,
    /// 上传文件允许的最大体积（字节），严格大于即拒绝。
    pub max_file_size: u64,
    /// 允许的上传内容类型（按声明的 MIME 判断）。
    pub allowed_types: Vec<String>,
    /// 下载时建议的文件名。
    pub download_file_name: String,
    /// 缩放质量档位。
    pub resize_quality: ResizeQuality,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
}

impl Default for BadgeConfig {
    fn default() -> Self {
        Self {
            badge_path: DEFAULT_BADGE_PATH.to_string(),
            output_size: DEFAULT_OUTPUT_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/webp".to_string(),
            ],
            download_file_name: DEFAULT_DOWNLOAD_FILE_NAME.to_string(),
            resize_quality: ResizeQuality::Balanced,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
        }
    }
}

impl BadgeConfig {
    /// 校验配置是否可用。
    pub fn validate(&self) -> Result<(), BadgeError> {
        if self.output_size == 0 {
            return Err(BadgeError::InvalidConfig("output_size 必须大于 0".to_string()));
        }
        if self.max_file_size == 0 {
            return Err(BadgeError::InvalidConfig("max_file_size 必须大于 0".to_string()));
        }
        if self.allowed_types.iter().all(|t| t.trim().is_empty()) {
            return Err(BadgeError::InvalidConfig("allowed_types 不能为空".to_string()));
        }
        if self.max_decoded_pixels == 0 || self.max_decoded_bytes == 0 {
            return Err(BadgeError::InvalidConfig("解码上限必须大于 0".to_string()));
        }

        let name = self.download_file_name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(BadgeError::InvalidConfig(format!(
                "download_file_name 不合法：{:?}",
                self.download_file_name
            )));
        }

        Ok(())
    }

    /// 判断声明的内容类型是否在允许列表中。
    ///
    /// 兼容 `image/png; charset=...` 这类带参数写法，大小写不敏感。
    pub fn is_allowed_type(&self, content_type: &str) -> bool {
        let base = normalize_content_type(content_type);
        if base.is_empty() {
            return false;
        }
        self.allowed_types
            .iter()
            .any(|allowed| normalize_content_type(allowed) == base)
    }
}

/// 去掉 MIME 参数并统一为小写。
pub(crate) fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .map(|base| base.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

/// 缩放质量档位。
///
/// - `Quality`：尽量保真
/// - `Balanced`：质量与性能平衡
/// - `Speed`：优先处理速度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeQuality {
    Quality,
    Balanced,
    Speed,
}

impl ResizeQuality {
    /// 从外部字符串解析档位。
    pub fn from_str(profile: &str) -> Result<Self, BadgeError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(BadgeError::InvalidConfig(format!(
                "未知缩放档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }

    /// `image` 回退路径使用的滤镜。
    pub(crate) fn image_filter(self) -> FilterType {
        match self {
            Self::Quality => FilterType::CatmullRom,
            Self::Balanced => FilterType::Triangle,
            Self::Speed => FilterType::Nearest,
        }
    }

    /// `fast_image_resize` 主路径使用的滤镜。
    pub(crate) fn fast_filter(self) -> fast_image_resize::FilterType {
        match self.image_filter() {
            FilterType::Nearest => fast_image_resize::FilterType::Box,
            FilterType::Triangle => fast_image_resize::FilterType::Bilinear,
            FilterType::CatmullRom => fast_image_resize::FilterType::CatmullRom,
            FilterType::Gaussian => fast_image_resize::FilterType::Mitchell,
            FilterType::Lanczos3 => fast_image_resize::FilterType::Lanczos3,
        }
    }
}
