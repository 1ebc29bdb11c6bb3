//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入”和“流水线中间结果”解耦：
//! - `UploadedFile` 表示宿主交来的一次用户选择（声明类型 + 字节）
//! - `RawImageData` 表示已加载、已校验但未解码的字节
//! - `RasterImage` 表示已完整解码、不可变的 RGBA 位图

use std::sync::Arc;

use bytes::Bytes;
use image::RgbaImage;

/// 用户上传的文件。
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// 原始文件名（仅用于日志与诊断）。
    pub name: String,
    /// 宿主声明的内容类型，例如 `image/png`。
    pub content_type: String,
    /// 文件字节。
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// 文件体积（字节）。
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Bytes,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 已解码的 RGBA 位图。
///
/// 像素缓冲通过 `Arc` 共享，克隆开销极小；构造后不可变。
#[derive(Debug, Clone)]
pub struct RasterImage {
    pixels: Arc<RgbaImage>,
}

impl RasterImage {
    /// 由 RGBA 缓冲构造；宽或高为 0 时返回 `None`。
    pub fn from_rgba(pixels: RgbaImage) -> Option<Self> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return None;
        }
        Some(Self {
            pixels: Arc::new(pixels),
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// 只读像素访问。
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}
