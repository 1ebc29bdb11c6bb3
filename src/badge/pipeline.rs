//! # 解码与编码流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 位图”与“位图 → PNG 字节”的过程集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 猜测格式，仅放行 PNG / JPEG / WEBP
//! 2. 读取 header 尺寸，按像素与内存上限快速拒绝
//! 3. 完整解码，按 EXIF 方向校正后转换为 RGBA8
//! 4. 输出阶段统一编码为 PNG（支持透明通道，相同像素得到相同字节）

use std::io::Cursor;

use bytes::Bytes;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageFormat, ImageReader, RgbaImage};

use super::handler::BadgeHandler;
use super::source::{RasterImage, RawImageData};
use super::{BadgeConfig, BadgeError};

/// 允许解码的图片格式。
const DECODABLE_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

impl BadgeHandler {
    /// 将原始字节解码为不可变的 RGBA 位图。
    pub(crate) fn decode_raster(
        raw: RawImageData,
        config: &BadgeConfig,
    ) -> Result<RasterImage, BadgeError> {
        let format = image::guess_format(&raw.bytes)
            .map_err(|e| BadgeError::Decode(format!("无法识别图片格式：{}", e)))?;

        if !DECODABLE_FORMATS.contains(&format) {
            return Err(BadgeError::Decode(format!("不支持的图片编码：{:?}", format)));
        }

        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;
        Self::validate_decoded_memory_limits(config, header_width, header_height)?;

        let decoded = Self::decode_oriented(&raw.bytes, format)?;

        let (width, height) = decoded.dimensions();
        Self::validate_pixel_limits(config, width, height)?;

        let rgba = decoded.to_rgba8();
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| BadgeError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))?;

        if rgba.as_raw().len() != expected_len {
            return Err(BadgeError::Decode("解码后像素数据长度异常".to_string()));
        }

        let raster = RasterImage::from_rgba(rgba)
            .ok_or_else(|| BadgeError::Decode("图片宽高为 0".to_string()))?;

        log::info!(
            "✅ 图片解码成功 - 来源: {} 格式: {:?} 尺寸: {}x{}",
            raw.source_hint,
            format,
            width,
            height
        );

        Ok(raster)
    }

    /// 完整解码，并按 EXIF 方向标记旋转 / 翻转到显示方向。
    fn decode_oriented(bytes: &[u8], format: ImageFormat) -> Result<DynamicImage, BadgeError> {
        let mut decoder = ImageReader::with_format(Cursor::new(bytes), format)
            .into_decoder()
            .map_err(|e| BadgeError::Decode(format!("图片解码失败：{}", e)))?;

        let orientation = decoder.orientation().unwrap_or_else(|e| {
            log::warn!("⚠️ 读取 EXIF 方向失败，按原始方向处理：{}", e);
            Orientation::NoTransforms
        });

        let mut decoded = DynamicImage::from_decoder(decoder)
            .map_err(|e| BadgeError::Decode(format!("图片解码失败：{}", e)))?;

        if orientation != Orientation::NoTransforms {
            log::info!("🧭 按 EXIF 方向校正：{:?}", orientation);
            decoded.apply_orientation(orientation);
        }

        Ok(decoded)
    }

    /// 仅通过内存中的图片头信息读取宽高。
    fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), BadgeError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| BadgeError::Decode(format!("无法识别图片格式：{}", e)))?;

        reader
            .into_dimensions()
            .map_err(|e| BadgeError::Decode(format!("无法读取图片尺寸：{}", e)))
    }

    fn validate_pixel_limits(
        config: &BadgeConfig,
        width: u32,
        height: u32,
    ) -> Result<(), BadgeError> {
        if width == 0 || height == 0 {
            return Err(BadgeError::Decode(format!("图片尺寸无效：{}x{}", width, height)));
        }

        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| BadgeError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(BadgeError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        config: &BadgeConfig,
        width: u32,
        height: u32,
    ) -> Result<(), BadgeError> {
        let estimated = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| BadgeError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(BadgeError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }
}

/// 将 RGBA 位图编码为 PNG 字节。
pub(crate) fn encode_png(image: &RgbaImage) -> Result<Bytes, BadgeError> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| BadgeError::Encode(format!("PNG 编码失败：{}", e)))?;
    Ok(Bytes::from(cursor.into_inner()))
}
