//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理上传文件与徽章资源的字节加载，并在“尽可能早”的阶段执行输入校验。
//! 目标是尽快失败：类型与体积不合规的上传在任何解码动作之前就被拒绝，且不触碰会话状态。
//!
//! ## 实现思路
//!
//! - 上传：声明类型 → 体积 → 文件签名 → 后台线程解码。
//! - 本地文件：先看 metadata 体积，再读取，类型由文件签名推断。
//! - 徽章：路径或内嵌字节，任何失败统一映射为 `BadgeLoad`。
//! - 解码放到 `spawn_blocking`，避免大图阻塞异步执行器。

use std::path::Path;

use bytes::Bytes;

use super::handler::BadgeHandler;
use super::source::{RasterImage, RawImageData, UploadedFile};
use super::{BadgeConfig, BadgeError};

impl BadgeHandler {
    /// 校验上传文件：先类型、后体积，不做任何解码。
    pub fn validate_upload(file: &UploadedFile, config: &BadgeConfig) -> Result<(), BadgeError> {
        if !config.is_allowed_type(&file.content_type) {
            log::warn!(
                "🚫 拒绝上传 - 文件: {} 类型: {:?}",
                file.name,
                file.content_type
            );
            return Err(BadgeError::UnsupportedType(file.content_type.clone()));
        }

        if file.size() > config.max_file_size {
            log::warn!(
                "🚫 拒绝上传 - 文件: {} 体积: {:.2} MB（限制：{:.2} MB）",
                file.name,
                file.size() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            );
            return Err(BadgeError::FileTooLarge {
                size: file.size(),
                limit: config.max_file_size,
            });
        }

        Ok(())
    }

    /// 加载并解码用户上传的原图。
    pub(crate) async fn load_original(
        &self,
        file: UploadedFile,
    ) -> Result<RasterImage, BadgeError> {
        Self::validate_upload(&file, &self.config)?;

        log::info!(
            "📁 开始处理上传图片 - 文件: {} 类型: {} 体积: {}KB",
            file.name,
            file.content_type,
            file.bytes.len() / 1024
        );

        Self::validate_image_signature(&file.bytes)?;

        self.decode_off_thread(RawImageData {
            bytes: file.bytes,
            source_hint: "upload",
        })
        .await
    }

    /// 从路径加载徽章资源。
    pub(crate) async fn load_badge_from_path(
        &self,
        path: &Path,
    ) -> Result<RasterImage, BadgeError> {
        log::info!("🏷️ 开始加载徽章 - 路径: {}", path.display());

        let bytes = tokio::fs::read(path).await.map_err(|e| {
            BadgeError::BadgeLoad(format!("无法读取徽章文件 {}：{}", path.display(), e))
        })?;

        self.load_badge_from_bytes(Bytes::from(bytes)).await
    }

    /// 从内存字节加载徽章资源（用于资源内嵌的宿主）。
    pub(crate) async fn load_badge_from_bytes(
        &self,
        bytes: Bytes,
    ) -> Result<RasterImage, BadgeError> {
        Self::validate_image_signature(&bytes)
            .map_err(|e| BadgeError::BadgeLoad(e.to_string()))?;

        self.decode_off_thread(RawImageData {
            bytes,
            source_hint: "badge",
        })
        .await
        .map_err(|e| match e {
            BadgeError::BadgeLoad(_) => e,
            other => BadgeError::BadgeLoad(other.to_string()),
        })
    }

    /// 在阻塞线程池中解码，保持异步调用方不被占用。
    async fn decode_off_thread(&self, raw: RawImageData) -> Result<RasterImage, BadgeError> {
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || Self::decode_raster(raw, &config))
            .await
            .map_err(|e| BadgeError::Decode(format!("解码任务异常终止：{}", e)))?
    }

    /// 通过文件签名（magic bytes）做解码前的粗筛。
    ///
    /// 能识别出“非图片”签名时直接拒绝；无法识别的交给解码器判定。
    fn validate_image_signature(bytes: &[u8]) -> Result<(), BadgeError> {
        if bytes.is_empty() {
            return Err(BadgeError::Decode("图片内容为空".to_string()));
        }

        if let Some(kind) = infer::get(bytes) {
            if kind.matcher_type() != infer::MatcherType::Image {
                return Err(BadgeError::Decode(format!(
                    "文件签名不是图片类型：{}",
                    kind.mime_type()
                )));
            }
        }

        Ok(())
    }
}

/// 从本地路径读取上传文件（供桌面宿主使用）。
///
/// 先按 metadata 判断体积，超限时不读取内容；内容类型通过文件签名推断。
pub async fn read_upload(
    path: impl AsRef<Path>,
    config: &BadgeConfig,
) -> Result<UploadedFile, BadgeError> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| BadgeError::Decode(format!("无法读取文件信息 {}：{}", path.display(), e)))?;

    if metadata.len() > config.max_file_size {
        return Err(BadgeError::FileTooLarge {
            size: metadata.len(),
            limit: config.max_file_size,
        });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| BadgeError::Decode(format!("无法读取图片文件 {}：{}", path.display(), e)))?;

    let content_type = infer::get(&bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(UploadedFile::new(name, content_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, 0, 255])
        });
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    fn handler() -> BadgeHandler {
        BadgeHandler::new(BadgeConfig::default()).expect("handler init failed")
    }

    #[test]
    fn validate_rejects_disallowed_type_before_size() {
        let config = BadgeConfig::default();
        let file = UploadedFile::new("anim.gif", "image/gif", vec![0u8; 20 * 1024 * 1024]);

        let result = BadgeHandler::validate_upload(&file, &config);
        assert!(matches!(result, Err(BadgeError::UnsupportedType(t)) if t == "image/gif"));
    }

    #[test]
    fn validate_rejects_oversized_upload() {
        let config = BadgeConfig::default();
        let file = UploadedFile::new("big.png", "image/png", vec![0u8; 10 * 1024 * 1024 + 1]);

        let result = BadgeHandler::validate_upload(&file, &config);
        assert!(matches!(result, Err(BadgeError::FileTooLarge { .. })));
    }

    #[test]
    fn validate_accepts_exact_limit() {
        let config = BadgeConfig::default();
        let file = UploadedFile::new("edge.webp", "image/webp", vec![0u8; 10 * 1024 * 1024]);

        assert!(BadgeHandler::validate_upload(&file, &config).is_ok());
    }

    #[test]
    fn signature_check_rejects_known_non_image() {
        let pdf = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n".to_vec();
        let result = BadgeHandler::validate_image_signature(&pdf);
        assert!(matches!(result, Err(BadgeError::Decode(_))));

        assert!(BadgeHandler::validate_image_signature(&[]).is_err());
        assert!(BadgeHandler::validate_image_signature(&create_png_bytes(2, 2)).is_ok());
    }

    #[tokio::test]
    async fn load_original_decodes_valid_png() {
        let file = UploadedFile::new("me.png", "image/png", create_png_bytes(30, 20));

        let raster = handler().load_original(file).await.expect("load should succeed");
        assert_eq!(raster.dimensions(), (30, 20));
    }

    #[tokio::test]
    async fn load_original_reports_decode_error_for_corrupt_bytes() {
        let mut bytes = create_png_bytes(64, 64);
        bytes.truncate(40);
        let file = UploadedFile::new("broken.png", "image/png", bytes);

        let result = handler().load_original(file).await;
        assert!(matches!(result, Err(BadgeError::Decode(_))));
    }

    #[tokio::test]
    async fn badge_failures_map_to_badge_load() {
        let handler = handler();

        let missing = handler
            .load_badge_from_path(Path::new("/definitely/not/here/badge.png"))
            .await;
        assert!(matches!(missing, Err(BadgeError::BadgeLoad(_))));

        let corrupt = handler
            .load_badge_from_bytes(Bytes::from_static(b"\x89PNG\r\n\x1a\nnot really"))
            .await;
        assert!(matches!(corrupt, Err(BadgeError::BadgeLoad(_))));
    }

    #[tokio::test]
    async fn read_upload_sniffs_content_type_and_checks_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("photo.png");
        std::fs::write(&path, create_png_bytes(8, 8)).expect("write fixture");

        let file = read_upload(&path, &BadgeConfig::default()).await.expect("read upload");
        assert_eq!(file.name, "photo.png");
        assert_eq!(file.content_type, "image/png");

        let mut tiny = BadgeConfig::default();
        tiny.max_file_size = 4;
        let result = read_upload(&path, &tiny).await;
        assert!(matches!(result, Err(BadgeError::FileTooLarge { .. })));
    }
}
