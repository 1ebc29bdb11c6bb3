//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `BadgeHandler` 只负责流程编排，不持有会话状态。
//! 处理链路固定为：
//! 1. 校验上传（类型 / 体积）
//! 2. 加载并解码原图
//! 3. 裁剪、缩放、覆盖徽章、编码
//!
//! ## 实现思路
//!
//! - 配置在创建时校验并固定，整个进程生命周期内不变。
//! - 合成同样放到 `spawn_blocking`，异步调用方只在 await 点挂起。
//! - 记录 `load/compose/total` 阶段耗时，便于性能诊断。

use std::time::Instant;

use super::compositor::{self, CompositeResult, CropRegion};
use super::source::{RasterImage, UploadedFile};
use super::{BadgeConfig, BadgeError};

/// 徽章合成处理器。
pub struct BadgeHandler {
    pub(super) config: BadgeConfig,
}

impl BadgeHandler {
    /// 根据配置创建处理器，配置不合法时直接失败。
    pub fn new(config: BadgeConfig) -> Result<Self, BadgeError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BadgeConfig {
        &self.config
    }

    /// 将徽章预先拉伸到输出尺寸，之后每次合成直接复用。
    pub(crate) async fn prepare_badge(
        &self,
        badge: RasterImage,
    ) -> Result<RasterImage, BadgeError> {
        let output_size = self.config.output_size;
        let quality = self.config.resize_quality;

        tokio::task::spawn_blocking(move || compositor::stretch_badge(&badge, output_size, quality))
            .await
            .map_err(|e| BadgeError::BadgeLoad(format!("徽章预处理任务异常终止：{}", e)))?
            .map_err(|e| BadgeError::BadgeLoad(e.to_string()))
    }

    /// 处理主入口：加载上传文件并与徽章合成。
    pub(crate) async fn process_upload(
        &self,
        file: UploadedFile,
        badge: &RasterImage,
    ) -> Result<CompositeResult, BadgeError> {
        let total_start = Instant::now();

        let load_start = Instant::now();
        let original = self.load_original(file).await?;
        let load_elapsed = load_start.elapsed();

        let (width, height) = original.dimensions();
        let crop = CropRegion::centered(width, height);
        if crop.is_full_frame(width, height) {
            log::info!("✂️ 原图已是正方形 {}x{}，无需裁剪", width, height);
        } else {
            log::info!(
                "✂️ 居中裁剪 - 原图: {}x{} 区域: ({}, {}) 边长: {}",
                width,
                height,
                crop.x,
                crop.y,
                crop.size
            );
        }

        let compose_start = Instant::now();
        let result = self.compose_off_thread(original, badge.clone()).await?;
        let compose_elapsed = compose_start.elapsed();

        log::info!(
            "✅ 徽章合成完成 - load={}ms compose={}ms total={}ms output={}KB",
            load_elapsed.as_millis(),
            compose_elapsed.as_millis(),
            total_start.elapsed().as_millis(),
            result.png.len() / 1024
        );

        Ok(result)
    }

    async fn compose_off_thread(
        &self,
        original: RasterImage,
        badge: RasterImage,
    ) -> Result<CompositeResult, BadgeError> {
        let output_size = self.config.output_size;
        let quality = self.config.resize_quality;

        tokio::task::spawn_blocking(move || {
            compositor::compose(&original, &badge, output_size, quality)
        })
        .await
        .map_err(|e| BadgeError::Encode(format!("合成任务异常终止：{}", e)))?
    }
}
