//! # 会话状态模块
//!
//! ## 设计思路
//!
//! 会话只有两个状态：`Idle`（没有原图）与 `HasResult`（已有合成结果）。
//! 新结果整体替换旧结果，重置时整体清空，不存在“部分结果”。
//! 预览与下载都是只读消费，可重复调用。

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use serde::Serialize;

use super::BadgeError;
use super::compositor::CompositeResult;

/// 下载产物的 MIME 类型。
pub const DOWNLOAD_MIME_TYPE: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    HasResult,
}

/// 单用户会话。
#[derive(Debug, Default)]
pub struct BadgeSession {
    current: Option<CompositeResult>,
}

impl BadgeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        match self.current {
            Some(_) => SessionState::HasResult,
            None => SessionState::Idle,
        }
    }

    /// 存入新结果，返回被替换的旧结果（如有）。
    pub fn store(&mut self, result: CompositeResult) -> Option<CompositeResult> {
        self.current.replace(result)
    }

    /// 回到 `Idle`。
    pub fn reset(&mut self) {
        self.current = None;
    }

    pub(crate) fn current(&self) -> Option<&CompositeResult> {
        self.current.as_ref()
    }

    /// 生成预览所需的 Data URL。
    pub fn preview(&self) -> Result<CompositePreview, BadgeError> {
        let result = self.require_result("No image to preview. Please process an image first.")?;
        Ok(CompositePreview {
            result_data_url: png_data_url(&result.png),
            original_data_url: png_data_url(&result.original_png),
            output_size: result.output_size,
        })
    }

    /// 生成下载产物，字节与预览共享同一缓冲。
    pub fn download(&self, file_name: &str) -> Result<DownloadArtifact, BadgeError> {
        let result = self.require_result("No image to download. Please process an image first.")?;
        Ok(DownloadArtifact {
            file_name: file_name.to_string(),
            mime_type: DOWNLOAD_MIME_TYPE,
            bytes: result.png.clone(),
        })
    }

    fn require_result(&self, message: &str) -> Result<&CompositeResult, BadgeError> {
        self.current().ok_or_else(|| BadgeError::MissingInput(message.to_string()))
    }
}

/// 预览数据，等价于画布导出的 `data:image/png;base64,...`。
#[derive(Debug, Clone, Serialize)]
pub struct CompositePreview {
    pub result_data_url: String,
    pub original_data_url: String,
    pub output_size: u32,
}

/// 下载产物。
#[derive(Debug, Clone)]
pub struct DownloadArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Bytes,
}

fn png_data_url(bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        DOWNLOAD_MIME_TYPE,
        general_purpose::STANDARD.encode(bytes)
    )
}
