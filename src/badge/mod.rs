//! # 徽章合成模块（badge）
//!
//! ## 设计思路
//!
//! 该模块将“上传校验 → 加载解码 → 居中裁剪缩放 → 覆盖徽章 → 编码 → 会话保存”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `service`：承载宿主持有的状态（`BadgeServiceState`）与重叠提交策略
//! - `handler`：编排整条处理流水线并记录阶段耗时
//! - `loader`：负责上传 / 徽章字节加载与提交前校验
//! - `pipeline`：负责解码、像素限制与 PNG 编码
//! - `compositor`：纯函数合成（裁剪几何 + 缩放 + 覆盖）
//! - `session`：`Idle` / `HasResult` 状态与预览、下载
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! ```text
//! 宿主（界面 / IPC）
//!    ↓
//! service.rs（徽章一次性加载、提交序号、会话锁）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（类型 / 体积校验 + 文件签名 + 后台解码）
//!    ├─ pipeline.rs（格式白名单 + 像素限制 + PNG 编码）
//!    └─ compositor.rs（裁剪几何 + 缩放 + source-over 覆盖）
//!    ↓
//! session.rs（保存结果，供预览 / 下载）
//! ```

mod compositor;
mod config;
mod error;
mod handler;
mod loader;
mod pipeline;
mod service;
mod session;
mod source;

pub use compositor::{
    CompositeResult, CropRegion, compose, compose_pixels, overlay_badge, render_cropped_pixels,
    stretch_badge,
};
pub use config::{
    BadgeConfig, DEFAULT_BADGE_PATH, DEFAULT_DOWNLOAD_FILE_NAME, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_OUTPUT_SIZE, ResizeQuality,
};
pub use error::{BadgeCommandError, BadgeError};
pub use handler::BadgeHandler;
pub use loader::read_upload;
pub use service::{BadgeServiceState, SubmitSummary};
pub use session::{
    BadgeSession, CompositePreview, DOWNLOAD_MIME_TYPE, DownloadArtifact, SessionState,
};
pub use source::{RasterImage, UploadedFile};
