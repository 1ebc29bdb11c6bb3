//! # 服务层（宿主持有的状态）
//!
//! ## 设计思路
//!
//! 使用 `BadgeServiceState` 作为宿主持有的唯一状态对象，替代全局可变变量。
//! 徽章、会话与提交序号都归它所有，生命周期由宿主统一管理。
//!
//! ## 实现思路
//!
//! - 徽章放在 `OnceCell` 中：只尝试加载一次，成功或失败的结果都会被缓存，不做重试。
//! - 会话由 `Mutex` 保护，只在不跨 await 的短区间内加锁。
//! - 重叠提交采用“最新者胜出”：每次提交与重置都会领取新序号，
//!   处理完成时序号已过期的结果直接丢弃并返回 `Superseded`。

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::OnceCell;

use super::handler::BadgeHandler;
use super::session::{BadgeSession, CompositePreview, DownloadArtifact, SessionState};
use super::source::{RasterImage, UploadedFile};
use super::{BadgeConfig, BadgeError};

/// 单次成功提交的摘要。
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubmitSummary {
    pub output_size: u32,
    pub source_width: u32,
    pub source_height: u32,
    pub crop_x: f64,
    pub crop_y: f64,
    pub crop_size: u32,
    pub bytes: usize,
}

/// 徽章合成服务状态。
pub struct BadgeServiceState {
    handler: BadgeHandler,
    badge: OnceCell<Result<RasterImage, BadgeError>>,
    session: Mutex<BadgeSession>,
    generation: AtomicU64,
}

impl BadgeServiceState {
    /// 使用默认配置创建服务状态。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use saral_badge::badge::BadgeServiceState;
    ///
    /// # async fn demo() -> Result<(), saral_badge::badge::BadgeError> {
    /// let service = BadgeServiceState::new()?;
    /// service.load_badge().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new() -> Result<Self, BadgeError> {
        Self::with_config(BadgeConfig::default())
    }

    /// 使用自定义配置创建服务状态。
    pub fn with_config(config: BadgeConfig) -> Result<Self, BadgeError> {
        let handler = BadgeHandler::new(config)?;
        Ok(Self {
            handler,
            badge: OnceCell::new(),
            session: Mutex::new(BadgeSession::new()),
            generation: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &BadgeConfig {
        self.handler.config()
    }

    /// 从配置的路径加载徽章；只在第一次调用时真正执行。
    pub async fn load_badge(&self) -> Result<(), BadgeError> {
        let path = self.handler.config().badge_path.clone();
        self.init_badge(async {
            let raw = self.handler.load_badge_from_path(Path::new(&path)).await?;
            self.handler.prepare_badge(raw).await
        })
        .await
    }

    /// 从内存字节加载徽章（资源内嵌到宿主时使用）。
    pub async fn load_badge_from_bytes(&self, bytes: impl Into<Bytes>) -> Result<(), BadgeError> {
        let bytes = bytes.into();
        self.init_badge(async {
            let raw = self.handler.load_badge_from_bytes(bytes).await?;
            self.handler.prepare_badge(raw).await
        })
        .await
    }

    async fn init_badge<F>(&self, load: F) -> Result<(), BadgeError>
    where
        F: Future<Output = Result<RasterImage, BadgeError>>,
    {
        let outcome = self
            .badge
            .get_or_init(|| async {
                let result = load.await;
                match &result {
                    Ok(badge) => log::info!(
                        "🏷️ 徽章加载成功 - 尺寸: {}x{}",
                        badge.width(),
                        badge.height()
                    ),
                    Err(err) => log::error!("❌ 徽章加载失败，合成功能在本次会话中不可用：{}", err),
                }
                result
            })
            .await;

        outcome.as_ref().map(|_| ()).map_err(Clone::clone)
    }

    fn ready_badge(&self) -> Result<RasterImage, BadgeError> {
        match self.badge.get() {
            Some(Ok(badge)) => Ok(badge.clone()),
            Some(Err(err)) => Err(err.clone()),
            None => Err(BadgeError::MissingInput("徽章尚未加载".to_string())),
        }
    }

    /// 执行完整处理流程：校验 → 加载 → 合成 → 写入会话。
    ///
    /// - 类型 / 体积不合规：立即失败，会话不变。
    /// - 徽章不可用：立即失败，不读取上传内容。
    /// - 处理失败：会话回到 `Idle`。
    /// - 期间有更新的提交或重置：结果丢弃，返回 `Superseded`。
    pub async fn submit(&self, file: UploadedFile) -> Result<SubmitSummary, BadgeError> {
        BadgeHandler::validate_upload(&file, self.handler.config())?;
        let badge = self.ready_badge()?;

        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("📥 收到上传 #{} - 文件: {}", ticket, file.name);

        let outcome = self.handler.process_upload(file, &badge).await;

        let mut session = self.lock_session()?;
        if self.generation.load(Ordering::SeqCst) != ticket {
            log::info!("⏭️ 上传 #{} 已被更新的操作取代，结果丢弃", ticket);
            return Err(BadgeError::Superseded);
        }

        match outcome {
            Ok(result) => {
                let summary = SubmitSummary {
                    output_size: result.output_size,
                    source_width: result.source_dimensions.0,
                    source_height: result.source_dimensions.1,
                    crop_x: result.crop.x,
                    crop_y: result.crop.y,
                    crop_size: result.crop.size,
                    bytes: result.png.len(),
                };
                session.store(result);
                Ok(summary)
            }
            Err(err) => {
                log::warn!("⚠️ 上传 #{} 处理失败，会话回到空闲：{}", ticket, err);
                session.reset();
                Err(err)
            }
        }
    }

    /// 回到 `Idle`，同时让进行中的提交作废。
    pub fn reset(&self) -> Result<(), BadgeError> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.lock_session()?.reset();
        log::info!("🔄 会话已重置");
        Ok(())
    }

    pub fn state(&self) -> Result<SessionState, BadgeError> {
        Ok(self.lock_session()?.state())
    }

    pub fn preview(&self) -> Result<CompositePreview, BadgeError> {
        self.lock_session()?.preview()
    }

    pub fn download(&self) -> Result<DownloadArtifact, BadgeError> {
        let file_name = &self.handler.config().download_file_name;
        self.lock_session()?.download(file_name)
    }

    fn lock_session(&self) -> Result<std::sync::MutexGuard<'_, BadgeSession>, BadgeError> {
        self.session
            .lock()
            .map_err(|_| BadgeError::ResourceLimit("会话锁已中毒".to_string()))
    }
}
