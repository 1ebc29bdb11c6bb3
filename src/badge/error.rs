//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载徽章合成链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误（文案沿用产品界面用语），
//! 同时提供稳定的 `code` / `stage`，让宿主按分支决定如何呈现。

/// 徽章合成统一错误类型。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BadgeError {
    #[error("Please upload a PNG, JPG, or WEBP image. (received: {0})")]
    UnsupportedType(String),

    #[error(
        "File is too large. Maximum size is {}MB. (received: {:.2}MB)",
        whole_mb(.limit),
        fractional_mb(.size)
    )]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Failed to process image. Please try again. ({0})")]
    Decode(String),

    #[error("Failed to load SARAL AI badge. Please refresh the page. ({0})")]
    BadgeLoad(String),

    #[error("Missing image or badge. Please refresh and try again. ({0})")]
    MissingInput(String),

    #[error("Failed to encode result image: {0}")]
    Encode(String),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("A newer upload or reset replaced this request")]
    Superseded,
}

fn whole_mb(bytes: &u64) -> u64 {
    *bytes / 1024 / 1024
}

fn fractional_mb(bytes: &u64) -> f64 {
    *bytes as f64 / 1024.0 / 1024.0
}

impl BadgeError {
    /// 稳定错误码，供宿主做分支处理。
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedType(_) => "E_UNSUPPORTED_TYPE",
            Self::FileTooLarge { .. } => "E_FILE_TOO_LARGE",
            Self::Decode(_) => "E_DECODE",
            Self::BadgeLoad(_) => "E_BADGE_LOAD",
            Self::MissingInput(_) => "E_MISSING_INPUT",
            Self::Encode(_) => "E_ENCODE",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::InvalidConfig(_) => "E_INVALID_CONFIG",
            Self::Superseded => "E_SUPERSEDED",
        }
    }

    /// 出错阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::UnsupportedType(_) | Self::FileTooLarge { .. } => "validate",
            Self::Decode(_) | Self::ResourceLimit(_) => "decode",
            Self::BadgeLoad(_) => "startup",
            Self::MissingInput(_) | Self::Superseded => "compose",
            Self::Encode(_) => "encode",
            Self::InvalidConfig(_) => "config",
        }
    }

    /// 是否属于“提交前校验”类错误。
    ///
    /// 此类错误不会改变会话状态，用户换一个文件重试即可。
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::UnsupportedType(_) | Self::FileTooLarge { .. })
    }
}

/// 面向宿主（前端 / IPC）的可序列化错误结构。
#[derive(Debug, Clone, serde::Serialize)]
pub struct BadgeCommandError {
    pub code: &'static str,
    pub stage: &'static str,
    /// 为 true 时会话未被改动，换一个文件重试即可。
    pub validation: bool,
    pub message: String,
}

impl From<BadgeError> for BadgeCommandError {
    fn from(error: BadgeError) -> Self {
        Self {
            code: error.code(),
            stage: error.stage(),
            validation: error.is_validation(),
            message: error.to_string(),
        }
    }
}
