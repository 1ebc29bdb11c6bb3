//! # SARAL AI 徽章生成器：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │             宿主（桌面壳 / WASM 前端 / 测试）              │
//! │   选择文件 ── 预览 ── 下载 ── 重置 ── 错误提示            │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<T, BadgeError> / BadgeCommandError
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            核心 (Rust)                           │
//! │                                                          │
//! │  ┌─ badge ────── 校验·解码·居中裁剪·覆盖徽章·会话         │
//! │  ├─ error ────── AppError (宿主侧统一错误)               │
//! │  ├─ settings ─── JSON 设置文件 → BadgeConfig            │
//! │  ├─ storage ──── 下载产物落盘                            │
//! │  └─ logging ──── env_logger 初始化                       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`badge`] | 上传校验、图片解码、居中裁剪、徽章覆盖、PNG 编码、会话状态 |
//! | [`error`] | 宿主侧统一错误类型 `AppError` |
//! | [`settings`] | 设置文件的读取与保存 |
//! | [`storage`] | 将下载产物写入本地目录 |
//! | [`logging`] | 日志初始化 |

pub mod badge;
pub mod error;
pub mod logging;
pub mod settings;
pub mod storage;
