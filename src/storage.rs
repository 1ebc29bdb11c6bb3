//! 下载产物保存模块
//!
//! # 设计思路
//!
//! 浏览器里的“下载”对应到本地宿主就是把 PNG 写入用户指定目录，
//! 文件名使用固定的建议名称，目录不存在时自动创建。
//!
//! # 实现思路
//!
//! - 目录不存在时自动 `create_dir_all`，避免上层判断。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::badge::DownloadArtifact;
use crate::error::AppError;

/// 已保存文件信息
#[derive(Debug, Clone, Serialize)]
pub struct SavedDownload {
    pub path: String,
    pub size: u64,
}

/// 将下载产物写入目录，返回写入后的文件信息。
///
/// # 参数
/// * `artifact` - 会话生成的下载产物
/// * `dir` - 目标目录，不存在时自动创建
///
/// # 返回
/// - `Ok(SavedDownload)` ：写入成功
/// - `Err(AppError::Storage)` ：无法创建目录或写入文件
pub fn save_download(
    artifact: &DownloadArtifact,
    dir: impl AsRef<Path>,
) -> Result<SavedDownload, AppError> {
    let dir = dir.as_ref();
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            AppError::Storage(format!("创建下载目录 '{}' 失败: {}", dir.display(), e))
        })?;
    }

    let target: PathBuf = dir.join(&artifact.file_name);
    fs::write(&target, &artifact.bytes).map_err(|e| {
        AppError::Storage(format!("写入文件 '{}' 失败: {}", target.display(), e))
    })?;

    log::info!(
        "💾 已保存合成图片 - 路径: {} 体积: {}KB",
        target.display(),
        artifact.bytes.len() / 1024
    );

    Ok(SavedDownload {
        path: target.to_string_lossy().to_string(),
        size: artifact.bytes.len() as u64,
    })
}
