//! 设置文件读写
//!
//! 设置以 JSON 形式保存，缺失字段回落到默认值；文件不存在时整体使用默认配置。
//! 读取后立即校验，保证服务创建时拿到的是可用配置。

use std::fs;
use std::path::Path;

use crate::badge::BadgeConfig;
use crate::error::AppError;

/// 读取设置文件；文件不存在时返回默认配置。
pub fn load_config(path: impl AsRef<Path>) -> Result<BadgeConfig, AppError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!("设置文件不存在，使用默认配置: {}", path.display());
        return Ok(BadgeConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config = serde_json::from_str::<BadgeConfig>(&content)
        .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))?;
    config.validate()?;

    Ok(config)
}

/// 写入设置文件（格式化 JSON），必要时创建父目录。
pub fn save_config(path: impl AsRef<Path>, config: &BadgeConfig) -> Result<(), AppError> {
    let path = path.as_ref();
    config.validate()?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Settings(format!("创建设置目录失败: {}", e)))?;
        }
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;

    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::ResizeQuality;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config(dir.path().join("nope.json")).expect("load defaults");
        assert_eq!(config, BadgeConfig::default());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("settings.json");

        let config = BadgeConfig {
            output_size: 1024,
            resize_quality: ResizeQuality::Quality,
            ..BadgeConfig::default()
        };
        save_config(&path, &config).expect("save settings");

        assert_eq!(load_config(&path).expect("load settings"), config);
    }

    #[test]
    fn invalid_json_and_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{ not json").expect("write fixture");
        assert!(matches!(load_config(&broken), Err(AppError::Settings(_))));

        let zero = dir.path().join("zero.json");
        fs::write(&zero, r#"{ "output_size": 0 }"#).expect("write fixture");
        assert!(matches!(load_config(&zero), Err(AppError::Badge(_))));
    }
}
