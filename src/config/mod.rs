//! # 配置管理模块
//!
//! 处理应用配置加载、环境变量覆盖和验证

mod app_config;
mod checker_config;
mod database;
mod overrides;

pub use app_config::{AppConfig, TelegramConfig};
pub use checker_config::{CheckerConfig, DEFAULT_USER_AGENT, ProbeMethod};
pub use database::DatabaseConfig;
pub use overrides::*;

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{CheckerError, Result};
use crate::logging::{LogComponent, LogStage};

/// 指定配置文件路径的环境变量
pub const ENV_CONFIG_PATH: &str = "WEBRING_CONFIG_PATH";

/// 解析配置文件路径：命令行参数优先，其次 `WEBRING_CONFIG_PATH`
#[must_use]
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    cli_path
        .map(Path::to_path_buf)
        .or_else(|| env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from))
}

/// 加载配置：配置文件（可选）→ 环境变量覆盖 → 验证
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => {
            crate::linfo!(
                LogStage::Configuration,
                LogComponent::Config,
                "load_config",
                "未指定配置文件，使用默认配置"
            );
            AppConfig::default()
        }
    };

    config.apply_env_overrides()?;
    validate_config(&config)?;
    Ok(config)
}

/// 读取并解析 TOML 配置文件
pub fn load_config_file(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(crate::config_error!("配置文件不存在: {}", path.display()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        CheckerError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
    })?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        CheckerError::config_with_source(format!("TOML解析失败 - 配置文件: {}", path.display()), e)
    })?;

    crate::linfo!(
        LogStage::Configuration,
        LogComponent::Config,
        "load_config_file",
        "配置文件加载完成",
        path = %path.display()
    );
    Ok(config)
}

/// 验证配置有效性
pub fn validate_config(config: &AppConfig) -> Result<()> {
    crate::ensure_config!(!config.database.url.trim().is_empty(), "数据库URL不能为空");
    crate::ensure_config!(config.database.max_connections > 0, "数据库最大连接数必须大于0");

    config.checker.validate()?;

    if let Some(proxy) = config.checker.proxy() {
        // 格式错误的代理地址不会阻止启动，运行时视为不可用
        if url::Url::parse(proxy).is_err() {
            crate::lwarn!(
                LogStage::Configuration,
                LogComponent::Config,
                "validate_config",
                "代理地址格式无效，所有请求将直连",
                proxy = proxy
            );
        }
    }

    if config.telegram.bot_token.is_some() {
        crate::ensure_config!(
            url::Url::parse(&config.telegram.api_base).is_ok(),
            "无效的 Telegram API 地址: {}",
            config.telegram.api_base
        );
    }

    Ok(())
}
