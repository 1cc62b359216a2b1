//! # 环境变量覆盖
//!
//! 环境变量优先于配置文件。无法解析的值视为配置错误，不会被静默忽略。

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::AppConfig;
use crate::error::{CheckerError, Result};
use crate::logging::{LogComponent, LogStage};

/// 数据库连接串
pub const ENV_DB_CONNECTION_STRING: &str = "DB_CONNECTION_STRING";
/// 代理地址
pub const ENV_CHECKER_PROXY: &str = "CHECKER_PROXY";
/// 调试模式
pub const ENV_CHECKER_DEBUG: &str = "CHECKER_DEBUG";
/// 工作者数量
pub const ENV_CHECKER_WORKERS: &str = "CHECKER_WORKERS";
/// 检查间隔（秒）
pub const ENV_CHECKER_INTERVAL: &str = "CHECKER_INTERVAL";
/// 下线阈值
pub const ENV_CHECKER_DOWN_THRESHOLD: &str = "CHECKER_DOWN_THRESHOLD";
/// 失败日志文件
pub const ENV_CHECKER_ERROR_LOG: &str = "CHECKER_ERROR_LOG";
/// Telegram Bot token
pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";

impl AppConfig {
    /// 从进程环境变量应用覆盖
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_env_overrides_from(|key| env::var(key).ok())
    }

    /// 从任意来源应用覆盖
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = 0usize;
        let mut get = |key: &str| {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            if value.is_some() {
                applied += 1;
            }
            value
        };

        if let Some(value) = get(ENV_DB_CONNECTION_STRING) {
            self.database.url = value;
        }
        if let Some(value) = get(ENV_CHECKER_PROXY) {
            self.checker.proxy_url = Some(value);
        }
        if let Some(value) = get(ENV_CHECKER_DEBUG) {
            self.checker.debug = parse_bool(ENV_CHECKER_DEBUG, &value)?;
        }
        if let Some(value) = get(ENV_CHECKER_WORKERS) {
            self.checker.workers = parse_number(ENV_CHECKER_WORKERS, &value)?;
        }
        if let Some(value) = get(ENV_CHECKER_INTERVAL) {
            self.checker.interval = Duration::from_secs(parse_number(ENV_CHECKER_INTERVAL, &value)?);
        }
        if let Some(value) = get(ENV_CHECKER_DOWN_THRESHOLD) {
            self.checker.down_threshold = parse_number(ENV_CHECKER_DOWN_THRESHOLD, &value)?;
        }
        if let Some(value) = get(ENV_CHECKER_ERROR_LOG) {
            self.checker.error_log_path = Some(PathBuf::from(value));
        }
        if let Some(value) = get(ENV_TELEGRAM_BOT_TOKEN) {
            self.telegram.bot_token = Some(value);
        }

        crate::ldebug!(
            LogStage::Configuration,
            LogComponent::Config,
            "apply_env_overrides",
            "环境变量覆盖已应用",
            applied = applied
        );
        Ok(())
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().map_err(|e| {
        CheckerError::config_with_source(format!("环境变量 {key} 的值无效: {value}"), e)
    })
}

/// 解析布尔型环境变量，接受 `1/0`、`true/false`、`yes/no`、`on/off`
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(crate::config_error!("环境变量 {} 的值无效: {}", key, value)),
    }
}
