//! # 检查器配置

use serde::{Deserialize, Serialize};
use serde_with::{DurationSeconds, serde_as};
use std::path::PathBuf;
use std::time::Duration;

/// 默认 User-Agent
pub const DEFAULT_USER_AGENT: &str = "webring-checker (+https://otor.ing)";

/// 探测使用的 HTTP 方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    /// GET 请求，对拒绝 HEAD 的站点更友好
    #[default]
    Get,
    /// HEAD 请求
    Head,
}

impl ProbeMethod {
    /// 转换为 reqwest 方法
    #[must_use]
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Head => reqwest::Method::HEAD,
        }
    }
}

/// 站点可用性检查配置
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// 代理地址，未设置时仅直连
    pub proxy_url: Option<String>,
    /// 调试模式：缩短检查间隔并输出详细日志
    pub debug: bool,
    /// 并发探测工作者数量
    pub workers: usize,
    /// 检查间隔
    #[serde_as(as = "DurationSeconds<u64>")]
    pub interval: Duration,
    /// 调试模式下的检查间隔
    #[serde_as(as = "DurationSeconds<u64>")]
    pub debug_interval: Duration,
    /// 单次请求超时时间
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
    /// 连续失败多少次后标记为下线
    pub down_threshold: u32,
    /// 低于该状态码视为在线
    pub status_threshold: u16,
    /// 探测方法
    pub probe_method: ProbeMethod,
    /// 探测请求的 User-Agent
    pub user_agent: String,
    /// 任务队列容量
    pub task_queue_capacity: usize,
    /// 结果队列容量
    pub result_queue_capacity: usize,
    /// 连续多少次代理失败后判定代理不可用
    pub proxy_failure_threshold: u32,
    /// 连续多少次代理成功后判定代理恢复
    pub proxy_recovery_threshold: u32,
    /// 代理不可用后多久重新尝试一轮代理
    #[serde_as(as = "DurationSeconds<u64>")]
    pub proxy_retry_after: Duration,
    /// 同一站点两次通知之间的最小间隔
    #[serde_as(as = "DurationSeconds<u64>")]
    pub notify_quiet_period: Duration,
    /// 失败探测的追加日志文件
    pub error_log_path: Option<PathBuf>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            debug: false,
            workers: 5,
            interval: Duration::from_secs(5 * 60),
            debug_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            down_threshold: 3,
            status_threshold: 400,
            probe_method: ProbeMethod::Get,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            task_queue_capacity: 1024,
            result_queue_capacity: 1024,
            proxy_failure_threshold: 5,
            proxy_recovery_threshold: 5,
            proxy_retry_after: Duration::from_secs(30 * 60),
            notify_quiet_period: Duration::from_secs(30),
            error_log_path: None,
        }
    }
}

impl CheckerConfig {
    /// 实际生效的检查间隔
    #[must_use]
    pub const fn effective_interval(&self) -> Duration {
        if self.debug {
            self.debug_interval
        } else {
            self.interval
        }
    }

    /// 每个检查周期内最多能探测的站点数估算：`workers × (interval / timeout)`
    #[must_use]
    pub fn estimated_capacity(&self) -> usize {
        let timeout = self.request_timeout.as_secs_f64();
        if timeout <= 0.0 {
            return usize::MAX;
        }
        let per_worker = (self.effective_interval().as_secs_f64() / timeout).floor();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let per_worker = per_worker as usize;
        self.workers.saturating_mul(per_worker)
    }

    /// 配置的代理地址（忽略空字符串）
    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        self.proxy_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// 验证配置有效性
    pub fn validate(&self) -> crate::error::Result<()> {
        crate::ensure_config!(self.workers > 0, "工作者数量必须大于0");
        crate::ensure_config!(self.down_threshold > 0, "下线阈值必须大于0");
        crate::ensure_config!(
            (100..=600).contains(&self.status_threshold),
            "无效的状态码阈值: {}",
            self.status_threshold
        );
        crate::ensure_config!(!self.interval.is_zero(), "检查间隔必须大于0");
        crate::ensure_config!(!self.debug_interval.is_zero(), "调试检查间隔必须大于0");
        crate::ensure_config!(!self.request_timeout.is_zero(), "请求超时时间必须大于0");
        crate::ensure_config!(self.task_queue_capacity > 0, "任务队列容量必须大于0");
        crate::ensure_config!(self.result_queue_capacity > 0, "结果队列容量必须大于0");
        crate::ensure_config!(self.proxy_failure_threshold > 0, "代理失败阈值必须大于0");
        crate::ensure_config!(self.proxy_recovery_threshold > 0, "代理恢复阈值必须大于0");
        crate::ensure_config!(!self.user_agent.trim().is_empty(), "User-Agent 不能为空");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CheckerConfig::default();
        assert_eq!(config.workers, 5);
        assert_eq!(config.down_threshold, 3);
        assert_eq!(config.effective_interval(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_shortens_interval() {
        let config = CheckerConfig {
            debug: true,
            ..Default::default()
        };
        assert_eq!(config.effective_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_estimated_capacity() {
        let config = CheckerConfig::default();
        // 5 workers × (300s / 10s)
        assert_eq!(config.estimated_capacity(), 150);

        let config = CheckerConfig {
            debug: true,
            workers: 2,
            ..Default::default()
        };
        assert_eq!(config.estimated_capacity(), 0);
    }

    #[test]
    fn test_blank_proxy_is_ignored() {
        let config = CheckerConfig {
            proxy_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(config.proxy(), None);
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = CheckerConfig {
            workers: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("工作者数量"));
    }
}
