//! # 日志配置模块
//!
//! 提供日志初始化以及统一的结构化日志宏。
//!
//! 所有日志宏的参数顺序一致：`(stage, component, operation, message, fields...)`，
//! 其中 `fields` 直接透传给 `tracing`，例如 `site_id = id, error = %err`。

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStage {
    /// 启动
    Startup,
    /// 关闭
    Shutdown,
    /// 配置加载
    Configuration,
    /// 调度
    Scheduling,
    /// 站点探测
    Probe,
    /// 结果处理
    Processing,
    /// 代理健康
    ProxyHealth,
    /// 通知
    Notification,
    /// 数据库
    Db,
}

impl LogStage {
    /// 字段值
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Configuration => "configuration",
            Self::Scheduling => "scheduling",
            Self::Probe => "probe",
            Self::Processing => "processing",
            Self::ProxyHealth => "proxy_health",
            Self::Notification => "notification",
            Self::Db => "db",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日志组件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogComponent {
    /// 主程序
    Main,
    /// 配置
    Config,
    /// 数据库
    Database,
    /// 检查服务
    Service,
    /// 调度器
    Scheduler,
    /// 探测工作者
    Worker,
    /// HTTP 探测器
    Prober,
    /// 结果处理器
    ResultProcessor,
    /// 代理健康追踪
    ProxyHealth,
    /// 通知分发
    Notifier,
    /// Telegram 发送端
    Telegram,
    /// 失败日志文件
    FailureLog,
}

impl LogComponent {
    /// 字段值
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::Database => "database",
            Self::Service => "service",
            Self::Scheduler => "scheduler",
            Self::Worker => "worker",
            Self::Prober => "prober",
            Self::ResultProcessor => "result_processor",
            Self::ProxyHealth => "proxy_health",
            Self::Notifier => "notifier",
            Self::Telegram => "telegram",
            Self::FailureLog => "failure_log",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::debug!(
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($stage:expr, $component:expr, $operation:expr, $message:expr, $($fields:tt)+) => {
        ::tracing::debug!(
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($fields)+,
            "{}",
            $message
        )
    };
}

/// 结构化 info 日志
#[macro_export]
macro_rules! linfo {
    ($stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::info!(
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($stage:expr, $component:expr, $operation:expr, $message:expr, $($fields:tt)+) => {
        ::tracing::info!(
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($fields)+,
            "{}",
            $message
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::warn!(
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($stage:expr, $component:expr, $operation:expr, $message:expr, $($fields:tt)+) => {
        ::tracing::warn!(
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($fields)+,
            "{}",
            $message
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::error!(
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($stage:expr, $component:expr, $operation:expr, $message:expr, $($fields:tt)+) => {
        ::tracing::error!(
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($fields)+,
            "{}",
            $message
        )
    };
}

/// 构造默认过滤规则
///
/// 调试模式下本 crate 输出 `debug` 级别，数据库查询日志始终关闭。
#[must_use]
pub fn default_filter(log_level: Option<&str>, debug: bool) -> String {
    let level = log_level.unwrap_or("info");
    let crate_level = if debug { "debug" } else { level };
    format!("{level},webring_checker={crate_level},sqlx::query=off,sea_orm::query=warn,sqlx=warn")
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先于默认过滤规则。
pub fn init_logging(log_level: Option<&str>, debug: bool) {
    let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| default_filter(log_level, debug));

    let result = tracing_subscriber::registry()
        .with(EnvFilter::try_new(&log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();

    if result.is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}
