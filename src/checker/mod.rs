//! # 站点可用性检查模块
//!
//! 调度器 → 任务队列 → 工作者池 → 结果队列 → 结果处理器（滞回）→ 存储与通知

pub mod failure_log;
pub mod hysteresis;
pub mod probe;
pub mod processor;
pub mod proxy_health;
pub mod scheduler;
pub mod service;
pub mod types;
pub mod worker;

pub use failure_log::FailureLog;
pub use hysteresis::FailureCounter;
pub use probe::{Prober, normalize_url};
pub use processor::ResultProcessor;
pub use proxy_health::{ProxyHealth, ProxyMode};
pub use scheduler::{Scheduler, check_capacity};
pub use service::CheckerService;
pub use types::*;
pub use worker::Worker;
