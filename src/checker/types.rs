//! # 检查类型定义

use std::sync::Arc;
use std::time::Duration;

use crate::storage::MonitoredSite;

/// 探测一个站点一次的任务
#[derive(Debug, Clone)]
pub struct CheckTask {
    /// 调度时的站点快照
    pub site: Arc<MonitoredSite>,
    /// 是否经代理探测
    pub use_proxy: bool,
    /// 调度时已提交的在线状态
    pub was_up: bool,
}

impl CheckTask {
    #[must_use]
    pub fn new(site: Arc<MonitoredSite>, use_proxy: bool) -> Self {
        let was_up = site.is_up;
        Self {
            site,
            use_proxy,
            was_up,
        }
    }
}

/// 单次探测结果
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// 被探测的站点
    pub site: Arc<MonitoredSite>,
    /// 调度时已提交的在线状态
    pub was_up: bool,
    /// 本次探测是否在线
    pub is_up: bool,
    /// 本次探测耗时
    pub latency: Duration,
    /// HTTP 状态码
    pub status_code: Option<u16>,
    /// 错误描述
    pub error: Option<String>,
    /// 是否经代理
    pub used_proxy: bool,
    /// 经代理失败时的归属
    pub proxy_fault: ProxyFault,
}

impl CheckResult {
    #[must_use]
    pub fn site_id(&self) -> i32 {
        self.site.id
    }

    /// 延迟（秒），写入存储使用
    #[must_use]
    pub fn latency_seconds(&self) -> f64 {
        self.latency.as_secs_f64()
    }

    /// 失败由代理引起，不能说明站点本身的状态
    #[must_use]
    pub fn is_proxy_failure(&self) -> bool {
        self.used_proxy && !self.is_up && self.proxy_fault != ProxyFault::None
    }

    /// 代理本身不可达，计入代理健康
    #[must_use]
    pub fn is_proxy_unreachable(&self) -> bool {
        self.used_proxy && !self.is_up && self.proxy_fault == ProxyFault::Unreachable
    }
}

/// 经代理请求失败的归属
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProxyFault {
    /// 与代理无关，结果反映站点状态
    #[default]
    None,
    /// 代理可达但未能建立到站点的隧道，需要直连确认
    Tunnel,
    /// 代理不可达或拒绝服务
    Unreachable,
}

/// 单次 HTTP 探测的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub is_up: bool,
    pub latency: Duration,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub used_proxy: bool,
    pub proxy_fault: ProxyFault,
}

impl ProbeOutcome {
    /// 与任务合并为探测结果
    #[must_use]
    pub fn into_result(self, task: &CheckTask) -> CheckResult {
        CheckResult {
            site: Arc::clone(&task.site),
            was_up: task.was_up,
            is_up: self.is_up,
            latency: self.latency,
            status_code: self.status_code,
            error: self.error,
            used_proxy: self.used_proxy,
            proxy_fault: self.proxy_fault,
        }
    }
}

/// 一轮调度的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// 站点总数
    pub sites: usize,
    /// 成功入队的任务数
    pub enqueued: usize,
    /// 因队列已满被丢弃的任务数
    pub dropped: usize,
    /// 本轮是否经代理
    pub use_proxy: bool,
}

/// 滞回判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusVerdict {
    /// 提交新的在线状态
    Commit { is_up: bool },
    /// 状态不变，仅刷新延迟
    RefreshLatency,
    /// 结果不能说明站点状态，忽略
    Skip,
}

/// 代理健康状态翻转
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyTransition {
    /// 判定为不可用
    WentDown,
    /// 恢复可用
    Recovered,
}
