//! # 代理健康追踪
//!
//! 只有结果处理器写入，调度器每轮读取一次。

use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::types::{CheckResult, ProxyTransition};
use crate::config::CheckerConfig;
use crate::logging::{LogComponent, LogStage};

/// 代理可用性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// 未配置代理
    Disabled,
    /// 已配置但地址无效，从不使用
    Unusable,
    /// 已配置且可用
    Configured,
}

#[derive(Debug)]
struct ProxyState {
    alive: bool,
    successes: u32,
    failures: u32,
    /// 判定不可用或上一次试探的时间
    last_trial: Option<Instant>,
}

/// 代理健康状态
#[derive(Debug)]
pub struct ProxyHealth {
    mode: ProxyMode,
    state: RwLock<ProxyState>,
    failure_threshold: u32,
    recovery_threshold: u32,
    retry_after: Duration,
}

impl ProxyHealth {
    #[must_use]
    pub fn new(mode: ProxyMode, config: &CheckerConfig) -> Self {
        Self {
            mode,
            state: RwLock::new(ProxyState {
                alive: mode == ProxyMode::Configured,
                successes: 0,
                failures: 0,
                last_trial: None,
            }),
            failure_threshold: config.proxy_failure_threshold.max(1),
            recovery_threshold: config.proxy_recovery_threshold.max(1),
            retry_after: config.proxy_retry_after,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ProxyMode {
        self.mode
    }

    /// 代理当前是否可用
    pub async fn is_alive(&self) -> bool {
        self.state.read().await.alive
    }

    /// 本轮调度是否经代理
    ///
    /// 代理不可用时每隔 `retry_after` 放行一轮试探。
    pub async fn should_route(&self, now: Instant) -> bool {
        if self.mode != ProxyMode::Configured {
            return false;
        }
        if self.is_alive().await {
            return true;
        }

        let mut state = self.state.write().await;
        if state.alive {
            return true;
        }
        let due = state
            .last_trial
            .is_none_or(|last| now.saturating_duration_since(last) >= self.retry_after);
        if due {
            state.last_trial = Some(now);
        }
        due
    }

    /// 记录一次结果，状态翻转时返回翻转方向
    ///
    /// 只统计经代理的结果。站点本身导致的失败不影响代理状态。
    pub async fn record(&self, result: &CheckResult) -> Option<ProxyTransition> {
        if !result.used_proxy {
            return None;
        }

        if result.is_up {
            self.record_success().await
        } else if result.is_proxy_unreachable() {
            self.record_failure(Instant::now()).await
        } else {
            None
        }
    }

    async fn record_success(&self) -> Option<ProxyTransition> {
        let mut state = self.state.write().await;
        state.failures = 0;
        state.successes = state.successes.saturating_add(1);

        if !state.alive && state.successes >= self.recovery_threshold {
            state.alive = true;
            state.successes = 0;
            state.last_trial = None;
            drop(state);
            crate::linfo!(
                LogStage::ProxyHealth,
                LogComponent::ProxyHealth,
                "proxy_recovered",
                "代理恢复可用，后续任务将经代理探测",
                threshold = self.recovery_threshold
            );
            return Some(ProxyTransition::Recovered);
        }
        None
    }

    async fn record_failure(&self, now: Instant) -> Option<ProxyTransition> {
        let mut state = self.state.write().await;
        state.successes = 0;
        state.failures = state.failures.saturating_add(1);

        if state.alive && state.failures >= self.failure_threshold {
            state.alive = false;
            state.failures = 0;
            state.last_trial = Some(now);
            drop(state);
            crate::lwarn!(
                LogStage::ProxyHealth,
                LogComponent::ProxyHealth,
                "proxy_down",
                "代理连续失败，后续任务改为直连",
                threshold = self.failure_threshold
            );
            return Some(ProxyTransition::WentDown);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SiteFixture;

    fn health(mode: ProxyMode) -> ProxyHealth {
        ProxyHealth::new(
            mode,
            &CheckerConfig {
                proxy_failure_threshold: 3,
                proxy_recovery_threshold: 2,
                proxy_retry_after: Duration::from_secs(60),
                ..Default::default()
            },
        )
    }

    fn proxy_failure() -> CheckResult {
        SiteFixture::new(1).proxied_result(false, true)
    }

    fn proxy_success() -> CheckResult {
        SiteFixture::new(1).proxied_result(true, false)
    }

    #[tokio::test]
    async fn test_flips_down_after_consecutive_failures() {
        let health = health(ProxyMode::Configured);
        assert!(health.should_route(Instant::now()).await);

        assert_eq!(health.record(&proxy_failure()).await, None);
        assert_eq!(health.record(&proxy_failure()).await, None);
        assert_eq!(health.record(&proxy_failure()).await, Some(ProxyTransition::WentDown));

        assert!(!health.is_alive().await);
        assert!(!health.should_route(Instant::now()).await);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let health = health(ProxyMode::Configured);
        health.record(&proxy_failure()).await;
        health.record(&proxy_failure()).await;
        health.record(&proxy_success()).await;
        health.record(&proxy_failure()).await;
        health.record(&proxy_failure()).await;
        assert!(health.is_alive().await);
    }

    #[tokio::test]
    async fn test_site_failures_and_direct_results_are_neutral() {
        let health = health(ProxyMode::Configured);
        for _ in 0..10 {
            assert_eq!(health.record(&SiteFixture::new(1).proxied_result(false, false)).await, None);
            assert_eq!(health.record(&SiteFixture::new(1).result(false)).await, None);
        }
        assert!(health.is_alive().await);
    }

    #[tokio::test]
    async fn test_rejected_tunnels_do_not_flip_proxy() {
        let health = health(ProxyMode::Configured);
        for id in 0..10 {
            let result = SiteFixture::new(id).tunnel_failure();
            assert!(result.is_proxy_failure());
            assert_eq!(health.record(&result).await, None);
        }
        assert!(health.is_alive().await);

        // 隧道失败不打断代理失败计数
        health.record(&proxy_failure()).await;
        health.record(&SiteFixture::new(2).tunnel_failure()).await;
        health.record(&proxy_failure()).await;
        assert_eq!(health.record(&proxy_failure()).await, Some(ProxyTransition::WentDown));
    }

    #[tokio::test]
    async fn test_recovers_after_consecutive_successes() {
        let health = health(ProxyMode::Configured);
        for _ in 0..3 {
            health.record(&proxy_failure()).await;
        }
        assert!(!health.is_alive().await);

        assert_eq!(health.record(&proxy_success()).await, None);
        assert_eq!(health.record(&proxy_success()).await, Some(ProxyTransition::Recovered));
        assert!(health.should_route(Instant::now()).await);
    }

    #[tokio::test]
    async fn test_trial_pass_after_retry_after() {
        let health = health(ProxyMode::Configured);
        for _ in 0..3 {
            health.record(&proxy_failure()).await;
        }

        let now = Instant::now();
        assert!(!health.should_route(now + Duration::from_secs(30)).await);
        assert!(health.should_route(now + Duration::from_secs(61)).await);
        // 同一窗口内只放行一轮
        assert!(!health.should_route(now + Duration::from_secs(62)).await);
        assert!(health.should_route(now + Duration::from_secs(122)).await);
    }

    #[tokio::test]
    async fn test_disabled_and_unusable_never_route() {
        for mode in [ProxyMode::Disabled, ProxyMode::Unusable] {
            let health = health(mode);
            assert!(!health.is_alive().await);
            assert!(!health.should_route(Instant::now() + Duration::from_secs(3600)).await);
        }
    }
}
