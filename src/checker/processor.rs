//! # 结果处理器
//!
//! 唯一决定站点已提交状态何时变化的组件，同时维护代理健康状态。
//! 单消费者运行，计数器的更新彼此串行。

use async_channel::Receiver;
use std::sync::Arc;

use super::hysteresis::FailureCounter;
use super::proxy_health::ProxyHealth;
use super::types::{CheckResult, StatusVerdict};
use crate::logging::{LogComponent, LogStage};
use crate::notify::Notifier;
use crate::storage::SiteStore;

/// 结果处理器
pub struct ResultProcessor {
    store: Arc<dyn SiteStore>,
    counter: Arc<FailureCounter>,
    proxy_health: Arc<ProxyHealth>,
    notifier: Option<Arc<Notifier>>,
}

impl ResultProcessor {
    #[must_use]
    pub fn new(
        store: Arc<dyn SiteStore>,
        counter: Arc<FailureCounter>,
        proxy_health: Arc<ProxyHealth>,
        notifier: Option<Arc<Notifier>>,
    ) -> Self {
        Self {
            store,
            counter,
            proxy_health,
            notifier,
        }
    }

    /// 处理结果直到结果队列关闭且取空
    pub async fn run(self, results: Receiver<CheckResult>) {
        let mut processed = 0usize;
        while let Ok(result) = results.recv().await {
            self.process(&result).await;
            processed += 1;
        }

        crate::ldebug!(
            LogStage::Processing,
            LogComponent::ResultProcessor,
            "processor_exit",
            "结果队列已关闭，结果处理器退出",
            processed = processed
        );
    }

    /// 处理一个结果，返回滞回判定
    pub async fn process(&self, result: &CheckResult) -> StatusVerdict {
        if let Some(transition) = self.proxy_health.record(result).await {
            crate::ldebug!(
                LogStage::ProxyHealth,
                LogComponent::ResultProcessor,
                "proxy_transition",
                "代理状态翻转",
                transition = ?transition
            );
        }

        let site_id = result.site_id();
        if result.is_proxy_failure() {
            crate::ldebug!(
                LogStage::Processing,
                LogComponent::ResultProcessor,
                "skip_proxy_failure",
                "代理引起的失败不计入站点状态",
                site_id = site_id
            );
            return StatusVerdict::Skip;
        }

        let verdict = self.counter.evaluate(site_id, result.was_up, result.is_up);
        match verdict {
            StatusVerdict::Commit { is_up } => self.commit(result, is_up).await,
            StatusVerdict::RefreshLatency => {
                if let Err(e) = self
                    .store
                    .update_latency_only(site_id, result.latency_seconds())
                    .await
                {
                    crate::lwarn!(
                        LogStage::Processing,
                        LogComponent::ResultProcessor,
                        "update_latency_failed",
                        "刷新站点延迟失败",
                        site_id = site_id,
                        error = %e
                    );
                }
                if !result.is_up && result.was_up {
                    crate::ldebug!(
                        LogStage::Processing,
                        LogComponent::ResultProcessor,
                        "failure_counted",
                        "站点探测失败，尚未达到下线阈值",
                        site_id = site_id,
                        failures = self.counter.failures(site_id),
                        threshold = self.counter.down_threshold()
                    );
                }
            }
            StatusVerdict::Skip => {}
        }
        verdict
    }

    async fn commit(&self, result: &CheckResult, is_up: bool) {
        let site_id = result.site_id();
        match self
            .store
            .commit_status(site_id, is_up, result.latency_seconds())
            .await
        {
            Ok(()) => {
                crate::linfo!(
                    LogStage::Processing,
                    LogComponent::ResultProcessor,
                    "status_committed",
                    &format!(
                        "站点 {} 状态变为{}",
                        result.site.name,
                        if is_up { "在线" } else { "下线" }
                    ),
                    site_id = site_id,
                    is_up = is_up,
                    error = ?result.error
                );
                if let Some(notifier) = &self.notifier {
                    // 发送任务独立运行，不等待
                    let _ = notifier.on_status_committed(&result.site, is_up);
                }
            }
            Err(e) => {
                if !is_up {
                    self.counter.restore_after_failed_commit(site_id);
                }
                crate::lerror!(
                    LogStage::Processing,
                    LogComponent::ResultProcessor,
                    "commit_failed",
                    "提交站点状态失败",
                    site_id = site_id,
                    is_up = is_up,
                    error = %e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerConfig;
    use crate::checker::proxy_health::ProxyMode;
    use crate::storage::MockSiteStore;
    use crate::testing::{MemorySiteStore, RecordingSink, SiteFixture, StoreCall};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, Instant};

    struct Harness {
        processor: ResultProcessor,
        store: Arc<MemorySiteStore>,
        sink: Arc<RecordingSink>,
        proxy_health: Arc<ProxyHealth>,
        counter: Arc<FailureCounter>,
    }

    fn harness(sites: Vec<crate::storage::MonitoredSite>) -> Harness {
        crate::testing::init_test_logging();
        let config = CheckerConfig {
            proxy_failure_threshold: 2,
            ..Default::default()
        };
        let store = Arc::new(MemorySiteStore::with_sites(sites.clone()));
        store.add_owner(1, Some(100));
        let sink = Arc::new(RecordingSink::new());
        let notifier = Arc::new(Notifier::new(
            sink.clone(),
            store.clone(),
            Duration::from_secs(30),
        ));
        notifier.seed(&sites);
        let counter = Arc::new(FailureCounter::new(config.down_threshold));
        let proxy_health = Arc::new(ProxyHealth::new(ProxyMode::Configured, &config));

        Harness {
            processor: ResultProcessor::new(
                store.clone(),
                Arc::clone(&counter),
                Arc::clone(&proxy_health),
                Some(notifier),
            ),
            store,
            sink,
            proxy_health,
            counter,
        }
    }

    async fn wait_for_sends(sink: &RecordingSink, expected: usize) {
        for _ in 0..50 {
            if sink.sent().len() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_two_failures_stay_up_third_commits_down() {
        let site = SiteFixture::new(1).owner(1);
        let h = harness(vec![site.clone().build()]);

        for _ in 0..2 {
            assert_eq!(
                h.processor.process(&site.clone().result(false)).await,
                StatusVerdict::RefreshLatency
            );
        }
        assert_eq!(h.store.committed_status(1), Some(true));
        assert!(h.store.commits().is_empty());

        assert_eq!(
            h.processor.process(&site.clone().result(false)).await,
            StatusVerdict::Commit { is_up: false }
        );
        assert_eq!(h.store.committed_status(1), Some(false));
        assert_eq!(h.store.commits(), vec![(1, false)]);
        assert_eq!(h.counter.failures(1), 0);

        wait_for_sends(&h.sink, 1).await;
        assert_eq!(h.sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_recovery_commits_and_notifies() {
        let site = SiteFixture::new(1).owner(1).down();
        let h = harness(vec![site.clone().build()]);

        assert_eq!(
            h.processor.process(&site.result(true)).await,
            StatusVerdict::Commit { is_up: true }
        );
        assert_eq!(h.store.committed_status(1), Some(true));

        wait_for_sends(&h.sink, 1).await;
        let sent = h.sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.starts_with("*Site Status: Online*"));
    }

    #[tokio::test]
    async fn test_steady_state_only_refreshes_latency() {
        let up = SiteFixture::new(1);
        let down = SiteFixture::new(2).down();
        let h = harness(vec![up.clone().build(), down.clone().build()]);

        for _ in 0..4 {
            h.processor.process(&up.clone().result(true)).await;
            h.processor.process(&down.clone().result(false)).await;
        }

        assert!(h.store.commits().is_empty());
        assert_eq!(h.store.calls().len(), 8);
        assert!(
            h.store
                .calls()
                .iter()
                .all(|call| matches!(call, StoreCall::Latency { .. }))
        );
    }

    #[tokio::test]
    async fn test_proxy_failures_skip_hysteresis_and_flip_proxy() {
        let site = SiteFixture::new(1);
        let h = harness(vec![site.clone().build()]);

        for _ in 0..2 {
            assert_eq!(
                h.processor.process(&site.clone().proxied_result(false, true)).await,
                StatusVerdict::Skip
            );
        }

        assert_eq!(h.counter.failures(1), 0);
        assert!(h.store.calls().is_empty());
        assert!(!h.proxy_health.is_alive().await);
        assert!(!h.proxy_health.should_route(Instant::now()).await);
    }

    #[tokio::test]
    async fn test_rejected_tunnels_skip_hysteresis_and_keep_proxy() {
        let sites: Vec<_> = (1..=5).map(SiteFixture::new).collect();
        let h = harness(sites.iter().map(|site| site.clone().build()).collect());

        for site in &sites {
            assert_eq!(
                h.processor.process(&site.clone().tunnel_failure()).await,
                StatusVerdict::Skip
            );
        }

        assert!(h.store.calls().is_empty());
        assert!(h.proxy_health.is_alive().await);
        assert!(h.proxy_health.should_route(Instant::now()).await);
    }

    #[tokio::test]
    async fn test_failed_down_commit_keeps_counter_armed() {
        let site = SiteFixture::new(1).owner(1);
        let h = harness(vec![site.clone().build()]);
        h.store.fail_commits(true);

        for _ in 0..3 {
            h.processor.process(&site.clone().result(false)).await;
        }
        assert_eq!(h.store.committed_status(1), Some(true));
        assert_eq!(h.counter.failures(1), 2);

        h.store.fail_commits(false);
        assert_eq!(
            h.processor.process(&site.clone().result(false)).await,
            StatusVerdict::Commit { is_up: false }
        );
        assert_eq!(h.store.committed_status(1), Some(false));

        // 失败的提交不触发通知，只有成功的那次
        wait_for_sends(&h.sink, 1).await;
        assert_eq!(h.sink.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_error_does_not_notify() {
        let mut store = MockSiteStore::new();
        store
            .expect_commit_status()
            .with(eq(1), eq(true), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _| Err(crate::database_error!("connection lost")));
        store.expect_lookup_owner().never();

        let store: Arc<dyn SiteStore> = Arc::new(store);
        let sink = Arc::new(RecordingSink::new());
        let notifier = Arc::new(Notifier::new(sink.clone(), Arc::clone(&store), Duration::from_secs(30)));
        let config = CheckerConfig::default();
        let processor = ResultProcessor::new(
            store,
            Arc::new(FailureCounter::new(3)),
            Arc::new(ProxyHealth::new(ProxyMode::Disabled, &config)),
            Some(notifier),
        );

        let result = SiteFixture::new(1).owner(1).down().result(true);
        assert_eq!(processor.process(&result).await, StatusVerdict::Commit { is_up: true });
        tokio::task::yield_now().await;
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_queue() {
        let site = SiteFixture::new(1);
        let h = harness(vec![site.clone().build()]);
        let (tx, rx) = async_channel::bounded(8);
        for _ in 0..3 {
            tx.try_send(site.clone().result(false)).unwrap();
        }
        drop(tx);

        h.processor.run(rx).await;
        assert_eq!(h.store.committed_status(1), Some(false));
    }
}
