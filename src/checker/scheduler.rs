//! # 检查调度器

use async_channel::{Sender, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use super::proxy_health::ProxyHealth;
use super::types::{CheckTask, PassSummary};
use crate::config::CheckerConfig;
use crate::error::{Context, Result};
use crate::logging::{LogComponent, LogStage};
use crate::storage::SiteStore;

/// 按固定间隔读取站点列表并填充任务队列
pub struct Scheduler {
    store: Arc<dyn SiteStore>,
    proxy_health: Arc<ProxyHealth>,
    tasks: Sender<CheckTask>,
    interval: Duration,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        store: Arc<dyn SiteStore>,
        proxy_health: Arc<ProxyHealth>,
        tasks: Sender<CheckTask>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            proxy_health,
            tasks,
            interval,
        }
    }

    /// 运行直到收到停止信号
    ///
    /// 启动时立即调度一轮。进行中的一轮总会完成，退出时关闭任务队列。
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        crate::linfo!(
            LogStage::Scheduling,
            LogComponent::Scheduler,
            "scheduler_start",
            "调度器启动",
            interval_secs = self.interval.as_secs()
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_pass().await {
                        crate::lerror!(
                            LogStage::Scheduling,
                            LogComponent::Scheduler,
                            "pass_failed",
                            "本轮调度失败",
                            error = %e
                        );
                    }
                }
            }
        }

        self.tasks.close();
        crate::linfo!(
            LogStage::Shutdown,
            LogComponent::Scheduler,
            "scheduler_stop",
            "调度器停止，任务队列已关闭"
        );
    }

    /// 执行一轮调度，队列已满的站点本轮跳过
    pub async fn run_pass(&self) -> Result<PassSummary> {
        let sites = self
            .store
            .list_monitored_sites()
            .await
            .context("读取站点列表失败")?;

        // 每轮只判断一次是否经代理
        let use_proxy = self.proxy_health.should_route(Instant::now()).await;
        let mut summary = PassSummary {
            sites: sites.len(),
            use_proxy,
            ..PassSummary::default()
        };

        for site in sites {
            let site_id = site.id;
            match self.tasks.try_send(CheckTask::new(Arc::new(site), use_proxy)) {
                Ok(()) => summary.enqueued += 1,
                Err(TrySendError::Full(_)) => {
                    summary.dropped += 1;
                    crate::lwarn!(
                        LogStage::Scheduling,
                        LogComponent::Scheduler,
                        "task_dropped",
                        "任务队列已满，本轮跳过该站点",
                        site_id = site_id
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    summary.dropped += 1;
                }
            }
        }

        crate::ldebug!(
            LogStage::Scheduling,
            LogComponent::Scheduler,
            "pass_complete",
            "本轮调度完成",
            sites = summary.sites,
            enqueued = summary.enqueued,
            dropped = summary.dropped,
            use_proxy = summary.use_proxy
        );
        Ok(summary)
    }
}

/// 启动时检查站点数量是否超出每个周期的探测能力，只记录警告
pub fn check_capacity(config: &CheckerConfig, site_count: usize) -> bool {
    let capacity = config.estimated_capacity();
    if site_count > capacity {
        crate::lwarn!(
            LogStage::Startup,
            LogComponent::Scheduler,
            "capacity_check",
            "站点数量超过每个检查周期的估算探测能力，请增加工作者或延长间隔",
            sites = site_count,
            capacity = capacity,
            workers = config.workers
        );
        return false;
    }
    true
}
