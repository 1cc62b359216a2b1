//! # 检查服务
//!
//! 组装调度器、工作者池和结果处理器，管理其生命周期。

use async_channel::{Receiver, Sender};
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::failure_log::FailureLog;
use super::hysteresis::FailureCounter;
use super::probe::{Prober, parse_proxy};
use super::processor::ResultProcessor;
use super::proxy_health::{ProxyHealth, ProxyMode};
use super::scheduler::{Scheduler, check_capacity};
use super::types::{CheckResult, CheckTask, PassSummary};
use super::worker::Worker;
use crate::config::CheckerConfig;
use crate::error::{CheckerError, Context, Result};
use crate::logging::{LogComponent, LogStage};
use crate::notify::{NotificationSink, Notifier};
use crate::storage::SiteStore;

struct RunningTasks {
    shutdown: CancellationToken,
    scheduler: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    processor: JoinHandle<()>,
}

/// 站点可用性检查服务
pub struct CheckerService {
    config: CheckerConfig,
    store: Arc<dyn SiteStore>,
    proxy_health: Arc<ProxyHealth>,
    counter: Arc<FailureCounter>,
    notifier: Option<Arc<Notifier>>,
    failure_log: Option<Arc<FailureLog>>,
    running: Option<RunningTasks>,
    seeded: bool,
}

impl CheckerService {
    /// 创建服务，`sink` 为空时不发送通知
    pub fn new(
        config: CheckerConfig,
        store: Arc<dyn SiteStore>,
        sink: Option<Arc<dyn NotificationSink>>,
    ) -> Result<Self> {
        config.validate()?;

        let mode = match config.proxy() {
            None => ProxyMode::Disabled,
            Some(proxy) if parse_proxy(proxy).is_none() => {
                crate::lwarn!(
                    LogStage::Startup,
                    LogComponent::Service,
                    "proxy_invalid",
                    "代理地址无效，视为不可用，所有请求直连",
                    proxy = proxy
                );
                ProxyMode::Unusable
            }
            Some(_) => ProxyMode::Configured,
        };

        let notifier = sink.map(|sink| {
            Arc::new(Notifier::new(
                sink,
                Arc::clone(&store),
                config.notify_quiet_period,
            ))
        });
        if notifier.is_none() {
            crate::linfo!(
                LogStage::Startup,
                LogComponent::Service,
                "notifications_disabled",
                "未配置通知发送端，状态变化不会通知站点所有者"
            );
        }

        Ok(Self {
            proxy_health: Arc::new(ProxyHealth::new(mode, &config)),
            counter: Arc::new(FailureCounter::new(config.down_threshold)),
            failure_log: config
                .error_log_path
                .as_ref()
                .map(|path| Arc::new(FailureLog::new(path.clone()))),
            config,
            store,
            notifier,
            running: None,
            seeded: false,
        })
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    #[must_use]
    pub fn proxy_health(&self) -> &Arc<ProxyHealth> {
        &self.proxy_health
    }

    #[must_use]
    pub fn failure_counter(&self) -> &Arc<FailureCounter> {
        &self.counter
    }

    /// 启动后台检查
    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(CheckerError::internal("检查服务已在运行"));
        }

        self.prepare().await?;

        let (task_tx, task_rx) = async_channel::bounded(self.config.task_queue_capacity);
        let (result_tx, result_rx) = async_channel::bounded(self.config.result_queue_capacity);
        let workers = self.spawn_workers(&task_rx, &result_tx)?;
        drop(result_tx);
        let processor = tokio::spawn(self.processor().run(result_rx));

        let shutdown = CancellationToken::new();
        let scheduler = Scheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.proxy_health),
            task_tx,
            self.config.effective_interval(),
        );
        let scheduler = tokio::spawn(scheduler.run(shutdown.clone()));

        self.running = Some(RunningTasks {
            shutdown,
            scheduler,
            workers,
            processor,
        });

        crate::linfo!(
            LogStage::Startup,
            LogComponent::Service,
            "service_started",
            "检查服务已启动",
            workers = self.config.workers,
            interval_secs = self.config.effective_interval().as_secs(),
            debug = self.config.debug
        );
        Ok(())
    }

    /// 停止：等待进行中的一轮调度完成，再等待工作者和结果处理器取空队列
    pub async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        running.shutdown.cancel();
        running
            .scheduler
            .await
            .map_err(|e| CheckerError::internal_with_source("调度器任务异常退出", e))?;
        drain(running.workers, running.processor).await?;

        crate::linfo!(
            LogStage::Shutdown,
            LogComponent::Service,
            "service_stopped",
            "检查服务已停止"
        );
        Ok(())
    }

    /// 执行一轮完整检查并等待全部结果处理完毕
    pub async fn run_once(&mut self) -> Result<PassSummary> {
        if self.running.is_some() {
            return Err(CheckerError::internal("检查服务运行中，不能单独执行一轮"));
        }

        self.prepare().await?;

        let (task_tx, task_rx) = async_channel::bounded(self.config.task_queue_capacity);
        let (result_tx, result_rx) = async_channel::bounded(self.config.result_queue_capacity);
        let workers = self.spawn_workers(&task_rx, &result_tx)?;
        drop(result_tx);
        drop(task_rx);
        let processor = tokio::spawn(self.processor().run(result_rx));

        let scheduler = Scheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.proxy_health),
            task_tx.clone(),
            self.config.effective_interval(),
        );
        let summary = scheduler.run_pass().await;
        task_tx.close();
        drain(workers, processor).await?;

        summary
    }

    /// 首次运行前用已提交状态初始化通知状态并检查容量
    async fn prepare(&mut self) -> Result<()> {
        if self.seeded {
            return Ok(());
        }

        let sites = self
            .store
            .list_monitored_sites()
            .await
            .context("初始化时读取站点列表失败")?;
        if let Some(notifier) = &self.notifier {
            notifier.seed(&sites);
        }
        check_capacity(&self.config, sites.len());
        self.seeded = true;

        crate::linfo!(
            LogStage::Startup,
            LogComponent::Service,
            "seeded",
            "已加载站点已提交状态",
            sites = sites.len()
        );
        Ok(())
    }

    fn processor(&self) -> ResultProcessor {
        ResultProcessor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.counter),
            Arc::clone(&self.proxy_health),
            self.notifier.clone(),
        )
    }

    fn spawn_workers(
        &self,
        tasks: &Receiver<CheckTask>,
        results: &Sender<CheckResult>,
    ) -> Result<Vec<JoinHandle<()>>> {
        (0..self.config.workers)
            .map(|id| {
                let prober = Prober::new(&self.config)?;
                let worker = Worker::new(
                    id,
                    prober,
                    tasks.clone(),
                    results.clone(),
                    self.failure_log.clone(),
                );
                Ok(tokio::spawn(worker.run()))
            })
            .collect()
    }
}

async fn drain(workers: Vec<JoinHandle<()>>, processor: JoinHandle<()>) -> Result<()> {
    for joined in join_all(workers).await {
        joined.map_err(|e| CheckerError::internal_with_source("工作者任务异常退出", e))?;
    }
    processor
        .await
        .map_err(|e| CheckerError::internal_with_source("结果处理器任务异常退出", e))?;
    Ok(())
}
