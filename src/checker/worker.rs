//! # 探测工作者

use async_channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;

use super::failure_log::FailureLog;
use super::probe::{Prober, normalize_url};
use super::types::{CheckResult, CheckTask};
use crate::logging::{LogComponent, LogStage};

/// 从任务队列取任务、探测并把结果写入结果队列
#[derive(Debug)]
pub struct Worker {
    id: usize,
    prober: Prober,
    tasks: Receiver<CheckTask>,
    results: Sender<CheckResult>,
    failure_log: Option<Arc<FailureLog>>,
}

impl Worker {
    #[must_use]
    pub const fn new(
        id: usize,
        prober: Prober,
        tasks: Receiver<CheckTask>,
        results: Sender<CheckResult>,
        failure_log: Option<Arc<FailureLog>>,
    ) -> Self {
        Self {
            id,
            prober,
            tasks,
            results,
            failure_log,
        }
    }

    /// 运行直到任务队列关闭且取空
    pub async fn run(self) {
        crate::ldebug!(
            LogStage::Probe,
            LogComponent::Worker,
            "worker_start",
            "工作者启动",
            worker_id = self.id
        );

        while let Ok(task) = self.tasks.recv().await {
            self.handle(&task).await;
        }

        crate::ldebug!(
            LogStage::Probe,
            LogComponent::Worker,
            "worker_exit",
            "任务队列已关闭，工作者退出",
            worker_id = self.id
        );
    }

    /// 处理一个任务，返回产生的结果数
    pub async fn handle(&self, task: &CheckTask) -> usize {
        let use_proxy = task.use_proxy && self.prober.has_proxy();
        let first = self.probe(task, use_proxy).await;
        let retry_direct = first.is_proxy_failure();
        self.emit(first);

        if !retry_direct {
            return 1;
        }

        // 代理引起的失败立即直连重试一次，重试有独立的超时
        crate::ldebug!(
            LogStage::Probe,
            LogComponent::Worker,
            "retry_direct",
            "代理失败，改为直连重试",
            worker_id = self.id,
            site_id = task.site.id
        );
        let retry = self.probe(task, false).await;
        self.emit(retry);
        2
    }

    async fn probe(&self, task: &CheckTask, use_proxy: bool) -> CheckResult {
        let outcome = self.prober.probe(&task.site.url, use_proxy).await;
        let result = outcome.into_result(task);

        if let Some(error) = result.error.as_deref() {
            crate::ldebug!(
                LogStage::Probe,
                LogComponent::Prober,
                "probe_failed",
                &format!("{} failed to respond: {error}", task.site.url),
                site_id = result.site_id(),
                used_proxy = result.used_proxy,
                proxy_fault = ?result.proxy_fault,
                latency_ms = result.latency.as_millis()
            );
            if let Some(log) = &self.failure_log {
                log.record(&normalize_url(&task.site.url), error).await;
            }
        }

        result
    }

    fn emit(&self, result: CheckResult) {
        let site_id = result.site_id();
        match self.results.try_send(result) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                crate::lwarn!(
                    LogStage::Probe,
                    LogComponent::Worker,
                    "result_dropped",
                    "结果队列已满，丢弃本次结果",
                    worker_id = self.id,
                    site_id = site_id
                );
            }
            Err(TrySendError::Closed(_)) => {
                crate::ldebug!(
                    LogStage::Probe,
                    LogComponent::Worker,
                    "result_dropped",
                    "结果队列已关闭",
                    worker_id = self.id,
                    site_id = site_id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerConfig;
    use crate::testing::SiteFixture;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dead_address() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    fn worker(
        config: &CheckerConfig,
        result_capacity: usize,
        failure_log: Option<Arc<FailureLog>>,
    ) -> (Worker, Sender<CheckTask>, Receiver<CheckResult>) {
        crate::testing::init_test_logging();
        let (task_tx, task_rx) = async_channel::bounded(8);
        let (result_tx, result_rx) = async_channel::bounded(result_capacity);
        let prober = Prober::new(config).unwrap();
        (
            Worker::new(0, prober, task_rx, result_tx, failure_log),
            task_tx,
            result_rx,
        )
    }

    #[tokio::test]
    async fn test_proxy_failure_retries_direct() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = CheckerConfig {
            proxy_url: Some(dead_address()),
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let (worker, _tasks, results) = worker(&config, 8, None);

        let task = SiteFixture::new(1).url(&server.uri()).task(true);
        assert_eq!(worker.handle(&task).await, 2);

        let first = results.try_recv().unwrap();
        assert!(first.used_proxy);
        assert!(first.is_proxy_failure());

        let second = results.try_recv().unwrap();
        assert!(!second.used_proxy);
        assert!(second.is_up);
        assert_eq!(second.site_id(), 1);
    }

    #[tokio::test]
    async fn test_site_failure_produces_single_result_and_log_line() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(FailureLog::new(dir.path().join("failures.log")));
        let config = CheckerConfig {
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let (worker, _tasks, results) = worker(&config, 8, Some(Arc::clone(&log)));

        let url = dead_address();
        let task = SiteFixture::new(2).url(&url).task(false);
        assert_eq!(worker.handle(&task).await, 1);

        let result = results.try_recv().unwrap();
        assert!(!result.is_up);
        assert!(!result.is_proxy_failure());
        assert!(results.try_recv().is_err());

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.starts_with(&format!("{url} failed to respond: ")));
    }

    #[tokio::test]
    async fn test_full_result_queue_drops_without_blocking() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (worker, _tasks, results) = worker(&CheckerConfig::default(), 1, None);
        let task = SiteFixture::new(3).url(&server.uri()).task(false);

        worker.handle(&task).await;
        worker.handle(&task).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_run_exits_when_task_queue_closes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (worker, tasks, results) = worker(&CheckerConfig::default(), 8, None);
        tasks
            .try_send(SiteFixture::new(4).url(&server.uri()).task(false))
            .unwrap();
        tasks.close();

        worker.run().await;
        assert_eq!(results.len(), 1);
    }
}
