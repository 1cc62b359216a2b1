//! # 测试数据 Fixtures

use std::sync::Arc;
use std::time::Duration;

use crate::checker::{CheckResult, CheckTask, ProxyFault};
use crate::storage::MonitoredSite;

/// 站点测试数据构建器
#[derive(Debug, Clone)]
pub struct SiteFixture {
    site: MonitoredSite,
}

impl SiteFixture {
    /// 创建已提交为在线的站点
    #[must_use]
    pub fn new(id: i32) -> Self {
        Self {
            site: MonitoredSite {
                id,
                name: format!("site-{id}"),
                url: format!("site-{id}.example"),
                owner_id: None,
                is_up: true,
                last_latency: 0.0,
            },
        }
    }

    /// 设置站点名
    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.site.name = name.to_string();
        self
    }

    /// 设置站点地址
    #[must_use]
    pub fn url(mut self, url: &str) -> Self {
        self.site.url = url.to_string();
        self
    }

    /// 设置所有者
    #[must_use]
    pub fn owner(mut self, owner_id: i32) -> Self {
        self.site.owner_id = Some(owner_id);
        self
    }

    /// 设置为已下线
    #[must_use]
    pub fn down(mut self) -> Self {
        self.site.is_up = false;
        self
    }

    #[must_use]
    pub fn build(self) -> MonitoredSite {
        self.site
    }

    /// 构建检查任务
    #[must_use]
    pub fn task(self, use_proxy: bool) -> CheckTask {
        CheckTask::new(Arc::new(self.site), use_proxy)
    }

    /// 构建一次直连探测结果
    #[must_use]
    pub fn result(self, is_up: bool) -> CheckResult {
        let was_up = self.site.is_up;
        CheckResult {
            site: Arc::new(self.site),
            was_up,
            is_up,
            latency: Duration::from_millis(120),
            status_code: is_up.then_some(200),
            error: (!is_up).then(|| "connection refused".to_string()),
            used_proxy: false,
            proxy_fault: ProxyFault::None,
        }
    }

    /// 构建一次经代理的探测结果
    #[must_use]
    pub fn proxied_result(self, is_up: bool, proxy_unreachable: bool) -> CheckResult {
        let proxy_fault = if !is_up && proxy_unreachable {
            ProxyFault::Unreachable
        } else {
            ProxyFault::None
        };
        CheckResult {
            used_proxy: true,
            proxy_fault,
            ..self.result(is_up)
        }
    }

    /// 构建一次代理拒绝建立隧道的探测结果
    #[must_use]
    pub fn tunnel_failure(self) -> CheckResult {
        CheckResult {
            used_proxy: true,
            proxy_fault: ProxyFault::Tunnel,
            error: Some("tunnel error: unsuccessful".to_string()),
            ..self.result(false)
        }
    }
}
