//! # 测试替身
//!
//! 记录调用的内存站点存储与通知发送端

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{CheckerError, Result};
use crate::notify::NotificationSink;
use crate::storage::{MonitoredSite, OwnerContact, SiteStore};

/// 存储调用记录
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    /// 提交状态
    Commit { site_id: i32, is_up: bool },
    /// 仅刷新延迟
    Latency { site_id: i32 },
}

/// 内存站点存储
#[derive(Debug, Default)]
pub struct MemorySiteStore {
    sites: DashMap<i32, MonitoredSite>,
    owners: DashMap<i32, OwnerContact>,
    calls: Mutex<Vec<StoreCall>>,
    fail_commits: AtomicBool,
}

impl MemorySiteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用给定站点创建
    #[must_use]
    pub fn with_sites(sites: impl IntoIterator<Item = MonitoredSite>) -> Self {
        let store = Self::new();
        for site in sites {
            store.sites.insert(site.id, site);
        }
        store
    }

    /// 添加站点所有者
    pub fn add_owner(&self, user_id: i32, telegram_id: Option<i64>) {
        self.owners.insert(user_id, OwnerContact { user_id, telegram_id });
    }

    /// 后续状态提交全部失败
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// 当前已提交状态
    #[must_use]
    pub fn committed_status(&self, site_id: i32) -> Option<bool> {
        self.sites.get(&site_id).map(|site| site.is_up)
    }

    /// 调用记录
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// 状态提交记录
    #[must_use]
    pub fn commits(&self) -> Vec<(i32, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Commit { site_id, is_up } => Some((site_id, is_up)),
                StoreCall::Latency { .. } => None,
            })
            .collect()
    }

    fn record(&self, call: StoreCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl SiteStore for MemorySiteStore {
    async fn list_monitored_sites(&self) -> Result<Vec<MonitoredSite>> {
        let mut sites: Vec<_> = self.sites.iter().map(|entry| entry.value().clone()).collect();
        sites.sort_by_key(|site| site.id);
        Ok(sites)
    }

    async fn commit_status(&self, site_id: i32, is_up: bool, latency_seconds: f64) -> Result<()> {
        self.record(StoreCall::Commit { site_id, is_up });
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(CheckerError::database("injected commit failure"));
        }
        let mut site = self
            .sites
            .get_mut(&site_id)
            .ok_or_else(|| crate::database_error!("站点 {} 不存在", site_id))?;
        site.is_up = is_up;
        site.last_latency = latency_seconds;
        Ok(())
    }

    async fn update_latency_only(&self, site_id: i32, latency_seconds: f64) -> Result<()> {
        self.record(StoreCall::Latency { site_id });
        if let Some(mut site) = self.sites.get_mut(&site_id) {
            site.last_latency = latency_seconds;
        }
        Ok(())
    }

    async fn lookup_owner(&self, owner_id: i32) -> Result<Option<OwnerContact>> {
        Ok(self.owners.get(&owner_id).map(|owner| *owner))
    }
}

/// 记录发送内容的通知端
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(i64, String)>>,
    fail: AtomicBool,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// 后续发送全部失败
    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// 已发送的消息
    #[must_use]
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, contact_id: i64, text: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CheckerError::notification("injected send failure"));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((contact_id, text.to_string()));
        }
        Ok(())
    }
}
