//! # 通知分发
//!
//! 只在状态提交成功后调用。发送在独立任务中进行，不阻塞结果处理循环，
//! 失败只记录日志，不重试。

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::{NotificationSink, render_status_message};
use crate::error::Result;
use crate::logging::{LogComponent, LogStage};
use crate::storage::{MonitoredSite, SiteStore};

/// 每个站点最近一次通知的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyState {
    /// 最近一次通知（或启动时已提交）的状态
    pub last_notified_up: bool,
    /// 最近一次通知的时间，启动时为空
    pub notified_at: Option<Instant>,
}

/// 站点所有者通知器
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn SiteStore>,
    states: DashMap<i32, NotifyState>,
    quiet_period: Duration,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("states", &self.states.len())
            .field("quiet_period", &self.quiet_period)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    #[must_use]
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn SiteStore>,
        quiet_period: Duration,
    ) -> Self {
        Self {
            sink,
            store,
            states: DashMap::new(),
            quiet_period,
        }
    }

    /// 用已提交状态初始化，不带通知时间
    pub fn seed(&self, sites: &[MonitoredSite]) {
        for site in sites {
            self.states.insert(
                site.id,
                NotifyState {
                    last_notified_up: site.is_up,
                    notified_at: None,
                },
            );
        }
    }

    #[must_use]
    pub fn state(&self, site_id: i32) -> Option<NotifyState> {
        self.states.get(&site_id).map(|state| *state)
    }

    /// 判断是否发送，决定发送时同时更新状态
    pub fn should_notify(&self, site_id: i32, is_up: bool, now: Instant) -> bool {
        match self.states.entry(site_id) {
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                if state.last_notified_up == is_up {
                    return false;
                }
                let quiet = state
                    .notified_at
                    .is_some_and(|at| now.saturating_duration_since(at) < self.quiet_period);
                if quiet {
                    return false;
                }
                *state = NotifyState {
                    last_notified_up: is_up,
                    notified_at: Some(now),
                };
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(NotifyState {
                    last_notified_up: is_up,
                    notified_at: Some(now),
                });
                true
            }
        }
    }

    /// 状态提交后调用，需要通知时返回后台发送任务
    pub fn on_status_committed(&self, site: &MonitoredSite, is_up: bool) -> Option<JoinHandle<()>> {
        let owner_id = site.owner_id?;

        if !self.should_notify(site.id, is_up, Instant::now()) {
            crate::ldebug!(
                LogStage::Notification,
                LogComponent::Notifier,
                "notify_suppressed",
                "状态未变化或处于静默期，跳过通知",
                site_id = site.id,
                is_up = is_up
            );
            return None;
        }

        let sink = Arc::clone(&self.sink);
        let store = Arc::clone(&self.store);
        let site_id = site.id;
        let site_name = site.name.clone();

        Some(tokio::spawn(async move {
            if let Err(e) = dispatch(sink, store, owner_id, &site_name, is_up).await {
                crate::lwarn!(
                    LogStage::Notification,
                    LogComponent::Notifier,
                    "notify_failed",
                    "发送状态通知失败",
                    site_id = site_id,
                    error = %e
                );
            }
        }))
    }
}

async fn dispatch(
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn SiteStore>,
    owner_id: i32,
    site_name: &str,
    is_up: bool,
) -> Result<()> {
    let Some(contact_id) = store
        .lookup_owner(owner_id)
        .await?
        .and_then(|owner| owner.telegram_id)
    else {
        crate::ldebug!(
            LogStage::Notification,
            LogComponent::Notifier,
            "notify_skipped",
            "站点所有者没有联系方式",
            owner_id = owner_id
        );
        return Ok(());
    };

    let text = render_status_message(site_name, is_up);
    sink.send(contact_id, &text).await?;

    crate::linfo!(
        LogStage::Notification,
        LogComponent::Notifier,
        "notify_sent",
        "已通知站点所有者",
        owner_id = owner_id,
        is_up = is_up
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemorySiteStore, RecordingSink, SiteFixture};

    fn notifier(
        quiet: Duration,
    ) -> (Notifier, Arc<MemorySiteStore>, Arc<RecordingSink>) {
        let store = Arc::new(MemorySiteStore::new());
        let sink = Arc::new(RecordingSink::new());
        let notifier = Notifier::new(sink.clone(), store.clone(), quiet);
        (notifier, store, sink)
    }

    #[test]
    fn test_seeded_state_allows_first_flip() {
        let (notifier, _, _) = notifier(Duration::from_secs(30));
        let site = SiteFixture::new(1).build();
        notifier.seed(std::slice::from_ref(&site));

        let now = Instant::now();
        assert!(!notifier.should_notify(1, true, now));
        assert!(notifier.should_notify(1, false, now));
        assert_eq!(notifier.state(1).unwrap().notified_at, Some(now));
    }

    #[test]
    fn test_quiet_period_suppresses_second_flip() {
        let (notifier, _, _) = notifier(Duration::from_secs(30));
        let now = Instant::now();

        assert!(notifier.should_notify(1, false, now));
        assert!(!notifier.should_notify(1, true, now + Duration::from_secs(10)));
        // 被抑制的通知不改变记录的状态
        assert!(!notifier.state(1).unwrap().last_notified_up);
        assert!(notifier.should_notify(1, true, now + Duration::from_secs(31)));
    }

    #[test]
    fn test_unknown_site_notifies_on_first_commit() {
        let (notifier, _, _) = notifier(Duration::from_secs(30));
        assert!(notifier.should_notify(99, true, Instant::now()));
    }

    #[tokio::test]
    async fn test_dispatch_sends_rendered_message() {
        let (notifier, store, sink) = notifier(Duration::from_secs(30));
        store.add_owner(5, Some(4242));
        let site = SiteFixture::new(1).name("alpha.dev").owner(5).build();
        notifier.seed(std::slice::from_ref(&site));

        let handle = notifier.on_status_committed(&site, false).unwrap();
        handle.await.unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 4242);
        assert!(sent[0].1.contains("alpha\\.dev"));
        assert!(sent[0].1.starts_with("*Site Status: Offline*"));
    }

    #[tokio::test]
    async fn test_no_owner_or_contact_sends_nothing() {
        let (notifier, store, sink) = notifier(Duration::from_secs(30));
        store.add_owner(5, None);

        let without_owner = SiteFixture::new(1).build();
        assert!(notifier.on_status_committed(&without_owner, false).is_none());

        let without_contact = SiteFixture::new(2).owner(5).build();
        notifier.on_status_committed(&without_contact, false).unwrap().await.unwrap();
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_is_swallowed() {
        let (notifier, store, sink) = notifier(Duration::from_secs(30));
        store.add_owner(5, Some(1));
        sink.fail_sends(true);

        let site = SiteFixture::new(1).owner(5).build();
        notifier.on_status_committed(&site, true).unwrap().await.unwrap();
        assert!(sink.sent().is_empty());
    }
}
