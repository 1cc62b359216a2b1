//! # 站点存储
//!
//! 检查器与共享存储之间的窄接口：读取站点列表、提交状态、刷新延迟、查询站点所有者。

mod sea_orm_store;

pub use sea_orm_store::SeaOrmSiteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 被监控的站点快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredSite {
    pub id: i32,
    pub name: String,
    pub url: String,
    /// 站点所有者
    pub owner_id: Option<i32>,
    /// 已提交的在线状态
    pub is_up: bool,
    /// 最近一次探测耗时（秒）
    pub last_latency: f64,
}

impl From<entity::sites::Model> for MonitoredSite {
    fn from(model: entity::sites::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            url: model.url,
            owner_id: model.user_id,
            is_up: model.is_up,
            last_latency: model.last_check,
        }
    }
}

/// 站点所有者的联系方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContact {
    pub user_id: i32,
    /// Telegram chat ID
    pub telegram_id: Option<i64>,
}

/// 站点存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// 列出所有被监控的站点及其已提交状态
    async fn list_monitored_sites(&self) -> Result<Vec<MonitoredSite>>;

    /// 提交状态变化，同时写入延迟
    async fn commit_status(&self, site_id: i32, is_up: bool, latency_seconds: f64) -> Result<()>;

    /// 仅刷新延迟
    async fn update_latency_only(&self, site_id: i32, latency_seconds: f64) -> Result<()>;

    /// 查询站点所有者，用户不存在时返回 `None`
    async fn lookup_owner(&self, owner_id: i32) -> Result<Option<OwnerContact>>;
}
