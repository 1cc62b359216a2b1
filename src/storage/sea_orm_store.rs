//! # Sea-ORM 站点存储实现

use async_trait::async_trait;
use entity::{Sites, Users, sites, users};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;

use super::{MonitoredSite, OwnerContact, SiteStore};
use crate::error::{Context, Result};

/// 基于 Sea-ORM 的站点存储
#[derive(Debug, Clone)]
pub struct SeaOrmSiteStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmSiteStore {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// 更新单个站点，站点不存在时返回数据库错误
    async fn update_site(
        &self,
        site_id: i32,
        is_up: Option<bool>,
        latency_seconds: f64,
    ) -> Result<()> {
        let mut update = Sites::update_many()
            .col_expr(sites::Column::LastCheck, Expr::value(latency_seconds))
            .filter(sites::Column::Id.eq(site_id));
        if let Some(is_up) = is_up {
            update = update.col_expr(sites::Column::IsUp, Expr::value(is_up));
        }

        let result = update
            .exec(self.db.as_ref())
            .await
            .with_context(|| format!("更新站点 {site_id} 失败"))?;

        if result.rows_affected == 0 {
            return Err(crate::database_error!("站点 {} 不存在", site_id));
        }
        Ok(())
    }
}

#[async_trait]
impl SiteStore for SeaOrmSiteStore {
    async fn list_monitored_sites(&self) -> Result<Vec<MonitoredSite>> {
        let rows = Sites::find()
            .order_by_asc(sites::Column::Id)
            .all(self.db.as_ref())
            .await
            .context("查询站点列表失败")?;

        Ok(rows.into_iter().map(MonitoredSite::from).collect())
    }

    async fn commit_status(&self, site_id: i32, is_up: bool, latency_seconds: f64) -> Result<()> {
        self.update_site(site_id, Some(is_up), latency_seconds).await
    }

    async fn update_latency_only(&self, site_id: i32, latency_seconds: f64) -> Result<()> {
        self.update_site(site_id, None, latency_seconds).await
    }

    async fn lookup_owner(&self, owner_id: i32) -> Result<Option<OwnerContact>> {
        let user = Users::find()
            .filter(users::Column::Id.eq(owner_id))
            .one(self.db.as_ref())
            .await
            .with_context(|| format!("查询用户 {owner_id} 失败"))?;

        Ok(user.map(|user| OwnerContact {
            user_id: user.id,
            telegram_id: user.telegram_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{insert_site, insert_user, sqlite_memory_db};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_list_monitored_sites() {
        let db = sqlite_memory_db().await;
        let owner = insert_user(&db, Some(42)).await;
        insert_site(&db, "alpha", "alpha.example", true, Some(owner.id)).await;
        insert_site(&db, "beta", "https://beta.example", false, None).await;

        let store = SeaOrmSiteStore::new(Arc::new(db));
        let sites = store.list_monitored_sites().await.unwrap();

        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].name, "alpha");
        assert_eq!(sites[0].owner_id, Some(owner.id));
        assert!(sites[0].is_up);
        assert_eq!(sites[1].url, "https://beta.example");
        assert!(!sites[1].is_up);
    }

    #[tokio::test]
    async fn test_commit_status_and_latency() {
        let db = Arc::new(sqlite_memory_db().await);
        let site = insert_site(&db, "alpha", "alpha.example", true, None).await;
        let store = SeaOrmSiteStore::new(Arc::clone(&db));

        store.commit_status(site.id, false, 1.5).await.unwrap();
        let row = Sites::find_by_id(site.id).one(db.as_ref()).await.unwrap().unwrap();
        assert!(!row.is_up);
        assert!((row.last_check - 1.5).abs() < f64::EPSILON);

        store.update_latency_only(site.id, 0.25).await.unwrap();
        let row = Sites::find_by_id(site.id).one(db.as_ref()).await.unwrap().unwrap();
        assert!(!row.is_up);
        assert!((row.last_check - 0.25).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_commit_unknown_site_is_database_error() {
        let store = SeaOrmSiteStore::new(Arc::new(sqlite_memory_db().await));
        let err = store.commit_status(999, true, 0.1).await.unwrap_err();
        assert!(err.is_database());
    }

    #[tokio::test]
    async fn test_lookup_owner() {
        let db = sqlite_memory_db().await;
        let with_contact = insert_user(&db, Some(1001)).await;
        let without_contact = insert_user(&db, None).await;
        let store = SeaOrmSiteStore::new(Arc::new(db));

        let owner = store.lookup_owner(with_contact.id).await.unwrap().unwrap();
        assert_eq!(owner.telegram_id, Some(1001));

        let owner = store.lookup_owner(without_contact.id).await.unwrap().unwrap();
        assert_eq!(owner.telegram_id, None);

        assert!(store.lookup_owner(12345).await.unwrap().is_none());
    }
}
