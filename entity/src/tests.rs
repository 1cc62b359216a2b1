//! # 实体定义测试
//!
//! 测试 Sea-ORM 实体定义的正确性

#[cfg(test)]
mod tests {
    use crate::{sites, users};
    use sea_orm::{ColumnTrait, DbBackend, EntityTrait, QueryFilter, QueryTrait, Set};

    #[tokio::test]
    async fn test_site_creation() {
        let site = sites::ActiveModel {
            slug: Set("example".to_string()),
            name: Set("Example".to_string()),
            url: Set("example.com".to_string()),
            is_up: Set(true),
            last_check: Set(0.0),
            user_id: Set(Some(7)),
            ..Default::default()
        };

        assert_eq!(site.slug.as_ref(), "example");
        assert_eq!(site.is_up.as_ref(), &true);
        assert_eq!(site.user_id.as_ref(), &Some(7));
    }

    #[tokio::test]
    async fn test_user_creation() {
        let user = users::ActiveModel {
            telegram_id: Set(Some(123_456)),
            telegram_username: Set(Some("owner".to_string())),
            is_admin: Set(false),
            ..Default::default()
        };

        assert_eq!(user.telegram_id.as_ref(), &Some(123_456));
        assert_eq!(user.is_admin.as_ref(), &false);
    }

    #[test]
    fn test_sites_query_targets_sites_table() {
        let sql = sites::Entity::find()
            .filter(sites::Column::IsUp.eq(false))
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.contains(r#"FROM "sites""#));
        assert!(sql.contains(r#""is_up""#));
    }
}
