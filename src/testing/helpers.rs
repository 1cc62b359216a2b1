//! # 测试辅助函数

use chrono::Utc;
use entity::{sites, users};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::sync::Once;

static INIT: Once = Once::new();

/// 初始化测试日志
pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("webring_checker=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 创建已建表的内存 SQLite 数据库
///
/// 内存数据库随连接销毁，连接池只保留一个连接。
pub async fn sqlite_memory_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .expect("failed to open in-memory sqlite");
    crate::database::ensure_schema(&db)
        .await
        .expect("failed to create tables");
    db
}

/// 插入一个用户
pub async fn insert_user(db: &DatabaseConnection, telegram_id: Option<i64>) -> users::Model {
    users::ActiveModel {
        telegram_id: Set(telegram_id),
        telegram_username: Set(None),
        first_name: Set(Some("Test".to_string())),
        last_name: Set(None),
        is_admin: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to insert user")
}

/// 插入一个站点
pub async fn insert_site(
    db: &DatabaseConnection,
    name: &str,
    url: &str,
    is_up: bool,
    user_id: Option<i32>,
) -> sites::Model {
    sites::ActiveModel {
        slug: Set(name.to_lowercase()),
        name: Set(name.to_string()),
        url: Set(url.to_string()),
        is_up: Set(is_up),
        last_check: Set(0.0),
        favicon: Set(None),
        user_id: Set(user_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to insert site")
}
