//! # 数据库模块
//!
//! 数据库连接管理。`sites` 与 `users` 表由 webring 主站维护，
//! 检查器只在本地 SQLite 环境下自行建表。

use crate::config::DatabaseConfig;
use crate::logging::{LogComponent, LogStage};
use entity::{Sites, Users};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use std::path::Path;
use std::time::Duration;

/// 初始化数据库连接
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    crate::linfo!(
        LogStage::Db,
        LogComponent::Database,
        "connect",
        "正在连接数据库",
        url = %config.redacted_url()
    );

    if config.is_sqlite() {
        prepare_sqlite_file(&config.url)?;
    }

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .sqlx_logging(false);

    let db = Database::connect(options).await?;

    crate::linfo!(LogStage::Db, LogComponent::Database, "connect", "数据库连接成功");
    Ok(db)
}

/// 确保 SQLite 数据库文件及其目录存在
fn prepare_sqlite_file(database_url: &str) -> Result<(), DbErr> {
    let db_path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    // 去掉连接参数，例如 `?mode=rwc`
    let db_path = db_path.split('?').next().unwrap_or(db_path);

    if db_path.is_empty() || db_path.starts_with(':') {
        return Ok(());
    }

    let db_file_path = Path::new(db_path);
    if let Some(parent_dir) = db_file_path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            std::fs::create_dir_all(parent_dir).map_err(|e| {
                DbErr::Custom(format!("无法创建数据库目录 {}: {e}", parent_dir.display()))
            })?;
            crate::ldebug!(
                LogStage::Db,
                LogComponent::Database,
                "prepare_sqlite",
                "数据库目录创建成功",
                dir = %parent_dir.display()
            );
        }
    }

    if !db_file_path.exists() {
        std::fs::File::create(db_file_path).map_err(|e| {
            DbErr::Custom(format!("无法创建数据库文件 {}: {e}", db_file_path.display()))
        })?;
        crate::linfo!(
            LogStage::Db,
            LogComponent::Database,
            "prepare_sqlite",
            "数据库文件创建成功",
            path = %db_file_path.display()
        );
    }

    Ok(())
}

/// 按实体定义创建 `users` 与 `sites` 表（已存在则跳过）
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut users = schema.create_table_from_entity(Users);
    users.if_not_exists();
    db.execute(backend.build(&users)).await?;

    let mut sites = schema.create_table_from_entity(Sites);
    sites.if_not_exists();
    db.execute(backend.build(&sites)).await?;

    crate::ldebug!(LogStage::Db, LogComponent::Database, "ensure_schema", "数据表已就绪");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::EntityTrait;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_in_memory_sqlite() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            connect_timeout: 5,
        };
        let db = init_database(&config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        // 重复调用不报错
        ensure_schema(&db).await.unwrap();

        let sites = Sites::find().all(&db).await.unwrap();
        assert!(sites.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_file_and_directory_are_created() {
        let dir = TempDir::new().unwrap();
        let db_file = dir.path().join("nested").join("webring.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", db_file.display()),
            max_connections: 1,
            connect_timeout: 5,
        };

        let db = init_database(&config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        assert!(db_file.exists());
    }
}
