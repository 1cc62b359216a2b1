//! # Webring Checker 主程序
//!
//! 周期性探测环站成员站点，维护其在线状态并通知站点所有者

use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;

use webring_checker::{
    CheckerError, Result,
    checker::CheckerService,
    config::{self, ENV_CHECKER_DEBUG},
    database, lerror, linfo,
    logging::{self, LogComponent, LogStage},
    notify::{NotificationSink, TelegramSink},
    storage::SeaOrmSiteStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径，未指定时读取 `WEBRING_CONFIG_PATH`
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 调试模式：缩短检查间隔并输出详细日志
    #[arg(long)]
    debug: bool,

    /// 日志级别
    #[arg(long)]
    log_level: Option<String>,

    /// 只执行一轮检查后退出
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenv().ok();

    // 配置加载前只用于决定日志级别，无效值留给 load_config 报错
    let debug_hint = cli.debug
        || std::env::var(ENV_CHECKER_DEBUG)
            .ok()
            .and_then(|v| config::parse_bool(ENV_CHECKER_DEBUG, &v).ok())
            .unwrap_or(false);
    logging::init_logging(cli.log_level.as_deref(), debug_hint);

    if let Err(e) = run(cli).await {
        lerror!(
            LogStage::Shutdown,
            LogComponent::Main,
            "fatal",
            &format!("检查服务异常退出: {e}")
        );
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = config::resolve_config_path(cli.config.as_deref());
    let mut app_config = config::load_config(config_path.as_deref())?;
    if cli.debug {
        app_config.checker.debug = true;
    }

    let db = database::init_database(&app_config.database)
        .await
        .map_err(|e| CheckerError::database_with_source("数据库连接失败", e))?;
    if app_config.database.is_sqlite() {
        database::ensure_schema(&db)
            .await
            .map_err(|e| CheckerError::database_with_source("创建数据表失败", e))?;
    }
    let store = Arc::new(SeaOrmSiteStore::new(Arc::new(db)));

    let sink: Option<Arc<dyn NotificationSink>> = if app_config.telegram.enabled() {
        Some(Arc::new(TelegramSink::new(&app_config.telegram)?))
    } else {
        None
    };

    let mut service = CheckerService::new(app_config.checker.clone(), store, sink)?;

    if cli.once {
        let summary = service.run_once().await?;
        linfo!(
            LogStage::Shutdown,
            LogComponent::Main,
            "run_once",
            "单轮检查完成",
            sites = summary.sites,
            enqueued = summary.enqueued,
            dropped = summary.dropped
        );
        return Ok(());
    }

    service.start().await?;
    linfo!(LogStage::Startup, LogComponent::Main, "service_starting", "服务启动");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| CheckerError::io("等待退出信号失败", e))?;

    linfo!(
        LogStage::Shutdown,
        LogComponent::Main,
        "shutdown_signal",
        "收到退出信号，等待进行中的检查完成"
    );
    service.stop().await?;

    linfo!(LogStage::Shutdown, LogComponent::Main, "service_shutdown", "服务正常关闭");
    Ok(())
}
