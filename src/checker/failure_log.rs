//! # 失败探测日志
//!
//! 每次失败的探测追加一行 `<url> failed to respond: <error>`。

use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::{Context, Result};
use crate::logging::{LogComponent, LogStage};

/// 追加写入的失败日志文件
#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条失败记录
    pub async fn append(&self, url: &str, error: &str) -> Result<()> {
        let line = format!("{url} failed to respond: {error}\n");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("打开失败日志 {} 失败", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .context("写入失败日志失败")?;
        // tokio 的文件写入在后台线程完成，drop 前必须 flush
        file.flush().await.context("刷新失败日志失败")?;
        Ok(())
    }

    /// 追加失败记录，写入失败只记录日志
    pub async fn record(&self, url: &str, error: &str) {
        if let Err(e) = self.append(url, error).await {
            crate::lwarn!(
                LogStage::Probe,
                LogComponent::FailureLog,
                "append",
                "写入失败日志失败",
                path = %self.path.display(),
                error = %e
            );
        }
    }
}
