//! # 站点状态通知
//!
//! 已提交状态变化时通知站点所有者，同一站点的通知受静默期限制。

mod message;
mod notifier;
mod telegram;

pub use message::{escape_markdown_v2, render_status_message};
pub use notifier::{NotifyState, Notifier};
pub use telegram::TelegramSink;

use async_trait::async_trait;

use crate::error::Result;

/// 通知发送端，尽力投递，不保证送达
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// 向外部联系人发送一条已渲染的消息
    async fn send(&self, contact_id: i64, text: &str) -> Result<()>;
}
