//! # Telegram Bot API 发送端

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::NotificationSink;
use crate::config::TelegramConfig;
use crate::error::{CheckerError, Result};
use crate::logging::{LogComponent, LogStage};

#[derive(Serialize)]
struct TelegramMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

/// 通过 Telegram Bot API 发送消息
///
/// 请求地址包含 bot token，错误中一律去掉 URL。
#[derive(Debug, Clone)]
pub struct TelegramSink {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl TelegramSink {
    /// 按配置创建，未配置 token 时返回配置错误
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let bot_token = config
            .bot_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| CheckerError::config("未配置 Telegram Bot token"))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CheckerError::internal_with_source("创建Telegram客户端失败", e))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, contact_id: i64, text: &str) -> Result<()> {
        let payload = TelegramMessage {
            chat_id: contact_id,
            text,
            parse_mode: "MarkdownV2",
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| CheckerError::notification_with_source("Telegram 请求失败", e.without_url()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CheckerError::notification_with_source("读取 Telegram 响应失败", e.without_url()))?;

        let parsed = serde_json::from_str::<TelegramResponse>(&body).ok();
        let ok = parsed.as_ref().is_some_and(|r| r.ok);
        if !status.is_success() || !ok {
            let description = parsed
                .and_then(|r| r.description)
                .unwrap_or(body);
            return Err(CheckerError::notification(format!(
                "Telegram API 返回错误: {status}, {description}"
            )));
        }

        crate::ldebug!(
            LogStage::Notification,
            LogComponent::Telegram,
            "send_message",
            "Telegram 消息已发送",
            chat_id = contact_id
        );
        Ok(())
    }
}
