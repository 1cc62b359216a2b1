//! # HTTP 探测器
//!
//! 每个工作者持有一个直连客户端和（代理可用时）一个代理客户端，
//! 按任务选择其一，客户端之间不共享可变状态。

use reqwest::{Client, ClientBuilder, Method, Proxy, StatusCode};
use std::error::Error as StdError;
use std::time::Instant;

use super::types::{ProbeOutcome, ProxyFault};
use crate::config::CheckerConfig;
use crate::error::{CheckerError, Result};

/// 代理拒绝 CONNECT（通常是目标站点不可达）
const TUNNEL_REJECTED_MARKER: &str = "tunnel error: unsuccessful";

/// 代理要求认证
const PROXY_AUTH_MARKERS: &[&str] = &["proxy authorization required", "proxy authentication required"];

/// 其余隧道错误都发生在与代理的连接上
const TUNNEL_MARKER: &str = "tunnel error";

/// 补全缺失的协议头，默认 `https://`
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// 解析代理地址，格式错误时返回 `None`
#[must_use]
pub fn parse_proxy(proxy_url: &str) -> Option<Proxy> {
    url::Url::parse(proxy_url).ok()?;
    Proxy::all(proxy_url).ok()
}

/// 展开整条错误链
#[must_use]
pub fn describe_error(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}

/// 判断经代理的请求失败归属
///
/// HTTPS 目标经 CONNECT 隧道访问，隧道建立之后的连接错误（如 TLS 握手）
/// 无法区分代理与站点，归为 `Tunnel`。HTTP 目标的连接错误只可能发生在代理套接字上。
#[must_use]
pub fn classify_proxy_error(err: &reqwest::Error, description: &str, tunneled: bool) -> ProxyFault {
    let lower = description.to_lowercase();
    if lower.contains(TUNNEL_REJECTED_MARKER) {
        return ProxyFault::Tunnel;
    }
    if PROXY_AUTH_MARKERS.iter().any(|marker| lower.contains(marker)) || lower.contains(TUNNEL_MARKER) {
        return ProxyFault::Unreachable;
    }
    match (err.is_connect(), tunneled) {
        (true, false) => ProxyFault::Unreachable,
        (true, true) => ProxyFault::Tunnel,
        (false, _) => ProxyFault::None,
    }
}

/// 站点可达性探测器
#[derive(Debug, Clone)]
pub struct Prober {
    direct: Client,
    proxied: Option<Client>,
    method: Method,
    status_threshold: u16,
}

impl Prober {
    /// 按配置创建探测器，代理地址无效时只创建直连客户端
    pub fn new(config: &CheckerConfig) -> Result<Self> {
        let direct = base_builder(config)
            .no_proxy()
            .build()
            .map_err(|e| CheckerError::internal_with_source("创建HTTP客户端失败", e))?;

        let proxied = match config.proxy().and_then(parse_proxy) {
            Some(proxy) => Some(
                base_builder(config)
                    .proxy(proxy)
                    .build()
                    .map_err(|e| CheckerError::internal_with_source("创建代理HTTP客户端失败", e))?,
            ),
            None => None,
        };

        Ok(Self {
            direct,
            proxied,
            method: config.probe_method.as_reqwest(),
            status_threshold: config.status_threshold,
        })
    }

    /// 是否持有可用的代理客户端
    #[must_use]
    pub const fn has_proxy(&self) -> bool {
        self.proxied.is_some()
    }

    /// 探测一次，传输错误折叠进结果
    pub async fn probe(&self, url: &str, use_proxy: bool) -> ProbeOutcome {
        let (client, used_proxy) = match (&self.proxied, use_proxy) {
            (Some(proxied), true) => (proxied, true),
            _ => (&self.direct, false),
        };

        let target = normalize_url(url);
        let started = Instant::now();
        let response = client.request(self.method.clone(), &target).send().await;
        let latency = started.elapsed();

        match response {
            Ok(response) => {
                let status = response.status();
                let proxy_fault = if used_proxy && status == StatusCode::PROXY_AUTHENTICATION_REQUIRED {
                    ProxyFault::Unreachable
                } else {
                    ProxyFault::None
                };
                let is_up = status.as_u16() < self.status_threshold && proxy_fault == ProxyFault::None;
                ProbeOutcome {
                    is_up,
                    latency,
                    status_code: Some(status.as_u16()),
                    error: (!is_up).then(|| format!("HTTP {status}")),
                    used_proxy,
                    proxy_fault,
                }
            }
            Err(err) => {
                let description = describe_error(&err);
                let proxy_fault = if used_proxy {
                    classify_proxy_error(&err, &description, target.to_ascii_lowercase().starts_with("https://"))
                } else {
                    ProxyFault::None
                };
                ProbeOutcome {
                    is_up: false,
                    latency,
                    status_code: None,
                    proxy_fault,
                    error: Some(description),
                    used_proxy,
                }
            }
        }
    }
}

fn base_builder(config: &CheckerConfig) -> ClientBuilder {
    Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.request_timeout)
        .user_agent(config.user_agent.clone())
}
