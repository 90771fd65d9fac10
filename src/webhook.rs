//! Webhook 投递模块 - 把事件以 JSON 推送到配置的 HTTP 地址
//!
//! 只有 HTTP 200 算成功。失败只记录日志，不会向上抛出，
//! 也不会影响后续事件的处理。

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::segmenter::EventRecord;

/// 退避上限
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// HTTP 传输抽象：`POST(url, json) -> status`
pub trait HttpTransport: Send + Sync {
    /// 发送 JSON 并返回 HTTP 状态码；连接失败等传输错误返回 Err
    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16>;
}

/// 基于 reqwest blocking 客户端的传输实现
#[derive(Debug)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// 创建传输；`timeout` 为 None 时不设请求超时
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        Ok(response.status().as_u16())
    }
}

/// Webhook 配置
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// 目标 URL
    pub url: String,
    /// 首次失败后的最大重试次数（0 = 只尝试一次）
    pub max_retries: u32,
    /// 退避基数
    pub retry_backoff: Duration,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_retries: 0,
            retry_backoff: Duration::from_millis(crate::config::DEFAULT_RETRY_BACKOFF_MS),
        }
    }

    pub fn from_monitor_config(config: &MonitorConfig) -> Self {
        Self {
            url: config.webhook_url.clone(),
            max_retries: config.webhook_max_retries,
            retry_backoff: Duration::from_millis(config.webhook_retry_backoff_ms),
        }
    }
}

/// Webhook 请求载荷
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    /// 来源文件路径（字段名沿用下游约定）
    pub log_directory: String,
    /// 去掉开头时间戳后的事件正文
    pub event: String,
    /// 时间戳，没有则为空字符串
    pub timestamp: String,
}

impl From<&EventRecord> for WebhookPayload {
    fn from(record: &EventRecord) -> Self {
        Self {
            log_directory: record.source_path.clone(),
            event: event_body(record).to_string(),
            timestamp: record.timestamp.clone().unwrap_or_default(),
        }
    }
}

/// 事件正文：去掉开头的时间戳后再 trim；时间戳已单独放在 `timestamp` 字段
fn event_body(record: &EventRecord) -> &str {
    record
        .timestamp
        .as_deref()
        .and_then(|ts| record.raw_content.strip_prefix(ts))
        .unwrap_or(&record.raw_content)
        .trim()
}

/// 一次投递的结果，只用于日志
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub success: bool,
    /// 最后一次尝试的状态码；传输失败时为 None
    pub status_code: Option<u16>,
    pub source_path: String,
}

/// 计算第 `attempt` 次重试（从 1 开始）前的等待时间
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

fn is_retryable(result: &Result<u16>) -> bool {
    match result {
        Ok(status) => *status == 429 || *status >= 500,
        Err(_) => true,
    }
}

/// Webhook 投递器
#[derive(Clone)]
pub struct WebhookDispatcher {
    transport: Arc<dyn HttpTransport>,
    config: WebhookConfig,
}

impl WebhookDispatcher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: WebhookConfig) -> Self {
        Self { transport, config }
    }

    /// 投递一条事件，任何失败都转换为 success=false 的结果
    pub fn deliver(&self, record: &EventRecord) -> DeliveryOutcome {
        let payload = WebhookPayload::from(record);
        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(e) => {
                warn!(path = %record.source_path, error = %e, "Failed to serialize webhook payload");
                return DeliveryOutcome {
                    success: false,
                    status_code: None,
                    source_path: record.source_path.clone(),
                };
            }
        };

        let mut attempt = 0;
        let result = loop {
            let result = self.transport.post_json(&self.config.url, &body);
            if !is_retryable(&result) || attempt >= self.config.max_retries {
                break result;
            }

            attempt += 1;
            let delay = backoff_delay(self.config.retry_backoff, attempt);
            debug!(
                path = %record.source_path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying webhook delivery"
            );
            std::thread::sleep(delay);
        };

        let outcome = match result {
            Ok(status) => DeliveryOutcome {
                success: status == 200,
                status_code: Some(status),
                source_path: record.source_path.clone(),
            },
            Err(e) => {
                warn!(path = %record.source_path, error = %e, "Webhook transport error");
                DeliveryOutcome {
                    success: false,
                    status_code: None,
                    source_path: record.source_path.clone(),
                }
            }
        };

        if outcome.success {
            info!(path = %outcome.source_path, "Webhook sent successfully");
        } else {
            warn!(
                path = %outcome.source_path,
                status = ?outcome.status_code,
                attempts = attempt + 1,
                "Failed to send webhook"
            );
        }

        outcome
    }
}
