//! 配置模块 - 启动时一次性加载的监控配置
//!
//! 配置来源为环境变量（`main` 会先通过 dotenvy 加载 `.env` 文件）。
//! 解析逻辑只依赖一个 key 查找函数，测试时无需修改进程环境。

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::path::PathBuf;

use crate::matcher::DEFAULT_TIMESTAMP_PATTERN;

/// 默认日志级别
pub const DEFAULT_LOG_LEVEL: &str = "INFO";

/// 默认 webhook 超时（秒）
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 30;

/// 默认重试退避基数（毫秒）
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// 监控配置（启动后只读）
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Webhook 地址
    pub webhook_url: String,
    /// 监控的目录（保持配置顺序）
    pub log_directories: Vec<PathBuf>,
    /// 关键字（大小写敏感的子串匹配）
    pub keywords: Vec<String>,
    /// 每次变更通知最多读取的行数
    pub max_lines: usize,
    /// 过期阈值（天），只解析不执行
    pub time_threshold_days: Option<u64>,
    /// 时间戳正则
    pub timestamp_pattern: String,
    /// 日志级别（INFO / DEBUG / ...）
    pub log_level: String,
    /// Webhook 请求超时（秒），0 表示不设超时
    pub webhook_timeout_secs: u64,
    /// 首次失败后的最大重试次数
    pub webhook_max_retries: u32,
    /// 重试退避基数（毫秒）
    pub webhook_retry_backoff_ms: u64,
    /// 每个文件的去重缓存大小，0 表示关闭
    pub dedup_cache_size: usize,
}

impl MonitorConfig {
    /// 从进程环境加载配置
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意 key 查找函数加载配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let webhook_url = required(&lookup, "WEBHOOK_URL")?;

        let log_directories: Vec<PathBuf> = parse_list(&required(&lookup, "LOG_DIRECTORIES")?)
            .into_iter()
            .map(PathBuf::from)
            .collect();
        if log_directories.is_empty() {
            bail!("LOG_DIRECTORIES must contain at least one directory");
        }

        // KEYWORDS 必须存在，但允许解析后为空（空集合 = 全部拒绝）
        let keywords = parse_list(
            &lookup("KEYWORDS").ok_or_else(|| anyhow!("Missing required variable KEYWORDS"))?,
        );

        let max_lines: usize = parse_number(&required(&lookup, "MAX_LINES")?, "MAX_LINES")?;
        if max_lines == 0 {
            bail!("MAX_LINES must be greater than 0");
        }

        let time_threshold_days = optional(&lookup, "TIME_THRESHOLD")
            .map(|raw| parse_number(&raw, "TIME_THRESHOLD"))
            .transpose()?;

        let timestamp_pattern = optional(&lookup, "TIMESTAMP_PATTERN")
            .unwrap_or_else(|| DEFAULT_TIMESTAMP_PATTERN.to_string());
        regex::Regex::new(&timestamp_pattern)
            .with_context(|| format!("TIMESTAMP_PATTERN is not a valid regex: {}", timestamp_pattern))?;

        let log_level = optional(&lookup, "LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        if level_directive(&log_level).is_none() {
            bail!("LOG_LEVEL has unknown value: {}", log_level);
        }

        let webhook_timeout_secs = optional(&lookup, "WEBHOOK_TIMEOUT_SECS")
            .map(|raw| parse_number(&raw, "WEBHOOK_TIMEOUT_SECS"))
            .transpose()?
            .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_SECS);

        let webhook_max_retries = optional(&lookup, "WEBHOOK_MAX_RETRIES")
            .map(|raw| parse_number(&raw, "WEBHOOK_MAX_RETRIES"))
            .transpose()?
            .unwrap_or(0);

        let webhook_retry_backoff_ms = optional(&lookup, "WEBHOOK_RETRY_BACKOFF_MS")
            .map(|raw| parse_number(&raw, "WEBHOOK_RETRY_BACKOFF_MS"))
            .transpose()?
            .unwrap_or(DEFAULT_RETRY_BACKOFF_MS);

        let dedup_cache_size = optional(&lookup, "DEDUP_CACHE_SIZE")
            .map(|raw| parse_number(&raw, "DEDUP_CACHE_SIZE"))
            .transpose()?
            .unwrap_or(0);

        Ok(Self {
            webhook_url,
            log_directories,
            keywords,
            max_lines,
            time_threshold_days,
            timestamp_pattern,
            log_level,
            webhook_timeout_secs,
            webhook_max_retries,
            webhook_retry_backoff_ms,
            dedup_cache_size,
        })
    }

    /// 计算过期截止时间（早于该时间的事件理论上可以忽略）
    ///
    /// 目前只用于启动日志，不参与过滤。
    pub fn staleness_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let days = i64::try_from(self.time_threshold_days?).ok()?;
        now.checked_sub_signed(ChronoDuration::try_days(days)?)
    }

    /// 转换为 tracing EnvFilter 指令
    pub fn filter_directive(&self) -> String {
        let level = level_directive(&self.log_level).unwrap_or("info");
        format!("log_webhook_monitor={level},lwm={level}")
    }
}

/// 把逗号分隔的字符串拆成列表，去掉首尾空白和空项
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 日志级别名称映射（兼容 WARNING / CRITICAL 这类写法）
fn level_directive(level: &str) -> Option<&'static str> {
    match level.trim().to_uppercase().as_str() {
        "TRACE" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" | "WARNING" => Some("warn"),
        "ERROR" | "CRITICAL" | "FATAL" => Some("error"),
        _ => None,
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| anyhow!("Missing required variable {}", key))
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_number<T>(raw: &str, key: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{} is not a valid non-negative integer: {}", key, raw))
}
