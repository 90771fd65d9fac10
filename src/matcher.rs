//! 时间戳识别模块 - 事件切分所依据的分隔符

use anyhow::{Context, Result};
use regex::Regex;

/// 默认模式，依次匹配：
/// - syslog 风格 `Mon D HH:MM:SS`（`Jan  5 09:14:07`）
/// - ISO-8601，可带小数秒，以 `Z` 结尾
/// - `YYYY/MM/DD HH:MM:SS`
pub const DEFAULT_TIMESTAMP_PATTERN: &str = concat!(
    r"(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) {1,2}\d{1,2} \d{2}:\d{2}:\d{2}",
    r"|\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?Z",
    r"|\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}",
);

/// 缓冲区中的一次时间戳匹配
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampMatch<'a> {
    /// 起始字节偏移
    pub start: usize,
    /// 结束字节偏移（不含）
    pub end: usize,
    /// 匹配到的文本
    pub text: &'a str,
}

/// 时间戳匹配器，每次运行只有一个生效的模式
#[derive(Debug, Clone)]
pub struct TimestampMatcher {
    regex: Regex,
}

impl TimestampMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .with_context(|| format!("Invalid timestamp pattern: {}", pattern))?;
        Ok(Self { regex })
    }

    /// 按出现顺序返回所有不重叠的匹配
    pub fn find_all<'a>(&self, text: &'a str) -> Vec<TimestampMatch<'a>> {
        self.regex
            .find_iter(text)
            // 空匹配会在每个字节处切开事件
            .filter(|m| !m.as_str().is_empty())
            .map(|m| TimestampMatch {
                start: m.start(),
                end: m.end(),
                text: m.as_str(),
            })
            .collect()
    }

    /// `text` 中的第一个匹配
    pub fn leading<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.regex
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|s| !s.is_empty())
    }
}
