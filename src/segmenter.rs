//! 事件切分模块 - 以时间戳为分隔把原始内容切成事件
//!
//! 切分规则：
//! 1. 每个事件从一个时间戳开始，到下一个时间戳之前（或缓冲区末尾）结束
//! 2. 第一个时间戳之前的内容无法归属，直接丢弃
//! 3. 事件内容去掉首尾空白，空事件丢弃
//! 4. 事件的 timestamp 从自身内容里重新提取，与切分位置解耦

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matcher::TimestampMatcher;

/// 一条日志事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// 来源文件路径
    pub source_path: String,
    /// 去掉首尾空白后的事件内容
    pub raw_content: String,
    /// 事件内容中的第一个时间戳
    pub timestamp: Option<String>,
}

/// 事件切分器
#[derive(Debug, Clone)]
pub struct EventSegmenter {
    matcher: TimestampMatcher,
}

impl EventSegmenter {
    pub fn new(matcher: TimestampMatcher) -> Self {
        Self { matcher }
    }

    /// 把内容切分为有序的事件列表
    ///
    /// 纯函数：同样的内容和模式总是得到同样的结果。
    pub fn segment(&self, source_path: &str, content: &str) -> Vec<EventRecord> {
        let matches = self.matcher.find_all(content);
        if matches.is_empty() {
            debug!(path = %source_path, "No timestamp found, nothing to segment");
            return Vec::new();
        }

        let starts: Vec<usize> = matches.iter().map(|m| m.start).collect();
        let mut events = Vec::with_capacity(starts.len());

        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(content.len());
            let slice = content[start..end].trim();
            if slice.is_empty() {
                continue;
            }

            events.push(EventRecord {
                source_path: source_path.to_string(),
                raw_content: slice.to_string(),
                timestamp: self.matcher.leading(slice).map(str::to_string),
            });
        }

        debug!(
            path = %source_path,
            matches = starts.len(),
            events = events.len(),
            discarded_prefix = starts[0],
            "Segmented content"
        );

        events
    }
}
