//! 文件监控处理模块 - 把文件系统变更通知接到处理流水线
//!
//! 每次通知只读取文件当前内容的最后 N 行，不保留任何按文件的状态。

use anyhow::{Context, Result};
use notify::event::ModifyKind;
use notify::{Event, EventKind};
use std::path::Path;
use tracing::{debug, warn};

use crate::pipeline::LogPipeline;
use crate::webhook::DeliveryOutcome;

/// 只处理这个后缀的文件
pub const LOG_SUFFIX: &str = ".log";

/// 是否为需要处理的日志文件（非目录且以 `.log` 结尾）
pub fn is_log_file(path: &Path) -> bool {
    !path.is_dir() && path.to_string_lossy().ends_with(LOG_SUFFIX)
}

/// 是否为内容修改类事件（忽略重命名和元数据变化）
pub fn is_modification(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any | ModifyKind::Other)
    )
}

/// 读取文件并保留最后 `max_lines` 行（保留原有换行符）
pub fn read_tail(path: &Path, max_lines: usize) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content = String::from_utf8_lossy(&bytes);

    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let start = lines.len().saturating_sub(max_lines);
    Ok(lines[start..].concat())
}

/// 变更通知处理器，所有监控目录共用一个实例
pub struct LogFileHandler {
    pipeline: LogPipeline,
    max_lines: usize,
}

impl LogFileHandler {
    pub fn new(pipeline: LogPipeline, max_lines: usize) -> Self {
        Self {
            pipeline,
            max_lines,
        }
    }

    /// 处理单个文件：读尾部窗口 → 流水线
    pub fn handle_path(&self, path: &Path) -> Result<Vec<DeliveryOutcome>> {
        let tail = read_tail(path, self.max_lines)?;
        let source = path.to_string_lossy();
        Ok(self.pipeline.process(&source, &tail))
    }

    /// 处理一次文件系统事件，错误只记录日志
    pub fn handle_event(&self, event: &Event) -> Vec<DeliveryOutcome> {
        if !is_modification(&event.kind) {
            return Vec::new();
        }

        let mut outcomes = Vec::new();
        for path in event.paths.iter().filter(|p| is_log_file(p)) {
            debug!(path = %path.display(), "Log file modified");
            match self.handle_path(path) {
                Ok(mut result) => outcomes.append(&mut result),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to process log file");
                }
            }
        }
        outcomes
    }
}
