//! 监控服务 - 管理目录订阅和处理任务的生命周期
//!
//! 文件系统通知通过 channel 进入主循环，每个通知在 blocking 线程池里独立处理，
//! 慢的 webhook 不会阻塞其他文件的通知。收到停止信号后不再派发新通知，
//! 取消订阅，并等待已经在运行的处理任务完成。

use anyhow::{bail, Context, Result};
use chrono::Utc;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::pipeline::LogPipeline;
use crate::watcher::{is_modification, LogFileHandler};
use crate::webhook::{DeliveryOutcome, HttpTransport};

/// 监控服务
pub struct MonitorService {
    directories: Vec<PathBuf>,
    handler: Arc<LogFileHandler>,
}

impl MonitorService {
    pub fn new(directories: Vec<PathBuf>, handler: LogFileHandler) -> Self {
        Self {
            directories,
            handler: Arc::new(handler),
        }
    }

    /// 根据配置组装服务
    pub fn from_config(config: &MonitorConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        if let Some(cutoff) = config.staleness_cutoff(Utc::now()) {
            warn!(
                cutoff = %cutoff.to_rfc3339(),
                "TIME_THRESHOLD is configured but not enforced; older events are still forwarded"
            );
        }

        let pipeline = LogPipeline::from_config(config, transport)?;
        Ok(Self::new(
            config.log_directories.clone(),
            LogFileHandler::new(pipeline, config.max_lines),
        ))
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// 运行监控循环，直到 `shutdown` 完成
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        for dir in &self.directories {
            if !dir.is_dir() {
                bail!("Log directory does not exist or is not a directory: {}", dir.display());
            }
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        for dir in &self.directories {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
            info!(dir = %dir.display(), "Watching directory");
        }

        let mut handlers: JoinSet<Vec<DeliveryOutcome>> = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested, no new notifications will be dispatched");
                    break;
                }
                received = rx.recv() => match received {
                    Some(Ok(event)) => {
                        if !is_modification(&event.kind) {
                            continue;
                        }
                        let handler = Arc::clone(&self.handler);
                        handlers.spawn_blocking(move || handler.handle_event(&event));
                    }
                    Some(Err(e)) => warn!(error = %e, "File watcher error"),
                    None => {
                        warn!("File watcher channel closed");
                        break;
                    }
                },
                Some(joined) = handlers.join_next(), if !handlers.is_empty() => {
                    log_joined(joined);
                }
            }
        }

        // 取消订阅后再等待已派发的任务
        drop(watcher);
        rx.close();

        if !handlers.is_empty() {
            info!(in_flight = handlers.len(), "Waiting for in-flight handlers");
        }
        while let Some(joined) = handlers.join_next().await {
            log_joined(joined);
        }

        info!("Monitor stopped");
        Ok(())
    }
}

fn log_joined(joined: Result<Vec<DeliveryOutcome>, tokio::task::JoinError>) {
    match joined {
        Ok(outcomes) => {
            let failed = outcomes.iter().filter(|o| !o.success).count();
            debug!(delivered = outcomes.len(), failed, "Notification handled");
        }
        Err(e) => warn!(error = %e, "Notification handler panicked"),
    }
}
