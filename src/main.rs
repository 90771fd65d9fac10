//! Log Webhook Monitor CLI
//!
//! 监控日志目录，把匹配关键字的事件推送到 webhook

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use log_webhook_monitor::{HttpTransport, MonitorConfig, MonitorService, ReqwestTransport};

/// 默认日志过滤
const DEFAULT_FILTER: &str = "log_webhook_monitor=info,lwm=info";

#[derive(Parser)]
#[command(name = "lwm")]
#[command(about = "Log Webhook Monitor - 监控日志文件并推送匹配事件到 webhook")]
#[command(version)]
struct Cli {
    /// 环境变量文件（不存在时忽略）
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 已存在的环境变量优先于文件
    if let Err(e) = dotenvy::from_path(&cli.env_file) {
        if !e.not_found() {
            return Err(e).with_context(|| format!("Failed to load {}", cli.env_file.display()));
        }
    }

    let config = MonitorConfig::from_env();

    // RUST_LOG 优先，否则使用 LOG_LEVEL
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = config
            .as_ref()
            .map(|c| c.filter_directive())
            .unwrap_or_else(|_| DEFAULT_FILTER.to_string());
        EnvFilter::new(directive)
    });

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let config = config.inspect_err(|e| error!(error = %e, "Invalid configuration"))?;

    let timeout = (config.webhook_timeout_secs > 0)
        .then(|| Duration::from_secs(config.webhook_timeout_secs));
    // blocking client 必须在 tokio runtime 之外创建和释放
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(timeout)?);

    let service = MonitorService::from_config(&config, Arc::clone(&transport))?;
    info!(
        directories = service.directories().len(),
        keywords = config.keywords.len(),
        max_lines = config.max_lines,
        "Starting log monitor (Ctrl+C to stop)"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(service.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }))?;

    drop(runtime);
    drop(transport);
    Ok(())
}
