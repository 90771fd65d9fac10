//! Log Webhook Monitor - 监控日志目录，按时间戳切分事件，匹配关键字后推送到 webhook

pub mod config;
pub mod dedup;
pub mod filter;
pub mod matcher;
pub mod pipeline;
pub mod segmenter;
pub mod service;
pub mod watcher;
pub mod webhook;

pub use config::MonitorConfig;
pub use dedup::DeliveryDeduplicator;
pub use filter::KeywordFilter;
pub use matcher::{TimestampMatch, TimestampMatcher, DEFAULT_TIMESTAMP_PATTERN};
pub use pipeline::LogPipeline;
pub use segmenter::{EventRecord, EventSegmenter};
pub use service::MonitorService;
pub use watcher::{is_log_file, read_tail, LogFileHandler};
pub use webhook::{
    DeliveryOutcome, HttpTransport, ReqwestTransport, WebhookConfig, WebhookDispatcher,
    WebhookPayload,
};
