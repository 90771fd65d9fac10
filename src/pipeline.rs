//! 处理流水线 - 切分 → 关键字过滤 → 去重 → 投递

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::config::MonitorConfig;
use crate::dedup::DeliveryDeduplicator;
use crate::filter::KeywordFilter;
use crate::matcher::TimestampMatcher;
use crate::segmenter::EventSegmenter;
use crate::webhook::{DeliveryOutcome, HttpTransport, WebhookConfig, WebhookDispatcher};

/// 单次内容缓冲区的完整处理链
pub struct LogPipeline {
    segmenter: EventSegmenter,
    filter: KeywordFilter,
    dispatcher: WebhookDispatcher,
    dedup: DeliveryDeduplicator,
}

impl LogPipeline {
    pub fn new(
        segmenter: EventSegmenter,
        filter: KeywordFilter,
        dispatcher: WebhookDispatcher,
        dedup: DeliveryDeduplicator,
    ) -> Self {
        Self {
            segmenter,
            filter,
            dispatcher,
            dedup,
        }
    }

    /// 根据配置组装流水线
    pub fn from_config(config: &MonitorConfig, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        let matcher = TimestampMatcher::new(&config.timestamp_pattern)?;
        Ok(Self::new(
            EventSegmenter::new(matcher),
            KeywordFilter::new(config.keywords.clone()),
            WebhookDispatcher::new(transport, WebhookConfig::from_monitor_config(config)),
            DeliveryDeduplicator::new(config.dedup_cache_size),
        ))
    }

    /// 处理一段内容，返回每次投递的结果
    pub fn process(&self, source_path: &str, content: &str) -> Vec<DeliveryOutcome> {
        let events = self.segmenter.segment(source_path, content);
        let total = events.len();

        let outcomes: Vec<DeliveryOutcome> = events
            .iter()
            .filter(|e| self.filter.matches(&e.raw_content))
            .filter(|e| self.dedup.try_claim(e))
            .map(|e| {
                let outcome = self.dispatcher.deliver(e);
                if !outcome.success {
                    self.dedup.release(e);
                }
                outcome
            })
            .collect();

        debug!(
            path = %source_path,
            events = total,
            delivered = outcomes.len(),
            "Pipeline finished"
        );

        outcomes
    }
}
