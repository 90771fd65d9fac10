//! 投递去重器 - 可选的按文件去重缓存
//!
//! 每次变更通知都会重新读取尾部窗口，窗口内已投递过的事件会被再次切分。
//! 开启后，每个文件保留最近事件的指纹（有界 FIFO），命中则跳过。
//! 指纹在投递前就被占用，同一文件的并发通知只会有一个投递成功；
//! 投递失败时释放，下次通知可以重试。
//! 容量为 0 时完全关闭，不保留任何跨通知状态。

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::segmenter::EventRecord;

/// 最多跟踪的文件数，超出时淘汰最久未用的文件
pub const DEFAULT_MAX_FILES: usize = 1024;

#[derive(Debug, Default)]
struct FileFingerprints {
    fingerprints: VecDeque<u64>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct DedupState {
    files: HashMap<String, FileFingerprints>,
    tick: u64,
}

/// 按来源文件维护的指纹缓存
#[derive(Debug)]
pub struct DeliveryDeduplicator {
    capacity: usize,
    max_files: usize,
    state: Mutex<DedupState>,
}

impl DeliveryDeduplicator {
    pub fn new(capacity: usize) -> Self {
        Self::with_max_files(capacity, DEFAULT_MAX_FILES)
    }

    pub fn with_max_files(capacity: usize, max_files: usize) -> Self {
        Self {
            capacity,
            max_files: max_files.max(1),
            state: Mutex::new(DedupState::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// 尝试占用事件指纹
    ///
    /// 返回 true 表示调用方应当投递；false 表示已投递或正在被其他通知投递。
    /// 检查和写入在同一把锁内完成。
    pub fn try_claim(&self, record: &EventRecord) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let fingerprint = Self::fingerprint(record);
        let mut state = self.lock();
        state.tick += 1;
        let tick = state.tick;

        if !state.files.contains_key(&record.source_path) && state.files.len() >= self.max_files {
            Self::evict_oldest_file(&mut state.files);
        }

        let entry = state.files.entry(record.source_path.clone()).or_default();
        entry.last_used = tick;
        if entry.fingerprints.contains(&fingerprint) {
            debug!(path = %record.source_path, "Event already delivered, skipping");
            return false;
        }
        if entry.fingerprints.len() >= self.capacity {
            entry.fingerprints.pop_front();
        }
        entry.fingerprints.push_back(fingerprint);
        true
    }

    /// 投递失败后释放指纹
    pub fn release(&self, record: &EventRecord) {
        if !self.is_enabled() {
            return;
        }
        let fingerprint = Self::fingerprint(record);
        let mut state = self.lock();
        if let Some(entry) = state.files.get_mut(&record.source_path) {
            entry.fingerprints.retain(|f| *f != fingerprint);
        }
    }

    /// 当前跟踪的文件数
    pub fn tracked_files(&self) -> usize {
        self.lock().files.len()
    }

    fn lock(&self) -> MutexGuard<'_, DedupState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn evict_oldest_file(files: &mut HashMap<String, FileFingerprints>) {
        let oldest = files
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(path, _)| path.clone());
        if let Some(path) = oldest {
            debug!(path = %path, "Evicting dedup cache for file");
            files.remove(&path);
        }
    }

    fn fingerprint(record: &EventRecord) -> u64 {
        let mut hasher = DefaultHasher::new();
        record.timestamp.hash(&mut hasher);
        record.raw_content.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    fn event(path: &str, content: &str) -> EventRecord {
        EventRecord {
            source_path: path.to_string(),
            raw_content: content.to_string(),
            timestamp: Some("2024-01-01T00:00:00Z".to_string()),
        }
    }

    #[test]
    fn test_disabled_never_dedups() {
        let dedup = DeliveryDeduplicator::new(0);
        let e = event("a.log", "error");
        assert!(dedup.try_claim(&e));
        assert!(dedup.try_claim(&e));
        assert_eq!(dedup.tracked_files(), 0);
    }

    #[test]
    fn test_second_claim_rejected() {
        let dedup = DeliveryDeduplicator::new(4);
        let e = event("a.log", "error");
        assert!(dedup.try_claim(&e));
        assert!(!dedup.try_claim(&e));
    }

    #[test]
    fn test_release_allows_retry() {
        let dedup = DeliveryDeduplicator::new(4);
        let e = event("a.log", "error");
        assert!(dedup.try_claim(&e));
        dedup.release(&e);
        assert!(dedup.try_claim(&e));
    }

    #[test]
    fn test_same_content_other_file_not_seen() {
        let dedup = DeliveryDeduplicator::new(4);
        assert!(dedup.try_claim(&event("a.log", "error")));
        assert!(dedup.try_claim(&event("b.log", "error")));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let dedup = DeliveryDeduplicator::new(2);
        assert!(dedup.try_claim(&event("a.log", "one")));
        assert!(dedup.try_claim(&event("a.log", "two")));
        assert!(dedup.try_claim(&event("a.log", "three")));

        assert!(!dedup.try_claim(&event("a.log", "three")));
        assert!(!dedup.try_claim(&event("a.log", "two")));
        assert!(dedup.try_claim(&event("a.log", "one")));
    }

    #[test]
    fn test_file_count_is_bounded() {
        let dedup = DeliveryDeduplicator::with_max_files(4, 2);
        dedup.try_claim(&event("a.log", "x"));
        dedup.try_claim(&event("b.log", "x"));
        // a.log 最近被用过，淘汰的应是 b.log
        dedup.try_claim(&event("a.log", "y"));
        dedup.try_claim(&event("c.log", "x"));

        assert_eq!(dedup.tracked_files(), 2);
        assert!(!dedup.try_claim(&event("a.log", "x")));
        assert!(dedup.try_claim(&event("b.log", "x")));
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let dedup = Arc::new(DeliveryDeduplicator::new(16));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dedup = Arc::clone(&dedup);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    dedup.try_claim(&event("a.log", "error"))
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|claimed| *claimed)
            .count();
        assert_eq!(winners, 1);
    }
}
