//! 切分与过滤的性质测试

use log_webhook_monitor::filter::matches;
use log_webhook_monitor::{EventSegmenter, TimestampMatcher, DEFAULT_TIMESTAMP_PATTERN};

fn segmenter() -> EventSegmenter {
    EventSegmenter::new(TimestampMatcher::new(DEFAULT_TIMESTAMP_PATTERN).unwrap())
}

const STAMPS: [&str; 4] = [
    "2024-01-01T00:00:00.000Z",
    "Jan 12 13:14:15",
    "2024/06/30 23:59:59",
    "2024-12-31T23:59:59Z",
];

#[test]
fn test_exactly_one_timestamp_gives_remainder() {
    for stamp in STAMPS {
        for prefix in ["", "garbage before\n", "   "] {
            let content = format!("{}{} body line\nmore\n\n", prefix, stamp);
            let events = segmenter().segment("x.log", &content);

            assert_eq!(events.len(), 1, "content: {:?}", content);
            assert_eq!(events[0].raw_content, format!("{} body line\nmore", stamp));
            assert_eq!(events[0].timestamp.as_deref(), Some(stamp));
        }
    }
}

#[test]
fn test_zero_timestamps_give_zero_events() {
    for content in ["", "\n\n", "no stamp here", "2024-01-01 missing time", "Jan 1 9:00:00 short hour"] {
        assert!(segmenter().segment("x.log", content).is_empty(), "content: {:?}", content);
    }
}

#[test]
fn test_k_timestamps_give_k_events_in_order() {
    for k in 2..=STAMPS.len() {
        let body: String = STAMPS[..k]
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{} message {}\ncontinuation {}\n", s, i, i))
            .collect();
        let content = format!("orphan line\n{}", body);
        let events = segmenter().segment("x.log", &content);

        assert_eq!(events.len(), k);
        for (i, event) in events.iter().enumerate() {
            assert_eq!(event.timestamp.as_deref(), Some(STAMPS[i]));
            assert_eq!(
                event.raw_content,
                format!("{} message {}\ncontinuation {}", STAMPS[i], i, i)
            );
        }
    }
}

#[test]
fn test_segmentation_is_pure() {
    let content = "x\nJan  1 00:00:00 a\n2024/01/01 00:00:00 b\n";
    let s = segmenter();
    let first = s.segment("x.log", content);
    for _ in 0..3 {
        assert_eq!(s.segment("x.log", content), first);
    }
}

#[test]
fn test_keyword_filter_properties() {
    let content = "2024/01/01 00:00:00 error disk full";
    let none: [&str; 0] = [];
    assert!(!matches(content, &none));
    assert!(matches(content, &["disk"]));
    assert!(matches(content, &["nope", "full"]));
    assert!(!matches(content, &["Error", "DISK"]));
}
