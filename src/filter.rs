//! 关键字过滤模块 - 决定哪些事件需要推送

/// 至少一个关键字是 `content` 的子串时返回 true。
/// 关键字集合为空时一律返回 false。
pub fn matches<S: AsRef<str>>(content: &str, keywords: &[S]) -> bool {
    keywords.iter().any(|k| content.contains(k.as_ref()))
}

/// 区分大小写的子串过滤器
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new(keywords: Vec<String>) -> Self {
        Self { keywords }
    }

    pub fn matches(&self, content: &str) -> bool {
        matches(content, &self.keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_rejects() {
        let empty: [&str; 0] = [];
        assert!(!matches("error everywhere", &empty));
        assert!(!KeywordFilter::default().matches("anything"));
    }

    #[test]
    fn test_any_keyword_matches() {
        let filter = KeywordFilter::new(vec!["error".into(), "timeout".into()]);
        assert!(filter.matches("2024 request timeout after 30s"));
        assert!(filter.matches("error disk full"));
        assert!(!filter.matches("all good"));
    }

    #[test]
    fn test_case_sensitive_substring() {
        let filter = KeywordFilter::new(vec!["ERROR".into()]);
        assert!(!filter.matches("error: lower case"));
        assert!(filter.matches("xxERRORxx"));
    }
}
