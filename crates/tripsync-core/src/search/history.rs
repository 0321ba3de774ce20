use std::collections::VecDeque;

use crate::cache::normalize_query;

/// Most-recent-first list of past queries, de-duplicated on their
/// normalized form.
#[derive(Debug, Clone)]
pub struct RecentSearches {
    entries: VecDeque<String>,
    capacity: usize,
}

impl RecentSearches {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Move `query` to the front, dropping an older spelling of it and
    /// anything beyond capacity. Blank input is ignored.
    pub fn record(&mut self, query: &str) {
        let value = query.trim();
        if value.is_empty() || self.capacity == 0 {
            return;
        }
        let key = normalize_query(value);
        self.entries.retain(|e| normalize_query(e) != key);
        self.entries.push_front(value.to_string());
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_recent_first_and_deduped() {
        let mut recent = RecentSearches::new(5);
        recent.record("coffee");
        recent.record("museum");
        recent.record("  Coffee ");
        assert_eq!(recent.entries(), vec!["Coffee", "museum"]);
    }

    #[test]
    fn test_inner_whitespace_variants_deduped() {
        let mut recent = RecentSearches::new(5);
        recent.record("coffee  shops");
        recent.record("Coffee\tShops");
        assert_eq!(recent.entries(), vec!["Coffee\tShops"]);
    }

    #[test]
    fn test_capped() {
        let mut recent = RecentSearches::new(2);
        recent.record("a");
        recent.record("b");
        recent.record("c");
        assert_eq!(recent.entries(), vec!["c", "b"]);
    }

    #[test]
    fn test_blank_ignored() {
        let mut recent = RecentSearches::new(2);
        recent.record("   ");
        assert!(recent.is_empty());
        recent.record("x");
        recent.clear();
        assert_eq!(recent.len(), 0);
    }
}
