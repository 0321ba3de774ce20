//! Hierarchical cache keys.
//!
//! Keys are `:`-separated segments, e.g. `list:65f0:schedule:1a2b...`.
//! Segment text is escaped so user input can never forge a separator, which
//! makes scope matching exact: `list:L1` covers `list:L1:schedule:x` but not
//! `list:L10`.

use std::fmt;

use crate::models::Coordinates;

const SEPARATOR: char = ':';

/// Most decimal places a coordinate keeps in a key (about 10 µm).
pub const MAX_COORDINATE_PRECISION: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Start a key in the given namespace. The namespace is trusted text.
    pub fn root(namespace: &str) -> Self {
        Self(namespace.to_string())
    }

    /// Append one escaped segment.
    pub fn push(mut self, segment: impl AsRef<str>) -> Self {
        self.0.push(SEPARATOR);
        for c in segment.as_ref().chars() {
            match c {
                '%' => self.0.push_str("%25"),
                ':' => self.0.push_str("%3A"),
                c => self.0.push(c),
            }
        }
        self
    }

    /// Append a coordinate rounded to `precision` decimal places, capped at
    /// [`MAX_COORDINATE_PRECISION`].
    pub fn push_coordinate(self, value: f64, precision: u32) -> Self {
        let precision = precision.min(MAX_COORDINATE_PRECISION);
        let rounded = round_coordinate(value, precision);
        let text = format!("{:.*}", precision as usize, rounded);
        self.push(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `self` equals `scope` or is nested below it.
    pub fn is_within(&self, scope: &CacheKey) -> bool {
        match self.0.strip_prefix(scope.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize free-text search input: trim, lowercase, collapse whitespace.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Round to a fixed number of decimals; negative zero folds into zero so
/// `-0.0004` and `0.0004` produce the same key at 3 decimals.
pub fn round_coordinate(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// `search:{query}:{lat}:{lng}`, or `search:{query}:anywhere` without a center.
pub fn search_key(query: &str, center: Option<Coordinates>, precision: u32) -> CacheKey {
    let key = CacheKey::root("search").push(normalize_query(query));
    match center.filter(Coordinates::is_valid) {
        Some(c) => key
            .push_coordinate(c.lat, precision)
            .push_coordinate(c.lng, precision),
        None => key.push("anywhere"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_identical_centers_share_a_key() {
        let a = search_key("Coffee", Some(Coordinates::new(40.71279, -74.00601)), 3);
        let b = search_key("Coffee", Some(Coordinates::new(40.71284, -74.00599)), 3);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "search:coffee:40.713:-74.006");
    }

    #[test]
    fn test_query_normalization() {
        assert_eq!(normalize_query("  Coffee   SHOPS "), "coffee shops");
        assert_eq!(normalize_query(" \t "), "");
        let a = search_key("coffee shops", None, 3);
        let b = search_key("  Coffee\tShops", None, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_centers_differ() {
        let a = search_key("pizza", Some(Coordinates::new(40.71, -74.0)), 3);
        let b = search_key("pizza", Some(Coordinates::new(40.72, -74.0)), 3);
        assert_ne!(a, b);
    }

    #[test]
    fn test_origin_center_is_treated_as_absent() {
        let a = search_key("pizza", Some(Coordinates::new(0.0, 0.0)), 3);
        let b = search_key("pizza", None, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_precision_is_capped() {
        let key = CacheKey::root("t").push_coordinate(40.5, 1_000_000_000);
        assert_eq!(key.as_str(), "t:40.5000000000");
    }

    #[test]
    fn test_negative_zero_folds() {
        assert_eq!(
            CacheKey::root("t").push_coordinate(-0.0004, 3),
            CacheKey::root("t").push_coordinate(0.0004, 3)
        );
    }

    #[test]
    fn test_separator_is_escaped() {
        let key = CacheKey::root("search").push("a:b");
        assert_eq!(key.as_str(), "search:a%3Ab");
        let scope = CacheKey::root("search").push("a");
        assert!(!key.is_within(&scope));
    }

    #[test]
    fn test_scope_matching_respects_segments() {
        let l1 = CacheKey::root("list").push("L1");
        let l10 = CacheKey::root("list").push("L10");
        let schedule = l1.clone().push("schedule").push("abc");
        assert!(l1.is_within(&l1));
        assert!(schedule.is_within(&l1));
        assert!(!l10.is_within(&l1));
        assert!(!l1.is_within(&schedule));
    }
}
