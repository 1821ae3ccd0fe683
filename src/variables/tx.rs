//! TX (transaction) collection.

use super::collection::{Collection, HashMapCollection, MutableCollection};
use regex::Regex;

/// Transaction collection for storing intermediate values.
///
/// TX variable names are case-insensitive; keys are normalized to lowercase
/// on every access so `setvar:TX.Score` and `%{tx.score}` meet in the same
/// slot.
#[derive(Debug, Clone, Default)]
pub struct TxCollection {
    data: HashMapCollection,
}

impl TxCollection {
    /// Create a new TX collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl Collection for TxCollection {
    fn all(&self) -> Vec<(&str, &str)> {
        self.data.all()
    }

    fn get(&self, key: &str) -> Option<Vec<&str>> {
        self.data.get(&key.to_lowercase())
    }

    fn get_regex(&self, pattern: &Regex) -> Vec<(&str, &str)> {
        self.data.get_regex(pattern)
    }

    fn count(&self) -> usize {
        self.data.count()
    }

    fn count_key(&self, key: &str) -> usize {
        self.data.count_key(&key.to_lowercase())
    }
}

impl MutableCollection for TxCollection {
    fn set(&mut self, key: String, value: String) {
        self.data.set(key.to_lowercase(), value);
    }

    fn delete(&mut self, key: &str) {
        self.data.delete(&key.to_lowercase());
    }

    fn increment(&mut self, key: &str, amount: i64) {
        self.data.increment(&key.to_lowercase(), amount);
    }

    fn decrement(&mut self, key: &str, amount: i64) {
        self.data.decrement(&key.to_lowercase(), amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut tx = TxCollection::new();
        tx.set("Anomaly_Score".to_string(), "5".to_string());
        assert_eq!(tx.first("anomaly_score"), Some("5"));
        assert_eq!(tx.first("ANOMALY_SCORE"), Some("5"));
        assert_eq!(tx.count_key("Anomaly_Score"), 1);

        tx.delete("ANOMALY_score");
        assert_eq!(tx.first("anomaly_score"), None);
    }

    #[test]
    fn test_increment_from_missing() {
        let mut tx = TxCollection::new();
        tx.increment("hits", 1);
        tx.increment("HITS", 2);
        assert_eq!(tx.first("hits"), Some("3"));
        tx.decrement("hits", 1);
        assert_eq!(tx.first("hits"), Some("2"));
    }
}
