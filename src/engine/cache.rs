use std::sync::Arc;

use indexmap::IndexMap;

use crate::storage::Snippet;

pub type CachedResults = Arc<[Snippet]>;

#[derive(Debug)]
pub struct QueryCache {
    capacity: usize,
    entries: IndexMap<String, CachedResults>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: IndexMap::new(),
        }
    }

    pub fn get(&self, query: &str) -> Option<CachedResults> {
        self.entries.get(query.trim()).cloned()
    }

    /// Stores `items` under the trimmed `query`, then trims the map back to
    /// capacity without touching the `protected` entry.
    pub fn insert(&mut self, query: &str, items: CachedResults, protected: Option<&str>) {
        self.entries.insert(query.trim().to_string(), items);

        let mut index = 0;
        while self.entries.len() > self.capacity && index < self.entries.len() {
            let is_protected = self
                .entries
                .get_index(index)
                .is_some_and(|(key, _)| Some(key.as_str()) == protected);
            if is_protected {
                index += 1;
                continue;
            }
            self.entries.shift_remove_index(index);
        }
    }

    pub fn contains(&self, query: &str) -> bool {
        self.entries.contains_key(query.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(title: &str) -> CachedResults {
        Arc::from(vec![Snippet {
            title: title.into(),
            ..Default::default()
        }])
    }

    #[test]
    fn keys_are_trimmed() {
        let mut cache = QueryCache::new(4);
        cache.insert("  rep ", results("Report"), None);
        assert!(cache.contains("rep"));
        assert_eq!(cache.get(" rep").unwrap()[0].title, "Report");
    }

    #[test]
    fn evicts_oldest_first() {
        let mut cache = QueryCache::new(30);
        for i in 0..45 {
            cache.insert(&format!("q{i}"), results("x"), None);
            assert!(cache.len() <= 30);
        }
        assert!(!cache.contains("q14"));
        assert!(cache.contains("q15"));
        assert!(cache.contains("q44"));
    }

    #[test]
    fn displayed_entry_survives_eviction() {
        let mut cache = QueryCache::new(30);
        for i in 0..30 {
            cache.insert(&format!("q{i}"), results("x"), None);
        }
        for i in 30..40 {
            cache.insert(&format!("q{i}"), results("x"), Some("q0"));
            assert_eq!(cache.len(), 30);
        }
        assert!(cache.contains("q0"));
        assert!(!cache.contains("q1"));
        assert!(!cache.contains("q10"));
        assert!(cache.contains("q11"));
    }
}
