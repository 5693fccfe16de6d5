use super::Snippet;
use crate::engine::rank;

const MAX_QUERY_LEN: usize = 100;
const MAX_SEARCH_RESULTS: usize = 50;

#[derive(Debug, Clone)]
pub struct SearchIndex {
    max_query_len: usize,
    max_results: usize,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self {
            max_query_len: MAX_QUERY_LEN,
            max_results: MAX_SEARCH_RESULTS,
        }
    }
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(&self, query: &str) -> String {
        query
            .chars()
            .take(self.max_query_len)
            .collect::<String>()
            .trim()
            .to_lowercase()
    }

    /// Snippets whose title, content, tags or source URL contain the query.
    pub fn filter<'a>(&self, query: &str, snippets: &'a [Snippet]) -> Vec<&'a Snippet> {
        let query = self.normalize(query);
        if query.is_empty() {
            return snippets.iter().collect();
        }

        snippets
            .iter()
            .filter(|snippet| {
                snippet.title.to_lowercase().contains(&query)
                    || snippet.content.to_lowercase().contains(&query)
                    || snippet.tags.iter().any(|tag| tag.to_lowercase().contains(&query))
                    || snippet
                        .source_url
                        .as_deref()
                        .is_some_and(|url| url.to_lowercase().contains(&query))
            })
            .collect()
    }

    pub fn search(&self, query: &str, snippets: &[Snippet]) -> Vec<Snippet> {
        let normalized = self.normalize(query);
        let matches = self.filter(&normalized, snippets).into_iter().cloned().collect();
        let mut results = rank::ranked(matches, &normalized);
        results.truncate(self.max_results);

        log::debug!("Search completed. Query: {:?}, results: {}", normalized, results.len());
        results
    }
}
