//! Ordering, each rule breaking ties of the previous one:
//! bookmarked first, then (for a non-empty query) the match score of the
//! title, best tag, page title and content, then most recent first.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::storage::Snippet;

const PREFIX_SCORE: u8 = 3;
const CONTAINS_SCORE: u8 = 1;

/// Case-insensitive score of `value` against an already lowercased query.
pub fn match_score(value: &str, query: &str) -> u8 {
    if query.is_empty() {
        return 0;
    }
    let value = value.to_lowercase();
    if value.starts_with(query) {
        PREFIX_SCORE
    } else if value.contains(query) {
        CONTAINS_SCORE
    } else {
        0
    }
}

pub fn tag_score(tags: &[String], query: &str) -> u8 {
    tags.iter()
        .map(|tag| match_score(tag, query))
        .max()
        .unwrap_or(0)
}

pub fn compare(a: &Snippet, b: &Snippet, query: &str) -> Ordering {
    b.is_bookmarked
        .cmp(&a.is_bookmarked)
        .then_with(|| {
            if query.is_empty() {
                return Ordering::Equal;
            }
            match_score(&b.title, query)
                .cmp(&match_score(&a.title, query))
                .then_with(|| tag_score(&b.tags, query).cmp(&tag_score(&a.tags, query)))
                .then_with(|| {
                    let score = |s: &Snippet| s.page_title().map_or(0, |p| match_score(p, query));
                    score(b).cmp(&score(a))
                })
                .then_with(|| match_score(&b.content, query).cmp(&match_score(&a.content, query)))
        })
        .then_with(|| b.timestamp().cmp(&a.timestamp()))
}

/// Orders `items` in place. Stable, so ranking twice changes nothing.
pub fn rank(items: &mut [Snippet], query: &str) {
    let query = query.to_lowercase();
    items.sort_by(|a, b| compare(a, b, &query));
}

pub fn ranked(mut items: Vec<Snippet>, query: &str) -> Vec<Snippet> {
    rank(&mut items, query);
    items
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultLimits {
    pub bookmarked: usize,
    pub recent: usize,
    pub max_displayed: usize,
}

impl Default for DefaultLimits {
    fn default() -> Self {
        Self {
            bookmarked: 10,
            recent: 10,
            max_displayed: 50,
        }
    }
}

/// Most recent bookmarks followed by the most recent other snippets.
///
/// Unused bookmark slots are handed to recent snippets. Entries without an
/// id or with an id already taken are skipped.
pub fn default_suggestions(items: &[Snippet], limits: DefaultLimits) -> Vec<Snippet> {
    let total = limits.max_displayed.min(limits.bookmarked + limits.recent);
    let by_recency = |bookmarked: bool| {
        let mut picked: Vec<&Snippet> = items.iter().filter(|s| s.is_bookmarked == bookmarked).collect();
        picked.sort_by_key(|s| std::cmp::Reverse(s.timestamp()));
        picked
    };

    let mut bookmarked = by_recency(true);
    bookmarked.truncate(limits.bookmarked.min(total));

    let remaining = total.saturating_sub(bookmarked.len());
    let recent_limit = limits
        .max_displayed
        .saturating_sub(bookmarked.len())
        .min(limits.recent.max(remaining));
    let mut recent = by_recency(false);
    recent.truncate(recent_limit);

    let mut seen = HashSet::new();
    bookmarked
        .into_iter()
        .chain(recent)
        .filter(|s| s.has_id() && seen.insert(s.id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{Arbitrary, Gen};

    fn snippet(id: &str, title: &str, bookmarked: bool, updated: &str) -> Snippet {
        Snippet {
            id: id.into(),
            title: title.into(),
            is_bookmarked: bookmarked,
            updated_at: Some(updated.into()),
            ..Default::default()
        }
    }

    fn titles(items: &[Snippet]) -> Vec<&str> {
        items.iter().map(|s| s.title.as_str()).collect()
    }

    impl Arbitrary for Snippet {
        fn arbitrary(g: &mut Gen) -> Self {
            let words = ["hello", "help", "shell", "world", "Hel", "", "report"];
            let pick = |g: &mut Gen| g.choose(&words).copied().unwrap_or_default().to_string();
            let days = u8::arbitrary(g) % 28 + 1;
            Snippet {
                id: pick(g),
                title: pick(g),
                content: pick(g),
                tags: vec![pick(g), pick(g)],
                is_bookmarked: bool::arbitrary(g),
                updated_at: Some(format!("2024-02-{days:02}T00:00:00Z")),
                ..Default::default()
            }
        }
    }

    quickcheck::quickcheck! {
        fn bookmarks_always_lead(items: Vec<Snippet>, query: String) -> bool {
            let ranked = ranked(items, &query);
            let first_plain = ranked.iter().position(|s| !s.is_bookmarked).unwrap_or(ranked.len());
            ranked[first_plain..].iter().all(|s| !s.is_bookmarked)
        }

        fn ranking_is_idempotent(items: Vec<Snippet>, query: String) -> bool {
            let once = ranked(items, &query);
            ranked(once.clone(), &query) == once
        }
    }

    #[test]
    fn scores() {
        assert_eq!(match_score("Hello", "hel"), 3);
        assert_eq!(match_score("Shell", "hel"), 1);
        assert_eq!(match_score("World", "hel"), 0);
        assert_eq!(match_score("Hello", ""), 0);
        assert_eq!(tag_score(&["xhel".into(), "help".into()], "hel"), 3);
        assert_eq!(tag_score(&[], "hel"), 0);
    }

    #[test]
    fn bookmark_beats_recency_and_score() {
        let items = vec![
            snippet("2", "Help", false, "2024-03-02T00:00:00Z"),
            snippet("1", "Hello", true, "2024-03-01T00:00:00Z"),
        ];
        assert_eq!(titles(&ranked(items, "hel")), vec!["Hello", "Help"]);
    }

    #[test]
    fn prefix_beats_substring() {
        let items = vec![
            snippet("1", "Shell tricks", false, "2024-03-05T00:00:00Z"),
            snippet("2", "Help desk", false, "2024-03-01T00:00:00Z"),
        ];
        assert_eq!(titles(&ranked(items, "HEL")), vec!["Help desk", "Shell tricks"]);
    }

    #[test]
    fn later_fields_break_ties() {
        let mut tagged = snippet("1", "alpha", false, "2024-01-01T00:00:00Z");
        tagged.tags = vec!["rust".into()];
        let mut paged = snippet("2", "alpha", false, "2024-01-03T00:00:00Z");
        paged.metadata = Some(crate::storage::SnippetMetadata {
            source: None,
            page_title: Some("Rust book".into()),
        });
        let mut bodied = snippet("3", "alpha", false, "2024-01-02T00:00:00Z");
        bodied.content = "about rust".into();

        let order = ranked(vec![bodied, paged, tagged], "rust");
        let ids: Vec<&str> = order.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn empty_query_orders_by_recency() {
        let items = vec![
            snippet("1", "old", false, "2023-01-01T00:00:00Z"),
            snippet("2", "broken", false, "not a date"),
            snippet("3", "new", false, "2024-01-01T00:00:00Z"),
        ];
        assert_eq!(titles(&ranked(items, "")), vec!["new", "old", "broken"]);
    }

    #[test]
    fn defaults_blend_bookmarks_and_recent() {
        let mut items = Vec::new();
        for i in 0..3 {
            items.push(snippet(&format!("b{i}"), "b", true, &format!("2024-01-0{}T00:00:00Z", i + 1)));
        }
        for i in 0..25 {
            items.push(snippet(&format!("r{i}"), "r", false, &format!("2024-02-{:02}T00:00:00Z", i + 1)));
        }

        let defaults = default_suggestions(&items, DefaultLimits::default());
        assert_eq!(defaults.len(), 20);
        assert_eq!(defaults[0].id, "b2");
        assert_eq!(defaults[2].id, "b0");
        assert_eq!(defaults[3].id, "r24");
        assert!(defaults[3..].iter().all(|s| !s.is_bookmarked));
    }

    #[test]
    fn defaults_skip_missing_and_duplicate_ids() {
        let items = vec![
            snippet("a", "first", true, "2024-01-02T00:00:00Z"),
            snippet("a", "dup", false, "2024-01-03T00:00:00Z"),
            snippet("", "anonymous", false, "2024-01-04T00:00:00Z"),
            snippet("b", "second", false, "2024-01-01T00:00:00Z"),
        ];
        assert_eq!(
            titles(&default_suggestions(&items, DefaultLimits::default())),
            vec!["first", "second"]
        );
    }
}
