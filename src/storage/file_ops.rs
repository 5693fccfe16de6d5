use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::error::StoreError;

pub const SAVED_TEXTS_KEY: &str = "savedTexts";

const TITLE_FROM_CONTENT_LIMIT: usize = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnippetMetadata {
    #[serde(deserialize_with = "lenient_optional_string", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(deserialize_with = "lenient_optional_string", skip_serializing_if = "Option::is_none")]
    pub page_title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Snippet {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(deserialize_with = "lenient_string")]
    pub content: String,
    #[serde(deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<String>,
    #[serde(deserialize_with = "lenient_flag")]
    pub is_bookmarked: bool,
    #[serde(
        rename = "sourceURL",
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_url: Option<String>,
    #[serde(deserialize_with = "lenient_metadata", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SnippetMetadata>,
}

impl Snippet {
    /// Milliseconds since the epoch of `updatedAt`, else `createdAt`; 0 when
    /// neither parses.
    pub fn timestamp(&self) -> i64 {
        self.updated_at
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.created_at.as_deref())
            .map(parse_timestamp)
            .unwrap_or(0)
    }

    pub fn page_title(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.page_title.as_deref())
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }
}

fn parse_timestamp(raw: &str) -> i64 {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc().timestamp_millis())
        })
        .unwrap_or(0)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// Numbers are epoch milliseconds.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339()),
        _ => None,
    })
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    })
}

fn lenient_metadata<'de, D>(deserializer: D) -> Result<Option<SnippetMetadata>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).ok(),
        _ => None,
    })
}

fn lenient_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(values)) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Decodes a stored collection, skipping entries that are not snippets.
pub fn snippets_from_value(value: &Value) -> Result<Vec<Snippet>, StoreError> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => return Err(StoreError::InvalidFormat("savedTexts is not an array")),
    };

    Ok(items
        .iter()
        .filter_map(|item| match serde_json::from_value::<Snippet>(item.clone()) {
            Ok(snippet) => Some(snippet),
            Err(e) => {
                log::warn!("Skipping unreadable snippet: {}", e);
                None
            }
        })
        .collect())
}

#[derive(Debug, Clone, Default)]
pub struct SnippetDraft {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_bookmarked: bool,
}

/// Key-value JSON document on disk. Every write replaces the file atomically.
#[derive(Debug, Clone)]
pub struct SnippetStore {
    pub path: PathBuf,
}

impl SnippetStore {
    pub fn new(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::InvalidFormat("store document is not an object")),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        let dir = self
            .path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let temp_file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&temp_file, document)?;
        temp_file.persist(&self.path)?;
        Ok(())
    }

    /// Value stored under `key`, `Null` when absent.
    pub fn get(&self, key: &str) -> Result<Value, StoreError> {
        Ok(self.read_document()?.remove(key).unwrap_or(Value::Null))
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut document = self.read_document()?;
        document.insert(key.to_string(), value);
        self.write_document(&document)
    }

    pub fn load_snippets(&self) -> Result<Vec<Snippet>, StoreError> {
        snippets_from_value(&self.get(SAVED_TEXTS_KEY)?)
    }

    pub fn save_snippet(&self, draft: SnippetDraft) -> Result<Snippet, StoreError> {
        let now = Utc::now().to_rfc3339();
        let title = if draft.title.trim().is_empty() {
            title_from_content(&draft.content)
        } else {
            draft.title.trim().to_string()
        };

        let snippet = Snippet {
            id: Uuid::new_v4().to_string(),
            title,
            content: draft.content,
            tags: draft.tags,
            created_at: Some(now.clone()),
            updated_at: Some(now),
            is_bookmarked: draft.is_bookmarked,
            source_url: None,
            metadata: Some(SnippetMetadata {
                source: Some("manual".to_string()),
                page_title: None,
            }),
        };

        let mut saved = match self.get(SAVED_TEXTS_KEY)? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            _ => return Err(StoreError::InvalidFormat("savedTexts is not an array")),
        };
        saved.push(serde_json::to_value(&snippet)?);
        self.set(SAVED_TEXTS_KEY, Value::Array(saved))?;

        Ok(snippet)
    }
}

fn title_from_content(content: &str) -> String {
    let mut title: String = content.chars().take(TITLE_FROM_CONTENT_LIMIT).collect();
    if content.chars().count() > TITLE_FROM_CONTENT_LIMIT {
        title.push_str("...");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_loose_documents() {
        let value = json!([
            {"id": 17, "title": "Hello", "tags": ["a", 3, "b"], "isBookmarked": true},
            {"title": null, "content": "body", "sourceURL": "https://example.com",
             "metadata": {"pageTitle": "Example"}},
            "not a snippet"
        ]);

        let snippets = snippets_from_value(&value).unwrap();
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0].id, "17");
        assert_eq!(snippets[0].tags, vec!["a", "b"]);
        assert!(snippets[0].is_bookmarked);
        assert!(!snippets[1].has_id());
        assert_eq!(snippets[1].title, "");
        assert_eq!(snippets[1].page_title(), Some("Example"));
        assert_eq!(snippets[1].source_url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn odd_field_types_do_not_drop_the_snippet() {
        let value = json!([
            {"id": "a", "title": "Nulls", "isBookmarked": null, "createdAt": null,
             "sourceURL": null, "metadata": null},
            {"id": "b", "title": "Numbers", "isBookmarked": 1, "createdAt": 1_704_067_200_000i64,
             "metadata": "page"},
            {"id": "c", "title": "Strings", "isBookmarked": "", "updatedAt": 5,
             "metadata": {"pageTitle": 3}}
        ]);

        let snippets = snippets_from_value(&value).unwrap();
        assert_eq!(snippets.len(), 3);
        assert!(!snippets[0].is_bookmarked);
        assert_eq!(snippets[0].timestamp(), 0);
        assert!(snippets[0].source_url.is_none());
        assert!(snippets[1].is_bookmarked);
        assert_eq!(snippets[1].timestamp(), 1_704_067_200_000);
        assert!(snippets[1].metadata.is_none());
        assert!(!snippets[2].is_bookmarked);
        assert_eq!(snippets[2].timestamp(), 5);
        assert_eq!(snippets[2].page_title(), Some("3"));
    }

    #[test]
    fn non_array_collection_is_rejected() {
        let err = snippets_from_value(&json!({"oops": true})).unwrap_err();
        assert!(matches!(err, StoreError::InvalidFormat(_)));
    }

    #[test]
    fn timestamp_prefers_updated_at() {
        let snippet = Snippet {
            created_at: Some("2024-01-01T00:00:00Z".into()),
            updated_at: Some("2024-01-02T00:00:00.000Z".into()),
            ..Default::default()
        };
        assert_eq!(snippet.timestamp(), 1_704_153_600_000);

        let fallback = Snippet {
            created_at: Some("2024-01-01T00:00:00Z".into()),
            updated_at: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(fallback.timestamp(), 1_704_067_200_000);

        let garbage = Snippet {
            updated_at: Some("yesterday".into()),
            ..Default::default()
        };
        assert_eq!(garbage.timestamp(), 0);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnippetStore::new(dir.path().join("nested").join("snippets.json")).unwrap();
        assert!(store.load_snippets().unwrap().is_empty());

        let saved = store
            .save_snippet(SnippetDraft {
                title: String::new(),
                content: "A fairly long snippet body that needs a derived title".into(),
                tags: vec!["work".into()],
                is_bookmarked: true,
            })
            .unwrap();
        assert_eq!(saved.title, "A fairly long snippet body tha...");
        assert!(saved.timestamp() > 0);

        let loaded = store.load_snippets().unwrap();
        assert_eq!(loaded, vec![saved]);
    }

    #[test]
    fn set_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnippetStore::new(dir.path().join("snippets.json")).unwrap();
        store.set("presetInitialized", json!(true)).unwrap();
        store.set(SAVED_TEXTS_KEY, json!([])).unwrap();

        assert_eq!(store.get("presetInitialized").unwrap(), json!(true));
        assert_eq!(store.get("missing").unwrap(), Value::Null);
    }
}
