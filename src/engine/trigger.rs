use regex::Regex;

use super::dom::{char_len, char_slice, Document, NodeId};
use super::surface::EditableSurface;
use crate::error::{ConfigError, DetectionError};

/// An active trigger token inside one surface. Offsets are characters of
/// the surface's flattened text; `start` is where the prefix begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerSession {
    pub element: NodeId,
    pub start: usize,
    pub end: usize,
}

impl TriggerSession {
    pub fn covers(&self, caret: usize) -> bool {
        (self.start..=self.end).contains(&caret)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    pub start: usize,
    pub end: usize,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub caret: usize,
    pub found: Option<TriggerMatch>,
}

#[derive(Debug, Clone)]
pub struct TriggerDetector {
    prefix: String,
    pattern: Regex,
}

impl TriggerDetector {
    pub fn new(prefix: &str) -> Result<Self, ConfigError> {
        if char_len(prefix) != 2 {
            return Err(ConfigError::TriggerPrefix(prefix.to_string()));
        }

        let mut excluded: Vec<char> = prefix.chars().collect();
        excluded.dedup();
        let class: String = excluded.iter().map(|c| regex::escape(&c.to_string())).collect();
        let pattern = Regex::new(&format!(r"{}([^\s{}]*)$", regex::escape(prefix), class))?;

        Ok(Self {
            prefix: prefix.to_string(),
            pattern,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Cheap pre-check: only edits that could start, extend or end a token
    /// are worth a pattern match.
    pub fn should_evaluate(&self, inserted: Option<&str>, session_active: bool) -> bool {
        match inserted {
            None | Some("") => true,
            Some(data) => session_active || data.chars().any(|c| self.prefix.contains(c)),
        }
    }

    pub fn find(&self, text: &str, caret: usize) -> Option<TriggerMatch> {
        let caret = caret.min(char_len(text));
        let before = char_slice(text, 0, caret);
        let captures = self.pattern.captures(&before)?;
        let whole = captures.get(0)?;
        let query = captures.get(1).map_or("", |m| m.as_str());

        Some(TriggerMatch {
            start: char_len(&before[..whole.start()]),
            end: caret,
            query: query.to_string(),
        })
    }

    pub fn detect(
        &self,
        doc: &Document,
        surface: &dyn EditableSurface,
        last_caret: Option<usize>,
    ) -> Result<Detection, DetectionError> {
        if !surface.is_connected(doc) {
            return Err(DetectionError::Detached);
        }
        let text = surface.text(doc);
        let len = char_len(&text);
        let caret = surface.caret(doc).or(last_caret).unwrap_or(len).min(len);

        Ok(Detection {
            caret,
            found: self.find(&text, caret),
        })
    }
}
