use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a detection step was abandoned. Never surfaced to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    #[error("target is not an editable surface")]
    NotEditable,
    #[error("element is no longer attached to the document")]
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("receiving end does not exist")]
    NoReceiver,
    #[error("message channel closed")]
    ChannelClosed,
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl TransportError {
    /// Transient failures get a single delayed retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::NoReceiver)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplaceError {
    #[error("element is no longer attached to the document")]
    Detached,
    #[error("range [{start}, {end}) is outside text of length {len}")]
    OutOfBounds { start: usize, end: usize, len: usize },
    #[error("offset {0} could not be resolved to a text position")]
    Unresolved(usize),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store document is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not persist store file: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("invalid data format: {0}")]
    InvalidFormat(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("trigger prefix must be exactly two characters, got {0:?}")]
    TriggerPrefix(String),
    #[error("invalid trigger pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("failed to watch config: {0}")]
    Watch(#[from] notify::Error),
}
