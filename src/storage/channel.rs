//! Request/response message passing between the engine and the store.

use std::sync::mpsc;
use std::thread;

use serde_json::Value;

use super::{SearchIndex, Snippet, SnippetStore, SAVED_TEXTS_KEY};
use crate::error::{StoreError, TransportError};

pub type Ticket = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    SearchItems { query: String },
    Get { key: String },
}

impl StoreRequest {
    pub fn saved_texts() -> Self {
        StoreRequest::Get {
            key: SAVED_TEXTS_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreResponse {
    Items(Vec<Snippet>),
    Value(Value),
    Failed { error: String },
}

/// The engine's only way to reach the store. Sends never block; responses
/// are polled.
pub trait StoreChannel {
    fn send(&mut self, ticket: Ticket, request: StoreRequest) -> Result<(), TransportError>;

    /// `Ok(None)` when nothing has arrived yet.
    fn try_recv(&mut self) -> Result<Option<(Ticket, StoreResponse)>, TransportError>;
}

/// Answers one request against the store, never failing the transport.
pub fn handle_request(store: &SnippetStore, index: &SearchIndex, request: StoreRequest) -> StoreResponse {
    let result: Result<StoreResponse, StoreError> = match request {
        StoreRequest::SearchItems { query } => store
            .load_snippets()
            .map(|snippets| StoreResponse::Items(index.search(&query, &snippets))),
        StoreRequest::Get { key } => store.get(&key).map(StoreResponse::Value),
    };

    result.unwrap_or_else(|e| {
        log::error!("Store request failed: {}", e);
        StoreResponse::Failed { error: e.to_string() }
    })
}

pub struct WorkerChannel {
    requests: mpsc::Sender<(Ticket, StoreRequest)>,
    responses: mpsc::Receiver<(Ticket, StoreResponse)>,
}

impl WorkerChannel {
    pub fn spawn(store: SnippetStore) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<(Ticket, StoreRequest)>();
        let (response_tx, response_rx) = mpsc::channel();

        let _worker = thread::spawn(move || {
            let index = SearchIndex::new();
            for (ticket, request) in request_rx {
                let response = handle_request(&store, &index, request);
                if response_tx.send((ticket, response)).is_err() {
                    break;
                }
            }
            log::debug!("Store worker stopped");
        });

        Self {
            requests: request_tx,
            responses: response_rx,
        }
    }
}

impl StoreChannel for WorkerChannel {
    fn send(&mut self, ticket: Ticket, request: StoreRequest) -> Result<(), TransportError> {
        self.requests
            .send((ticket, request))
            .map_err(|_| TransportError::NoReceiver)
    }

    fn try_recv(&mut self) -> Result<Option<(Ticket, StoreResponse)>, TransportError> {
        match self.responses.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(TransportError::ChannelClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::storage::SnippetDraft;

    fn recv_blocking(channel: &mut WorkerChannel) -> (Ticket, StoreResponse) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(message) = channel.try_recv().unwrap() {
                return message;
            }
            assert!(Instant::now() < deadline, "worker did not answer");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn worker_answers_search_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnippetStore::new(dir.path().join("snippets.json")).unwrap();
        store
            .save_snippet(SnippetDraft {
                title: "Report".into(),
                content: "Report Q1".into(),
                ..Default::default()
            })
            .unwrap();

        let mut channel = WorkerChannel::spawn(store);
        channel
            .send(1, StoreRequest::SearchItems { query: "rep".into() })
            .unwrap();
        match recv_blocking(&mut channel) {
            (1, StoreResponse::Items(items)) => assert_eq!(items[0].content, "Report Q1"),
            other => panic!("unexpected response {other:?}"),
        }

        channel.send(2, StoreRequest::saved_texts()).unwrap();
        match recv_blocking(&mut channel) {
            (2, StoreResponse::Value(Value::Array(items))) => assert_eq!(items.len(), 1),
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn corrupt_store_reports_error_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snippets.json");
        std::fs::write(&path, r#"{"savedTexts": 42}"#).unwrap();
        let store = SnippetStore::new(path).unwrap();

        let response = handle_request(&store, &SearchIndex::new(), StoreRequest::SearchItems { query: "x".into() });
        assert!(matches!(response, StoreResponse::Failed { .. }));
    }
}
