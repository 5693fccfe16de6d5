use std::collections::VecDeque;

use serde_json::Value;

use crate::error::TransportError;
use crate::storage::{SearchIndex, Snippet, StoreChannel, StoreRequest, StoreResponse, Ticket, SAVED_TEXTS_KEY};

pub fn snippet(id: &str, title: &str, content: &str) -> Snippet {
    Snippet {
        id: id.into(),
        title: title.into(),
        content: content.into(),
        ..Default::default()
    }
}

/// In-process store answering synchronously, with hooks to delay responses
/// and inject failures.
#[derive(Default)]
pub struct MemoryChannel {
    snippets: Vec<Snippet>,
    index: SearchIndex,
    pub sent: Vec<(Ticket, StoreRequest)>,
    queue: VecDeque<(Ticket, StoreResponse)>,
    send_failures: VecDeque<TransportError>,
    recv_failure: Option<TransportError>,
    store_error: Option<String>,
    held: bool,
}

impl MemoryChannel {
    pub fn with_snippets(snippets: Vec<Snippet>) -> Self {
        Self {
            snippets,
            ..Default::default()
        }
    }

    pub fn fail_next_send(&mut self, error: TransportError) {
        self.send_failures.push_back(error);
    }

    pub fn fail_next_recv(&mut self, error: TransportError) {
        self.recv_failure = Some(error);
    }

    pub fn fail_store(&mut self, error: &str) {
        self.store_error = Some(error.to_string());
    }

    /// Keeps responses queued until [`release`](Self::release).
    pub fn hold(&mut self) {
        self.held = true;
    }

    pub fn release(&mut self) {
        self.held = false;
    }
}

impl StoreChannel for MemoryChannel {
    fn send(&mut self, ticket: Ticket, request: StoreRequest) -> Result<(), TransportError> {
        if let Some(error) = self.send_failures.pop_front() {
            return Err(error);
        }
        self.sent.push((ticket, request.clone()));

        let response = match (&self.store_error, request) {
            (Some(error), _) => StoreResponse::Failed { error: error.clone() },
            (None, StoreRequest::SearchItems { query }) => StoreResponse::Items(self.index.search(&query, &self.snippets)),
            (None, StoreRequest::Get { key }) if key == SAVED_TEXTS_KEY => {
                StoreResponse::Value(serde_json::to_value(&self.snippets).unwrap_or(Value::Null))
            }
            (None, StoreRequest::Get { .. }) => StoreResponse::Value(Value::Null),
        };
        self.queue.push_back((ticket, response));
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<(Ticket, StoreResponse)>, TransportError> {
        if self.held {
            return Ok(None);
        }
        if let Some(error) = self.recv_failure.take() {
            return Err(error);
        }
        Ok(self.queue.pop_front())
    }
}
