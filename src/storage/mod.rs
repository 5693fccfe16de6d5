pub mod channel;
pub mod file_ops;
pub mod indexer;

pub use channel::{StoreChannel, StoreRequest, StoreResponse, Ticket, WorkerChannel};
pub use file_ops::{snippets_from_value, Snippet, SnippetDraft, SnippetMetadata, SnippetStore, SAVED_TEXTS_KEY};
pub use indexer::SearchIndex;
