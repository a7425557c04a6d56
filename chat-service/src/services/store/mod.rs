//! Conversation persistence.
//!
//! Handlers talk to a [`ConversationStore`]; the MongoDB implementation backs
//! production and the in-memory one backs tests and local runs.

pub mod memory;
pub mod mongo;

use crate::models::{Conversation, Turn};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::InMemoryConversationStore;
pub use mongo::MongoConversationStore;

/// Error type for store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No conversation exists under the identifier.
    #[error("Conversation not found: {0}")]
    NotFound(String),

    /// A conversation with the identifier already exists.
    #[error("Conversation already exists: {0}")]
    Duplicate(String),

    #[error("{0}")]
    Backend(String),
}

/// Keyed read/insert/append over conversation records.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch one conversation by exact identifier match.
    async fn find(&self, conversation_id: &str) -> Result<Conversation, StoreError>;

    /// All conversations, newest `created_at` first.
    async fn list(&self) -> Result<Vec<Conversation>, StoreError>;

    /// Insert a new conversation; `Duplicate` if the identifier is taken.
    async fn insert(&self, conversation: &Conversation) -> Result<(), StoreError>;

    /// Atomically append turns to an existing conversation.
    async fn append_turns(&self, conversation_id: &str, turns: &[Turn]) -> Result<(), StoreError>;

    /// Cheap liveness check against the backend.
    async fn health_check(&self) -> Result<(), StoreError>;
}
