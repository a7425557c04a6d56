//! In-memory conversation store for tests and local runs.

use super::{ConversationStore, StoreError};
use crate::models::{Conversation, Turn};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations.
    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn find(&self, conversation_id: &str) -> Result<Conversation, StoreError> {
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Conversation>, StoreError> {
        let mut conversations: Vec<Conversation> =
            self.conversations.read().await.values().cloned().collect();
        conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(conversations)
    }

    async fn insert(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let mut conversations = self.conversations.write().await;
        if conversations.contains_key(&conversation.conversation_id) {
            return Err(StoreError::Duplicate(conversation.conversation_id.clone()));
        }
        conversations.insert(conversation.conversation_id.clone(), conversation.clone());
        Ok(())
    }

    async fn append_turns(&self, conversation_id: &str, turns: &[Turn]) -> Result<(), StoreError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .get_mut(conversation_id)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))?;
        conversation.messages.extend_from_slice(turns);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
