//! MongoDB-backed conversation store.
//!
//! The client is created lazily on first use and shared for the life of the
//! process. Turn appends use `$push` so concurrent writers never overwrite
//! each other's turns.

use super::{ConversationStore, StoreError};
use crate::models::{Conversation, Turn};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, IndexModel,
};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

const COLLECTION: &str = "conversations";

/// MongoDB duplicate key error code.
const DUPLICATE_KEY: i32 = 11000;

/// Stored document shape; `created_at` is a BSON datetime so sorting is exact.
#[derive(Debug, Serialize, Deserialize)]
struct ConversationRecord {
    conversation_id: String,
    messages: Vec<Turn>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationRecord {
    fn from(c: &Conversation) -> Self {
        Self {
            conversation_id: c.conversation_id.clone(),
            messages: c.messages.clone(),
            created_at: c.created_at,
        }
    }
}

impl From<ConversationRecord> for Conversation {
    fn from(r: ConversationRecord) -> Self {
        Self {
            conversation_id: r.conversation_id,
            messages: r.messages,
            created_at: r.created_at,
        }
    }
}

pub struct MongoConversationStore {
    uri: Secret<String>,
    database: String,
    client: OnceCell<MongoClient>,
}

impl MongoConversationStore {
    /// Create a store; no connection is made until the first operation.
    pub fn new(uri: Secret<String>, database: impl Into<String>) -> Self {
        Self {
            uri,
            database: database.into(),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&MongoClient, StoreError> {
        self.client
            .get_or_try_init(|| async {
                tracing::info!(database = %self.database, "Connecting to MongoDB");
                MongoClient::with_uri_str(self.uri.expose_secret())
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to MongoDB: {}", e);
                        StoreError::Backend(e.to_string())
                    })
            })
            .await
    }

    async fn conversations(&self) -> Result<Collection<ConversationRecord>, StoreError> {
        Ok(self
            .client()
            .await?
            .database(&self.database)
            .collection(COLLECTION))
    }

    /// Create the unique identifier index and the ordering index.
    ///
    /// Needs the read-write credential; call it on the writer store only.
    pub async fn initialize_indexes(&self) -> Result<(), StoreError> {
        tracing::info!("Creating MongoDB indexes for chat-service");
        let conversations = self.conversations().await?;

        let conversation_id_index = IndexModel::builder()
            .keys(doc! { "conversation_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("conversation_id_idx".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        conversations
            .create_index(conversation_id_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create conversation_id index: {}", e);
                StoreError::Backend(e.to_string())
            })?;

        let created_at_index = IndexModel::builder()
            .keys(doc! { "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("created_at_idx".to_string())
                    .build(),
            )
            .build();

        conversations
            .create_index(created_at_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create created_at index: {}", e);
                StoreError::Backend(e.to_string())
            })?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl ConversationStore for MongoConversationStore {
    async fn find(&self, conversation_id: &str) -> Result<Conversation, StoreError> {
        self.conversations()
            .await?
            .find_one(doc! { "conversation_id": conversation_id }, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to find conversation: {}", e);
                StoreError::Backend(e.to_string())
            })?
            .map(Conversation::from)
            .ok_or_else(|| StoreError::NotFound(conversation_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Conversation>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self
            .conversations()
            .await?
            .find(None, options)
            .await
            .map_err(|e| {
                tracing::error!("Failed to query conversations: {}", e);
                StoreError::Backend(e.to_string())
            })?;

        let records: Vec<ConversationRecord> = cursor.try_collect().await.map_err(|e| {
            tracing::error!("Failed to collect conversations: {}", e);
            StoreError::Backend(e.to_string())
        })?;

        Ok(records.into_iter().map(Conversation::from).collect())
    }

    async fn insert(&self, conversation: &Conversation) -> Result<(), StoreError> {
        self.conversations()
            .await?
            .insert_one(ConversationRecord::from(conversation), None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::Duplicate(conversation.conversation_id.clone())
                } else {
                    tracing::error!("Failed to insert conversation: {}", e);
                    StoreError::Backend(e.to_string())
                }
            })?;
        Ok(())
    }

    async fn append_turns(&self, conversation_id: &str, turns: &[Turn]) -> Result<(), StoreError> {
        let turns = to_bson(turns).map_err(|e| {
            tracing::error!("Failed to serialize turns: {}", e);
            StoreError::Backend(e.to_string())
        })?;

        let result = self
            .conversations()
            .await?
            .update_one(
                doc! { "conversation_id": conversation_id },
                doc! { "$push": { "messages": { "$each": turns } } },
                None,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to append turns: {}", e);
                StoreError::Backend(e.to_string())
            })?;

        if result.matched_count == 0 {
            return Err(StoreError::NotFound(conversation_id.to_string()));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.client()
            .await?
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                StoreError::Backend(e.to_string())
            })?;
        Ok(())
    }
}
