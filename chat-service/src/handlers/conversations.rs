use crate::models::Conversation;
use crate::services::StoreError;
use crate::startup::AppState;
use anyhow::anyhow;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub conversation: Conversation,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<Conversation>,
}

#[tracing::instrument(skip(state))]
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<ConversationResponse>, AppError> {
    if conversation_id.trim().is_empty() {
        return Err(missing_id());
    }

    match state.read_store.find(&conversation_id).await {
        Ok(conversation) => {
            tracing::debug!(turns = conversation.messages.len(), "Conversation found");
            Ok(Json(ConversationResponse { conversation }))
        }
        Err(StoreError::NotFound(_)) => {
            Err(AppError::NotFound(anyhow!("Conversation not found")))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch conversation");
            Err(AppError::DatabaseError(
                anyhow!(e.to_string()).context("Database fetch failed"),
            ))
        }
    }
}

/// `GET /api/conversations/` with no identifier segment.
pub async fn missing_conversation_id() -> AppError {
    missing_id()
}

#[tracing::instrument(skip(state))]
pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<ConversationListResponse>, AppError> {
    let conversations = state.read_store.list().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to list conversations");
        AppError::DatabaseError(anyhow!(e.to_string()).context("Database fetch failed"))
    })?;

    tracing::debug!(count = conversations.len(), "Conversations listed");

    Ok(Json(ConversationListResponse { conversations }))
}

fn missing_id() -> AppError {
    AppError::BadRequest(anyhow!("Missing conversationId parameter"))
}
