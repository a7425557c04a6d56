use crate::models::{Conversation, Turn};
use crate::services::metrics;
use crate::services::providers::Completion;
use crate::services::StoreError;
use crate::startup::AppState;
use anyhow::anyhow;
use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use service_core::error::AppError;
use std::time::Instant;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[validate(length(min = 1))]
    pub message: String,

    #[validate(length(min = 1))]
    pub conversation_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Parse the raw body, separating malformed JSON from missing fields.
fn parse_request(body: &[u8]) -> Result<ChatRequest, AppError> {
    let request: ChatRequest = serde_json::from_slice(body).map_err(|e| match e.classify() {
        Category::Syntax | Category::Eof | Category::Io => {
            AppError::BadRequest(anyhow!("Invalid JSON in request body"))
        }
        Category::Data => AppError::BadRequest(anyhow!("Missing message or conversationId")),
    })?;

    request
        .validate()
        .map_err(|_| AppError::BadRequest(anyhow!("Missing message or conversationId")))?;

    Ok(request)
}

#[tracing::instrument(skip_all, fields(conversation_id = tracing::field::Empty))]
pub async fn send_message(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatResponse>, AppError> {
    let request = parse_request(&body)?;
    tracing::Span::current().record("conversation_id", request.conversation_id.as_str());

    let (mut turns, exists) = match state.store.find(&request.conversation_id).await {
        Ok(conversation) => (conversation.messages, true),
        Err(StoreError::NotFound(_)) => {
            tracing::info!("Starting new conversation");
            (Conversation::initial_turns(), false)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load conversation");
            return Err(AppError::DatabaseError(anyhow!("Database fetch failed: {}", e)));
        }
    };

    let user_turn = Turn::user(request.message);
    turns.push(user_turn.clone());

    let completion = complete(&state, &turns).await?;
    let reply = completion.text;
    let assistant_turn = Turn::assistant(reply.clone());

    if exists {
        append(&state, &request.conversation_id, [user_turn, assistant_turn]).await?;
    } else {
        turns.push(assistant_turn.clone());
        let conversation = Conversation::new(request.conversation_id.clone(), turns);

        match state.store.insert(&conversation).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                // Another request created it first; add ours after its turns.
                tracing::info!("Conversation created concurrently, appending instead");
                append(&state, &request.conversation_id, [user_turn, assistant_turn]).await?;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to insert conversation");
                return Err(AppError::DatabaseError(anyhow!(
                    "Database insert failed: {}",
                    e
                )));
            }
        }
    }

    tracing::info!(reply_len = reply.len(), "Chat message processed");

    Ok(Json(ChatResponse { response: reply }))
}

async fn complete(state: &AppState, turns: &[Turn]) -> Result<Completion, AppError> {
    let model = state.completion.model().to_string();
    let start = Instant::now();
    let result = state.completion.complete(turns).await;
    let elapsed = start.elapsed();

    match result {
        Ok(completion) => {
            metrics::record_completion(&model, "success", elapsed);
            metrics::record_tokens(&model, completion.input_tokens, completion.output_tokens);
            tracing::debug!(
                model = %model,
                finish_reason = ?completion.finish_reason,
                "Completion received"
            );
            Ok(completion)
        }
        Err(e) => {
            metrics::record_completion(&model, e.kind(), elapsed);
            tracing::error!(error = %e, model = %model, "Completion request failed");
            Err(AppError::UpstreamError(anyhow!("OpenAI API failed: {}", e)))
        }
    }
}

async fn append(
    state: &AppState,
    conversation_id: &str,
    new_turns: [Turn; 2],
) -> Result<(), AppError> {
    state
        .store
        .append_turns(conversation_id, &new_turns)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to append turns");
            AppError::DatabaseError(anyhow!("Database update failed: {}", e))
        })
}
