use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{SecondsFormat, Utc};
use secrecy::ExposeSecret;
use serde_json::json;
use service_core::error::AppError;

pub const SERVICE_NAME: &str = "chat-service";

/// Liveness endpoint; reports configuration presence, never secret values.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "environment": {
            "env": environment
        },
        "config": {
            "hasOpenAI": !state.config.openai.api_key.expose_secret().is_empty(),
            "hasDatabaseUrl": !state.config.mongodb.uri.expose_secret().is_empty(),
            "hasReadDatabaseUrl": state.config.mongodb.read_uri.is_some()
        }
    }))
}

/// Readiness endpoint for K8s readiness probes.
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check failed");
        AppError::ServiceUnavailable
    })?;
    Ok(StatusCode::OK)
}
