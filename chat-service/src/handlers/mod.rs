//! HTTP handlers for the chat service.

pub mod chat;
pub mod conversations;
pub mod debug;
pub mod health;
pub mod metrics;

use anyhow::anyhow;
use axum::http::StatusCode;
use service_core::error::AppError;

/// Answers `OPTIONS` on every route with an empty 200.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Method fallback for every route.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

/// Router fallback for unknown paths.
pub async fn not_found() -> AppError {
    AppError::NotFound(anyhow!("Not found"))
}
