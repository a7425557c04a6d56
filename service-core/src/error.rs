use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Whether error responses may carry diagnostic `details`.
static EXPOSE_DETAILS: AtomicBool = AtomicBool::new(false);

/// Enable or disable diagnostic detail in error responses.
///
/// Set once at startup from the service's debug flag.
pub fn set_expose_details(enabled: bool) {
    EXPOSE_DETAILS.store(enabled, Ordering::Relaxed);
}

pub fn expose_details() -> bool {
    EXPOSE_DETAILS.load(Ordering::Relaxed)
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Upstream error: {0}")]
    UpstreamError(anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UpstreamError(_)
            | AppError::DatabaseError(_)
            | AppError::InternalError(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the error, attaching the full cause chain as `details` when
    /// `expose` is set.
    fn render(self, expose: bool) -> Response {
        let status = self.status_code();

        // `error` carries the outermost message only; causes go to `details`.
        let (error_message, details) = match self {
            AppError::BadRequest(err) | AppError::NotFound(err) => (err.to_string(), None),
            AppError::MethodNotAllowed => ("Method not allowed".to_string(), None),
            AppError::ServiceUnavailable => ("Service unavailable".to_string(), None),
            AppError::UpstreamError(err) | AppError::DatabaseError(err) => {
                (err.to_string(), Some(format!("{:?}", err)))
            }
            AppError::InternalError(err) => (
                "Failed to process request".to_string(),
                Some(format!("{:?}", err)),
            ),
            AppError::ConfigError(err) => (
                "Configuration error".to_string(),
                Some(format!("{:?}", err)),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                details: details.filter(|_| expose),
            }),
        )
            .into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.render(expose_details())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn bad_request_uses_message_as_error() {
        let response =
            AppError::BadRequest(anyhow!("Missing message or conversationId")).render(true);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Missing message or conversationId");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn internal_error_hides_details_unless_exposed() {
        let hidden = AppError::InternalError(anyhow!("socket closed")).render(false);
        assert_eq!(hidden.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(hidden).await;
        assert_eq!(body["error"], "Failed to process request");
        assert!(body.get("details").is_none());

        let shown = AppError::InternalError(anyhow!("socket closed")).render(true);
        let body = body_json(shown).await;
        assert!(body["details"].as_str().unwrap().contains("socket closed"));
    }

    #[tokio::test]
    async fn database_error_keeps_context_and_chains_cause_into_details() {
        let err = anyhow!("connection reset").context("Database fetch failed");
        let response = AppError::DatabaseError(err).render(true);

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Database fetch failed");
        assert!(body["details"].as_str().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn method_not_allowed_maps_to_405() {
        let response = AppError::MethodNotAllowed.render(false);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Method not allowed");
    }
}
