//! Application startup and lifecycle management.

use crate::config::{ChatConfig, CompletionBackend, StoreBackend};
use crate::handlers::{
    chat::send_message,
    conversations::{get_conversation, list_conversations, missing_conversation_id},
    debug::debug_info,
    health::{health_check, readiness_check},
    method_not_allowed, metrics::metrics, not_found, preflight,
};
use crate::services::{
    CompletionProvider, ConversationStore, InMemoryConversationStore, MockCompletionProvider,
    MongoConversationStore, OpenAiCompletionProvider,
};
use axum::{
    http::{header, Method},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
///
/// Clients are built once per process and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: ChatConfig,
    /// Store used by write paths (read-write credential).
    pub store: Arc<dyn ConversationStore>,
    /// Store used by read-only endpoints.
    pub read_store: Arc<dyn ConversationStore>,
    pub completion: Arc<dyn CompletionProvider>,
}

impl AppState {
    /// Build stores and the completion client from configuration.
    pub async fn from_config(config: ChatConfig) -> Result<Self, AppError> {
        let (store, read_store): (Arc<dyn ConversationStore>, Arc<dyn ConversationStore>) =
            match config.mongodb.backend {
                StoreBackend::MongoDb => {
                    let writer = Arc::new(MongoConversationStore::new(
                        config.mongodb.uri.clone(),
                        &config.mongodb.database,
                    ));

                    writer.initialize_indexes().await.map_err(|e| {
                        tracing::error!("Failed to initialize database indexes: {}", e);
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Database initialization failed: {}",
                            e
                        ))
                    })?;

                    let reader: Arc<dyn ConversationStore> = match &config.mongodb.read_uri {
                        Some(read_uri) => Arc::new(MongoConversationStore::new(
                            read_uri.clone(),
                            &config.mongodb.database,
                        )),
                        None => writer.clone(),
                    };

                    tracing::info!(
                        database = %config.mongodb.database,
                        separate_reader = config.mongodb.read_uri.is_some(),
                        "Initialized MongoDB conversation store"
                    );
                    (writer as Arc<dyn ConversationStore>, reader)
                }
                StoreBackend::Memory => {
                    let store: Arc<dyn ConversationStore> =
                        Arc::new(InMemoryConversationStore::new());
                    tracing::info!("Initialized in-memory conversation store");
                    (store.clone(), store)
                }
            };

        let completion: Arc<dyn CompletionProvider> = match config.openai.provider {
            CompletionBackend::OpenAi => {
                let provider = OpenAiCompletionProvider::new(&config.openai)
                    .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e.to_string())))?;
                Arc::new(provider)
            }
            CompletionBackend::Mock => Arc::new(MockCompletionProvider::new()),
        };

        tracing::info!(model = %completion.model(), "Initialized completion provider");

        Ok(Self {
            config,
            store,
            read_store,
            completion,
        })
    }
}

/// Build the HTTP router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(
            "/api/chat",
            post(send_message)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/conversations",
            get(list_conversations)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/conversations/",
            get(missing_conversation_id)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/conversations/:conversation_id",
            get(get_conversation)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/debug",
            get(debug_info)
                .post(debug_info)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/health",
            get(health_check)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/ready",
            get(readiness_check)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/metrics",
            get(metrics).options(preflight).fallback(method_not_allowed),
        )
        .fallback(not_found)
        .layer(cors)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ChatConfig) -> Result<Self, AppError> {
        let state = AppState::from_config(config).await?;
        Self::build_with_state(state).await
    }

    /// Build the application around pre-built state (tests inject stores
    /// and providers this way).
    pub async fn build_with_state(state: AppState) -> Result<Self, AppError> {
        // Port 0 binds a random port for testing
        let http_addr = SocketAddr::from(([0, 0, 0, 0], state.config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", http_addr, e);
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!("Chat service: HTTP on port {}", http_port);

        Ok(Self {
            http_port,
            http_listener,
            state,
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until a shutdown signal arrives.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        axum::serve(self.http_listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                tracing::error!("HTTP server error: {}", e);
                std::io::Error::other(format!("HTTP server error: {}", e))
            })
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
