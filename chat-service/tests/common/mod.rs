#![allow(dead_code)]

use async_trait::async_trait;
use chat_service::config::ChatConfig;
use chat_service::models::{Conversation, Turn};
use chat_service::services::{
    ConversationStore, InMemoryConversationStore, MockCompletionProvider, StoreError,
};
use chat_service::startup::{build_router, AppState, Application};
use axum::Router;
use std::sync::Arc;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: reqwest::Client,
    pub store: Arc<InMemoryConversationStore>,
    pub provider: Arc<MockCompletionProvider>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_provider(MockCompletionProvider::new()).await
    }

    pub async fn spawn_with_provider(provider: MockCompletionProvider) -> Self {
        let store = Arc::new(InMemoryConversationStore::new());
        let provider = Arc::new(provider);
        let state = state_with(store.clone(), provider.clone());

        Self::spawn_with_state(state, store, provider).await
    }

    pub async fn spawn_with_state(
        state: AppState,
        store: Arc<InMemoryConversationStore>,
        provider: Arc<MockCompletionProvider>,
    ) -> Self {
        let app = Application::build_with_state(state)
            .await
            .expect("Failed to build test application");

        let port = app.http_port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/api/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            client,
            store,
            provider,
        }
    }

    pub async fn post_chat(&self, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/chat", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_raw(&self, path: &str, body: &'static str) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// State backed by the given in-memory store and mock provider.
pub fn state_with(
    store: Arc<InMemoryConversationStore>,
    provider: Arc<MockCompletionProvider>,
) -> AppState {
    AppState {
        config: ChatConfig::in_memory(),
        store: store.clone(),
        read_store: store,
        completion: provider,
    }
}

/// Router over a fresh in-memory store, for `oneshot` tests.
pub fn test_router() -> (Router, Arc<InMemoryConversationStore>) {
    let store = Arc::new(InMemoryConversationStore::new());
    let state = state_with(store.clone(), Arc::new(MockCompletionProvider::new()));
    (build_router(state), store)
}

/// Router whose stores fail at the given step.
pub fn failing_router(failure: Failure) -> Router {
    failing_router_with_store(failure).0
}

/// Same as [`failing_router`], also returning the store for seeding and
/// inspection.
pub fn failing_router_with_store(failure: Failure) -> (Router, Arc<FailingStore>) {
    let failing = Arc::new(FailingStore::new(failure));
    let store: Arc<dyn ConversationStore> = failing.clone();
    let router = build_router(AppState {
        config: ChatConfig::in_memory(),
        store: store.clone(),
        read_store: store,
        completion: Arc::new(MockCompletionProvider::new()),
    });
    (router, failing)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Reads fail.
    Read,
    /// Reads report not-found; inserts fail.
    Insert,
    /// Reads and inserts go to the backing store; appends fail.
    Append,
    /// Reads report not-found, inserts report a duplicate; appends fail.
    DuplicateThenAppend,
}

/// Store that fails at a chosen step, backed by an in-memory store for the
/// steps that succeed.
pub struct FailingStore {
    failure: Failure,
    inner: InMemoryConversationStore,
}

impl FailingStore {
    pub fn new(failure: Failure) -> Self {
        Self {
            failure,
            inner: InMemoryConversationStore::new(),
        }
    }

    /// Insert directly into the backing store.
    pub async fn seed(&self, conversation: &Conversation) {
        self.inner
            .insert(conversation)
            .await
            .expect("Failed to seed conversation");
    }
}

#[async_trait]
impl ConversationStore for FailingStore {
    async fn find(&self, conversation_id: &str) -> Result<Conversation, StoreError> {
        match self.failure {
            Failure::Read => Err(StoreError::Backend("connection refused".to_string())),
            Failure::Insert | Failure::DuplicateThenAppend => {
                Err(StoreError::NotFound(conversation_id.to_string()))
            }
            Failure::Append => self.inner.find(conversation_id).await,
        }
    }

    async fn list(&self) -> Result<Vec<Conversation>, StoreError> {
        match self.failure {
            Failure::Append => self.inner.list().await,
            _ => Err(StoreError::Backend("connection refused".to_string())),
        }
    }

    async fn insert(&self, conversation: &Conversation) -> Result<(), StoreError> {
        match self.failure {
            Failure::Append => self.inner.insert(conversation).await,
            Failure::DuplicateThenAppend => Err(StoreError::Duplicate(
                conversation.conversation_id.clone(),
            )),
            _ => Err(StoreError::Backend("write concern failed".to_string())),
        }
    }

    async fn append_turns(&self, _id: &str, _turns: &[Turn]) -> Result<(), StoreError> {
        Err(StoreError::Backend("write concern failed".to_string()))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
