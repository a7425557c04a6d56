//! OpenAI provider against a local fake of the chat completions API.

use axum::{
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chat_service::config::{ChatConfig, CompletionBackend, OpenAiConfig};
use chat_service::models::Turn;
use chat_service::services::providers::{
    CompletionProvider, FinishReason, OpenAiCompletionProvider, ProviderError,
};
use chat_service::services::InMemoryConversationStore;
use chat_service::startup::{AppState, Application};
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

const API_KEY: &str = "sk-test-key";

/// Serve `router` on a random port and return its `/v1` base URL.
async fn spawn_fake_openai(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{}/v1", addr)
}

/// Replies with the last message's content, reversed.
async fn echo_completion(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", API_KEY))
        .unwrap_or(false);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}})),
        );
    }

    assert_eq!(body["n"], 1);
    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    let last = messages
        .last()
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default();
    let reply: String = last.chars().rev().collect();

    (
        StatusCode::OK,
        Json(json!({
            "id": "chatcmpl-1",
            "model": body["model"],
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": reply},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": messages.len(), "completion_tokens": 3, "total_tokens": messages.len() + 3}
        })),
    )
}

fn openai_config(base_url: String, api_key: &str) -> OpenAiConfig {
    OpenAiConfig {
        api_key: Secret::new(api_key.to_string()),
        base_url,
        model: "gpt-3.5-turbo".to_string(),
        timeout_secs: 5,
        provider: CompletionBackend::OpenAi,
    }
}

#[tokio::test]
async fn completion_returns_first_choice_and_usage() {
    let base_url =
        spawn_fake_openai(Router::new().route("/v1/chat/completions", post(echo_completion))).await;
    let provider = OpenAiCompletionProvider::new(&openai_config(base_url, API_KEY)).unwrap();

    let completion = provider
        .complete(&[Turn::system("be brief"), Turn::user("hello")])
        .await
        .unwrap();

    assert_eq!(completion.text, "olleh");
    assert_eq!(completion.input_tokens, 2);
    assert_eq!(completion.output_tokens, 3);
    assert_eq!(completion.finish_reason, FinishReason::Complete);
}

#[tokio::test]
async fn api_error_surfaces_upstream_message() {
    let base_url =
        spawn_fake_openai(Router::new().route("/v1/chat/completions", post(echo_completion))).await;
    let provider = OpenAiCompletionProvider::new(&openai_config(base_url, "sk-wrong")).unwrap();

    let err = provider.complete(&[Turn::user("hello")]).await.unwrap_err();

    assert!(matches!(err, ProviderError::ApiError(_)));
    assert_eq!(err.to_string(), "401 Incorrect API key provided");
}

#[tokio::test]
async fn rate_limit_is_reported_separately() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": {"message": "Rate limit reached"}})),
            )
        }),
    );
    let base_url = spawn_fake_openai(router).await;
    let provider = OpenAiCompletionProvider::new(&openai_config(base_url, API_KEY)).unwrap();

    let err = provider.complete(&[Turn::user("hello")]).await.unwrap_err();

    assert!(matches!(err, ProviderError::RateLimited(ref m) if m == "Rate limit reached"));
}

#[tokio::test]
async fn reply_without_text_is_a_failure() {
    let router = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            Json(json!({
                "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "content_filter"}]
            }))
        }),
    );
    let base_url = spawn_fake_openai(router).await;
    let provider = OpenAiCompletionProvider::new(&openai_config(base_url, API_KEY)).unwrap();

    let err = provider.complete(&[Turn::user("hello")]).await.unwrap_err();

    assert!(matches!(err, ProviderError::EmptyResponse));
}

#[tokio::test]
async fn unreachable_upstream_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let provider =
        OpenAiCompletionProvider::new(&openai_config(format!("http://{}/v1", addr), API_KEY))
            .unwrap();

    let err = provider.complete(&[Turn::user("hello")]).await.unwrap_err();

    assert!(matches!(err, ProviderError::NetworkError(_)));
}

#[tokio::test]
async fn chat_endpoint_round_trips_through_openai_provider() {
    let base_url =
        spawn_fake_openai(Router::new().route("/v1/chat/completions", post(echo_completion))).await;

    let mut config = ChatConfig::in_memory();
    config.openai = openai_config(base_url, API_KEY);
    let provider = Arc::new(OpenAiCompletionProvider::new(&config.openai).unwrap());
    let store = Arc::new(InMemoryConversationStore::new());
    let state = AppState {
        config,
        store: store.clone(),
        read_store: store.clone(),
        completion: provider,
    };

    let app = Application::build_with_state(state).await.unwrap();
    let address = format!("http://127.0.0.1:{}", app.http_port());
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/chat", address))
        .json(&json!({"message": "abc", "conversationId": "c1"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["response"], "cba");

    let response = client
        .get(format!("{}/api/conversations/c1", address))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["conversation"]["messages"].as_array().unwrap().len(), 3);
    assert_eq!(body["conversation"]["messages"][2]["content"], "cba");
}
