//! `OpenAiClient` against an in-process stand-in for the completion endpoint.

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use trade_sql_bot::chat::QueryTranslator;
use trade_sql_bot::client::{ChatMessage, ClientError, CompletionClient, OpenAiClient};
use trade_sql_bot::prompt::PromptTemplate;
use trade_sql_bot::types::LlmConfig;

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    reply: &'static str,
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn completions(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    stub.requests.lock().unwrap().push((auth, body));

    if !stub.status.is_success() {
        return (stub.status, "upstream unavailable").into_response();
    }
    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": stub.reply},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

async fn spawn_stub(status: StatusCode, reply: &'static str) -> (String, Stub) {
    let stub = Stub {
        status,
        reply,
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(stub.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1"), stub)
}

fn config(base_url: String, max_retries: u32) -> LlmConfig {
    LlmConfig {
        base_url,
        api_key: Some("sk-test".to_string()),
        max_retries,
        ..LlmConfig::default()
    }
}

#[tokio::test]
async fn translator_makes_exactly_one_request_and_returns_content() {
    let reply = "SELECT COUNT(*) FROM trades WHERE symbol='AAPL'";
    let (base_url, stub) = spawn_stub(StatusCode::OK, reply).await;
    let client = Arc::new(OpenAiClient::new(&config(base_url, 2)).unwrap());
    let translator = QueryTranslator::new(client, Arc::new(PromptTemplate::builtin_sql()));

    let sql = translator
        .translate("How many AAPL trades are there?")
        .await
        .unwrap();
    assert_eq!(sql, reply);

    let requests = stub.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["max_tokens"], 256);
    assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    assert!((body["top_p"].as_f64().unwrap() - 1.0).abs() < 1e-6);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(
        messages[1]["content"],
        "User query: How many AAPL trades are there?\nSQL query:"
    );
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (base_url, stub) = spawn_stub(StatusCode::UNAUTHORIZED, "").await;
    let client = OpenAiClient::new(&config(base_url, 3)).unwrap();

    let err = client
        .complete(&[ChatMessage::user("hi")])
        .await
        .unwrap_err();
    match err {
        ClientError::HttpStatus { status, .. } => assert_eq!(status.as_u16(), 401),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(stub.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn server_errors_propagate_without_retry_budget() {
    let (base_url, stub) = spawn_stub(StatusCode::SERVICE_UNAVAILABLE, "").await;
    let client = OpenAiClient::new(&config(base_url, 0)).unwrap();

    let err = client
        .complete(&[ChatMessage::user("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::HttpStatus { .. }));
    assert_eq!(stub.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn server_errors_are_retried_within_budget() {
    let (base_url, stub) = spawn_stub(StatusCode::INTERNAL_SERVER_ERROR, "").await;
    let client = OpenAiClient::new(&config(base_url, 1)).unwrap();

    assert!(client.complete(&[ChatMessage::user("hi")]).await.is_err());
    assert_eq!(stub.requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::OK, "<html>gateway page</html>") }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let client = OpenAiClient::new(&config(format!("http://{addr}/v1"), 0)).unwrap();

    let err = client
        .complete(&[ChatMessage::user("hi")])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::SerdeJson(_)), "got {err:?}");
}
