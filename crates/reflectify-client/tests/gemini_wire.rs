//! Wire-level tests for `GeminiClient` against a local stand-in server.
//!
//! Each test starts its own axum server on an ephemeral port that answers
//! every request with a canned status and body, and records what it received.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Router;
use serde_json::Value;

use reflectify_client::{ClientError, GeminiClient, TextGenerator};
use reflectify_core::GenerationOptions;

// =============================================================================
// Helpers
// =============================================================================

#[derive(Debug, Clone)]
struct Seen {
    path: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct FakeGemini {
    status: StatusCode,
    body: String,
    delay: Option<Duration>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

async fn handle(
    State(fake): State<FakeGemini>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    fake.seen.lock().unwrap().push(Seen {
        path: uri.path().to_string(),
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_str(&body).unwrap_or(Value::Null),
    });
    if let Some(delay) = fake.delay {
        tokio::time::sleep(delay).await;
    }
    (fake.status, fake.body.clone())
}

/// Start a stand-in server; returns its generateContent URL and request log.
async fn start_server(
    status: StatusCode,
    body: &str,
    delay: Option<Duration>,
) -> (String, Arc<Mutex<Vec<Seen>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let fake = FakeGemini {
        status,
        body: body.to_string(),
        delay,
        seen: Arc::clone(&seen),
    };
    let app = Router::new().fallback(handle).with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (
        format!("http://{}/v1beta/models/test-model:generateContent", addr),
        seen,
    )
}

/// Log sink shared with a `fmt` subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

const SUCCESS_BODY: &str =
    r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"That sounds hard..."}]},"finishReason":"STOP"}]}"#;

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_success_returns_candidate_text() {
    let (url, _) = start_server(StatusCode::OK, SUCCESS_BODY, None).await;
    let client = GeminiClient::new(url, "test-key", Some(Duration::from_secs(5))).unwrap();

    let reply = client
        .generate("I had a rough day", &GenerationOptions::CONVERSATIONAL)
        .await
        .unwrap();
    assert_eq!(reply, "That sounds hard...");
}

#[tokio::test]
async fn test_request_carries_prompt_options_and_key() {
    let (url, seen) = start_server(StatusCode::OK, SUCCESS_BODY, None).await;
    let client = GeminiClient::new(url, "test-key", None).unwrap();

    client
        .generate("analyze me", &GenerationOptions::ANALYSIS)
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let request = &seen[0];
    assert_eq!(request.path, "/v1beta/models/test-model:generateContent");
    assert_eq!(request.api_key.as_deref(), Some("test-key"));
    assert_eq!(request.body["contents"][0]["parts"][0]["text"], "analyze me");
    assert_eq!(request.body["generationConfig"]["maxOutputTokens"], 1024);
    assert_eq!(request.body["generationConfig"]["topK"], 40);
    let temperature = request.body["generationConfig"]["temperature"]
        .as_f64()
        .unwrap();
    assert!((temperature - 0.2).abs() < 1e-6);
}

#[tokio::test]
async fn test_error_status_is_reported_with_code() {
    let (url, _) = start_server(
        StatusCode::SERVICE_UNAVAILABLE,
        r#"{"error":{"message":"overloaded"}}"#,
        None,
    )
    .await;
    let client = GeminiClient::new(url, "test-key", None).unwrap();

    match client
        .generate("hello", &GenerationOptions::CONVERSATIONAL)
        .await
    {
        Err(ClientError::Status { status, body }) => {
            assert_eq!(status, 503);
            assert!(body.contains("overloaded"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_envelope_on_success_status_is_service_error() {
    let (url, _) = start_server(
        StatusCode::OK,
        r#"{"error":{"code":400,"message":"API key not valid"}}"#,
        None,
    )
    .await;
    let client = GeminiClient::new(url, "bad-key", None).unwrap();

    let err = client
        .generate("hello", &GenerationOptions::CONVERSATIONAL)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Service(ref m) if m == "API key not valid"));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_non_json_success_body_is_service_error() {
    let (url, _) = start_server(StatusCode::OK, "not json at all", None).await;
    let client = GeminiClient::new(url, "test-key", None).unwrap();

    let err = client
        .generate("hello", &GenerationOptions::CONVERSATIONAL)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Service(_)));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind and drop to obtain a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{}/v1beta/models/test-model:generateContent", addr);
    let client = GeminiClient::new(url, "test-key", Some(Duration::from_secs(2))).unwrap();

    let err = client
        .generate("hello", &GenerationOptions::CONVERSATIONAL)
        .await
        .unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let (url, _) = start_server(
        StatusCode::OK,
        SUCCESS_BODY,
        Some(Duration::from_millis(500)),
    )
    .await;
    let client = GeminiClient::new(url, "test-key", Some(Duration::from_millis(50))).unwrap();

    let err = client
        .generate("hello", &GenerationOptions::CONVERSATIONAL)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
}

#[tokio::test]
async fn test_error_body_stays_out_of_warn_logs() {
    let (url, _) = start_server(
        StatusCode::BAD_REQUEST,
        r#"{"error":{"message":"Invalid value at contents[0]: my boss yelled at me"}}"#,
        None,
    )
    .await;
    let client = GeminiClient::new(url, "test-key", None).unwrap();

    let logs = CapturedLogs::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || sink.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let err = client
        .generate("my boss yelled at me", &GenerationOptions::CONVERSATIONAL)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Status { status: 400, .. }));

    let text = logs.text();
    assert!(text.contains("Gemini returned an error status"));
    assert!(text.contains("status=400"));
    assert!(!text.contains("boss yelled"));
}
