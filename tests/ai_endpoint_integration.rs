//! Integration tests for the AI node against a real HTTP endpoint.
//!
//! Each test spins up an Axum server on a random port that imitates an
//! OpenAI-compatible chat-completions API, then runs full pipelines through
//! `HttpChatProvider`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use mail_router::config::AiConfig;
use mail_router::llm::{self, HttpChatProvider};
use mail_router::pipeline::types::{AiNodeConfig, EmailField, RegexConfig};
use mail_router::pipeline::{
    CategorySnapshot, ClassifyContext, Classifier, DEFAULT_CATEGORY, EmailInput, Node, NodeKind,
    NodeOutcome, Pipeline,
};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const API_KEY: &str = "sk-integration";

/// What the fake endpoint does with each request.
#[derive(Clone, Copy)]
enum Behavior {
    Answer(&'static str),
    Slow,
    ServerError,
    NotJson,
}

#[derive(Clone)]
struct FakeApi {
    behavior: Behavior,
    hits: Arc<AtomicUsize>,
    last_body: Arc<tokio::sync::Mutex<Option<Value>>>,
}

async fn chat_completions(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    api.hits.fetch_add(1, Ordering::SeqCst);
    *api.last_body.lock().await = Some(body);

    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {API_KEY}"));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "missing key".into());
    }

    match api.behavior {
        Behavior::Answer(text) => (
            StatusCode::OK,
            json!({
                "id": "cmpl-1",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": text}, "finish_reason": "stop"}]
            })
            .to_string(),
        ),
        Behavior::Slow => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            (StatusCode::OK, "{}".into())
        }
        Behavior::ServerError => (StatusCode::INTERNAL_SERVER_ERROR, "boom".into()),
        Behavior::NotJson => (StatusCode::OK, "<html>gateway</html>".into()),
    }
}

/// Start the fake API on a random port, return (endpoint URL, state).
async fn start_server(behavior: Behavior) -> (String, FakeApi) {
    let api = FakeApi {
        behavior,
        hits: Arc::new(AtomicUsize::new(0)),
        last_body: Arc::new(tokio::sync::Mutex::new(None)),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(api.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://127.0.0.1:{port}/v1/chat/completions"), api)
}

fn ai_config(endpoint: String) -> AiConfig {
    AiConfig {
        enabled: true,
        endpoint,
        api_key: API_KEY.to_string().into(),
        model: "fake-model".into(),
        timeout_ms: 300,
        max_tokens: 80,
    }
}

fn pipeline() -> Pipeline {
    let mut pipeline = Pipeline::minimal();
    pipeline.nodes.insert(
        1,
        Node::new(
            "ai",
            "AI triage",
            NodeKind::Ai(AiNodeConfig {
                candidate_categories: vec!["c1".into(), "c2".into()],
                custom_prompt: "Sort support mail.".into(),
            }),
        ),
    );
    pipeline.nodes.insert(
        2,
        Node::new(
            "after",
            "Anything",
            NodeKind::Regex(RegexConfig {
                field: EmailField::Subject,
                pattern: ".".into(),
                flags: String::new(),
                category_id: "fallthrough".into(),
            }),
        ),
    );
    pipeline
}

fn categories() -> CategorySnapshot {
    CategorySnapshot::new()
        .with_category("c1", "Billing")
        .with_category("c2", "Support")
}

fn email() -> EmailInput {
    EmailInput {
        from_address: "bob@customer.com".into(),
        from_name: Some("Bob".into()),
        to_address: "help@shop.test".into(),
        subject: "Charged twice".into(),
        body_text: "My card was charged twice.".into(),
    }
}

// ── Classification over HTTP ─────────────────────────────────────────

#[tokio::test]
async fn ai_node_matches_over_http() {
    timeout(TEST_TIMEOUT, async {
        let (endpoint, api) = start_server(Behavior::Answer(" billing ")).await;
        let ai = ai_config(endpoint);
        let lookup = categories();
        let classifier = Classifier::with_http();

        let result = classifier
            .classify(&pipeline(), &email(), ClassifyContext::new(&ai, &lookup), true)
            .await;

        assert_eq!(result.category_id, "c1");
        assert_eq!(result.node_id.as_deref(), Some("ai"));
        assert_eq!(api.hits.load(Ordering::SeqCst), 1);

        let body = api.last_body.lock().await.clone().unwrap();
        assert_eq!(body["model"], "fake-model");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 80);
        assert_eq!(body["messages"][0]["role"], "system");
        let prompt = body["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.starts_with("Sort support mail."));
        assert!(prompt.contains("Billing, Support"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn slow_endpoint_times_out_and_pipeline_continues() {
    timeout(TEST_TIMEOUT, async {
        let (endpoint, _api) = start_server(Behavior::Slow).await;
        let ai = ai_config(endpoint);
        let lookup = categories();
        let classifier = Classifier::with_http();

        let result = classifier
            .classify(&pipeline(), &email(), ClassifyContext::new(&ai, &lookup), true)
            .await;

        assert_eq!(result.node_id.as_deref(), Some("after"));
        let trace = result.trace.unwrap();
        assert_eq!(trace[1].node_id, "ai");
        assert_eq!(trace[1].result, NodeOutcome::Error);
        assert!(trace[1].details.as_deref().unwrap().contains("timed out after 300ms"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn server_error_is_traced() {
    timeout(TEST_TIMEOUT, async {
        let (endpoint, _api) = start_server(Behavior::ServerError).await;
        let ai = ai_config(endpoint);
        let lookup = categories();

        let result = Classifier::with_http()
            .classify(&pipeline(), &email(), ClassifyContext::new(&ai, &lookup), true)
            .await;

        let trace = result.trace.unwrap();
        assert_eq!(trace[1].result, NodeOutcome::Error);
        assert!(trace[1].details.as_deref().unwrap().contains("500"));
        assert_eq!(result.category_id, "fallthrough");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_body_is_traced() {
    timeout(TEST_TIMEOUT, async {
        let (endpoint, _api) = start_server(Behavior::NotJson).await;
        let ai = ai_config(endpoint);
        let lookup = categories();

        let result = Classifier::with_http()
            .classify(&pipeline(), &email(), ClassifyContext::new(&ai, &lookup), true)
            .await;

        let trace = result.trace.unwrap();
        assert_eq!(trace[1].result, NodeOutcome::Error);
        assert!(trace[1].details.as_deref().unwrap().contains("Invalid AI response"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unreachable_endpoint_falls_back_to_default() {
    timeout(TEST_TIMEOUT, async {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let ai = ai_config(format!("http://127.0.0.1:{port}/v1/chat/completions"));
        let lookup = categories();
        let mut pipeline = pipeline();
        pipeline.nodes.retain(|n| n.id != "after");

        let result = Classifier::with_http()
            .classify(&pipeline, &email(), ClassifyContext::new(&ai, &lookup), false)
            .await;

        assert_eq!(result.category_id, DEFAULT_CATEGORY);
        assert_eq!(result.node_id, None);
        assert!(result.trace.is_none());
    })
    .await
    .expect("test timed out");
}

// ── Probe ────────────────────────────────────────────────────────────

#[tokio::test]
async fn probe_reports_latency_and_status() {
    timeout(TEST_TIMEOUT, async {
        let (endpoint, api) = start_server(Behavior::Answer("OK")).await;
        let provider = HttpChatProvider::new();

        let ok = llm::probe(&provider, &ai_config(endpoint.clone())).await;
        assert!(ok.success);
        let body = api.last_body.lock().await.clone().unwrap();
        assert_eq!(body["max_tokens"], 5);
        assert_eq!(body["messages"][0]["content"], "Say OK");

        let mut wrong_key = ai_config(endpoint);
        wrong_key.api_key = "nope".to_string().into();
        let denied = llm::probe(&provider, &wrong_key).await;
        assert!(!denied.success);
        assert!(denied.message.contains("401"));
    })
    .await
    .expect("test timed out");
}
