//! Test utilities for fraudwatch-core
//!
//! This module provides testing infrastructure including a mock
//! OpenAI-compatible streaming server and a notifier that records what it was
//! asked to send.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::models::NotificationEntry;
use crate::notify::Notifier;

#[derive(Default)]
struct MockState {
    fragments: Vec<String>,
    fail_status: Option<u16>,
    requests: Mutex<Vec<Value>>,
    authorization: Mutex<Option<String>>,
}

/// Mock OpenAI-compatible server streaming scripted fragments
pub struct MockOpenAIServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    state: Arc<MockState>,
}

impl MockOpenAIServer {
    /// Start a server that streams `fragments` for every completion request
    pub async fn start(fragments: Vec<&str>) -> Self {
        Self::start_with(MockState {
            fragments: fragments.into_iter().map(String::from).collect(),
            ..MockState::default()
        })
        .await
    }

    /// Start a server that answers every completion request with `status`
    pub async fn start_failing(status: u16) -> Self {
        Self::start_with(MockState {
            fail_status: Some(status),
            ..MockState::default()
        })
        .await
    }

    async fn start_with(state: MockState) -> Self {
        let state = Arc::new(state);
        let app = Router::new()
            .route("/v1/chat/completions", post(handle_chat_completions))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            state,
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Authorization header of the most recent request
    pub fn last_authorization(&self) -> Option<String> {
        self.state.authorization.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOpenAIServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Chat completions endpoint, streaming mode only
async fn handle_chat_completions(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let model = body["model"].as_str().unwrap_or("mock").to_string();
    state.requests.lock().unwrap().push(body);
    *state.authorization.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    if let Some(status) = state.fail_status {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (
            status,
            Json(json!({"error": {"message": "mock failure", "type": "invalid_request_error"}})),
        )
            .into_response();
    }

    // Role-only opener, one chunk per fragment, an empty stop chunk, then [DONE]
    let mut events = vec![chunk(&model, json!({"role": "assistant"}), None)];
    for fragment in &state.fragments {
        events.push(chunk(&model, json!({"content": fragment}), None));
    }
    events.push(chunk(&model, json!({}), Some("stop")));
    events.push(Event::default().data("[DONE]"));

    Sse::new(futures::stream::iter(
        events.into_iter().map(Ok::<_, Infallible>),
    ))
    .into_response()
}

fn chunk(model: &str, delta: Value, finish_reason: Option<&str>) -> Event {
    Event::default().data(
        json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion.chunk",
            "model": model,
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}],
        })
        .to_string(),
    )
}

/// Notifier that records entries instead of sending them
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<NotificationEntry>>>,
    tests: Arc<AtomicUsize>,
    failing_accounts: Arc<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends for these accounts fail with a transport error
    pub fn failing_for(accounts: &[&str]) -> Self {
        Self {
            failing_accounts: Arc::new(accounts.iter().map(|a| a.to_string()).collect()),
            ..Self::default()
        }
    }

    /// Entries delivered, in send order
    pub fn sent(&self) -> Vec<NotificationEntry> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of test messages sent
    pub fn test_count(&self) -> usize {
        self.tests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, entry: &NotificationEntry) -> Result<()> {
        if self.failing_accounts.contains(&entry.account_id) {
            return Err(Error::Transport("mock relay refused the message".into()));
        }
        self.sent.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn send_test(&self) -> Result<()> {
        self.tests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "recording".to_string()
    }
}
