//! Copilot chat handlers - natural-language questions answered with SQL
//!
//! Each session keeps its own conversation and, optionally, the LLM API key
//! the user supplied for it. Both live in memory only and disappear when the
//! session expires or is deleted.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::{AppError, AppState};
use fraudwatch_core::models::ChatTurn;
use fraudwatch_core::{Conversation, TurnEvent, TurnFailure, TurnOutcome};

/// Session timeout (30 minutes of inactivity)
const SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Maximum messages to keep in history (to limit memory per session)
const MAX_HISTORY_MESSAGES: usize = 20;

/// A chat session with conversation history
#[derive(Clone)]
pub struct ChatSession {
    pub created_at: Instant,
    pub last_activity: Instant,
    pub conversation: Conversation,
    /// LLM key supplied for this session
    api_key: Option<String>,
    /// Held for the whole of a turn so turns on one session never overlap
    turn_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("created_at", &self.created_at)
            .field("last_activity", &self.last_activity)
            .field("messages", &self.conversation.len())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ChatSession {
    fn new(api_key: Option<String>) -> Self {
        Self {
            created_at: Instant::now(),
            last_activity: Instant::now(),
            conversation: Conversation::new(),
            api_key,
            turn_lock: Arc::new(Mutex::new(())),
        }
    }

    fn is_expired(&self) -> bool {
        self.last_activity.elapsed() > SESSION_TIMEOUT
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn set_conversation(&mut self, mut conversation: Conversation) {
        conversation.truncate_front(MAX_HISTORY_MESSAGES);
        self.conversation = conversation;
        self.touch();
    }
}

/// In-memory session manager
#[derive(Debug, Default)]
pub struct ChatSessionManager {
    sessions: RwLock<HashMap<String, ChatSession>>,
    counter: AtomicU64,
}

impl ChatSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new session and return its ID
    pub async fn create_session(&self, api_key: Option<&str>) -> String {
        // Unique id from timestamp + counter
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(timestamp.to_le_bytes());
        hasher.update(count.to_le_bytes());
        let session_id = format!("chat_{:x}", hasher.finalize())[..21].to_string();

        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from);

        let mut sessions = self.sessions.write().await;

        // Clean up expired sessions while we're here
        sessions.retain(|_, s| !s.is_expired());

        sessions.insert(session_id.clone(), ChatSession::new(api_key));
        session_id
    }

    /// Conversation and key of a live session
    pub async fn get(&self, session_id: &str) -> Option<(Conversation, Option<String>)> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .filter(|s| !s.is_expired())
            .map(|s| (s.conversation.clone(), s.api_key.clone()))
    }

    /// Wait until the session is free to run a turn
    ///
    /// Waiters are served in arrival order. Returns None for an unknown or
    /// expired session.
    pub async fn begin_turn(&self, session_id: &str) -> Option<OwnedMutexGuard<()>> {
        let lock = {
            let sessions = self.sessions.read().await;
            sessions
                .get(session_id)
                .filter(|s| !s.is_expired())
                .map(|s| s.turn_lock.clone())?
        };
        Some(lock.lock_owned().await)
    }

    /// Store a session's conversation after a turn
    pub async fn update_conversation(&self, session_id: &str, conversation: Conversation) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            session.set_conversation(conversation);
        }
    }

    /// Delete a session (clears the chat and forgets the key)
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id).is_some()
    }

    /// Get session info
    pub async fn get_session_info(&self, session_id: &str) -> Option<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .filter(|s| !s.is_expired())
            .map(|s| SessionInfo {
                session_id: session_id.to_string(),
                message_count: s.conversation.len(),
                has_api_key: s.api_key.is_some(),
                created_at_secs_ago: s.created_at.elapsed().as_secs(),
                last_activity_secs_ago: s.last_activity.elapsed().as_secs(),
                history: s.conversation.turns().to_vec(),
            })
    }
}

/// Request to create a chat session
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// LLM API key for this session only
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Session info response
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub message_count: usize,
    pub has_api_key: bool,
    pub created_at_secs_ago: u64,
    pub last_activity_secs_ago: u64,
    pub history: Vec<ChatTurn>,
}

/// A question for the copilot
#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub question: String,
    /// Session to continue (a new one is created when absent)
    #[serde(default)]
    pub session_id: Option<String>,
    /// Key for this request, taking precedence over the session's
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Response for one copilot turn
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub question: String,
    pub sql: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub explanation: Option<String>,
    /// Stage and message when the turn failed
    pub error: Option<TurnFailure>,
    pub history: Vec<ChatTurn>,
    pub processing_time_ms: u64,
}

impl ChatResponse {
    fn new(session_id: String, outcome: TurnOutcome, history: &Conversation, start: Instant) -> Self {
        let (columns, rows) = outcome
            .result
            .map(|r| (r.columns, r.rows))
            .unwrap_or_default();
        Self {
            session_id,
            question: outcome.question,
            sql: outcome.sql,
            columns,
            rows,
            explanation: outcome.explanation,
            error: outcome.error,
            history: history.turns().to_vec(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// POST /api/chat/session - Create a new chat session
pub async fn create_chat_session(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<CreateSessionRequest>>,
) -> Result<Json<SessionInfo>, AppError> {
    let request = payload.map(|Json(p)| p).unwrap_or_default();
    let session_id = state
        .chat_sessions
        .create_session(request.api_key.as_deref())
        .await;

    debug!(session_id = %session_id, "Created chat session");

    let info = state
        .chat_sessions
        .get_session_info(&session_id)
        .await
        .ok_or_else(|| AppError::internal("Session vanished after creation"))?;
    Ok(Json(info))
}

/// DELETE /api/chat/session/:id - Clear a chat session
pub async fn delete_chat_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let deleted = state.chat_sessions.delete_session(&session_id).await;

    debug!(session_id = %session_id, deleted = deleted, "Deleted chat session");

    Ok(Json(json!({ "deleted": deleted })))
}

/// GET /api/chat/session/:id - Get session info and history
pub async fn get_chat_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInfo>, AppError> {
    let info = state
        .chat_sessions
        .get_session_info(&session_id)
        .await
        .ok_or_else(|| AppError::not_found("Session not found or expired"))?;

    Ok(Json(info))
}

/// A session claimed for one turn; the slot is released on drop
struct OpenTurn {
    session_id: String,
    conversation: Conversation,
    api_key: Option<String>,
    _slot: OwnedMutexGuard<()>,
}

/// Resolve the session for a query, creating one when none was named
///
/// Waits for any turn already running on the session, so the history read
/// here is the one this turn's result is written back over.
async fn open_session(state: &AppState, payload: &ChatQuery) -> Result<OpenTurn, AppError> {
    if payload.question.trim().is_empty() {
        return Err(AppError::bad_request("Question must not be empty"));
    }

    let session_id = match &payload.session_id {
        Some(id) => id.clone(),
        None => {
            state
                .chat_sessions
                .create_session(payload.api_key.as_deref())
                .await
        }
    };

    let slot = state
        .chat_sessions
        .begin_turn(&session_id)
        .await
        .ok_or_else(|| AppError::not_found("Session not found or expired"))?;

    let (conversation, session_key) = state
        .chat_sessions
        .get(&session_id)
        .await
        .ok_or_else(|| AppError::not_found("Session not found or expired"))?;

    let api_key = payload
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or(session_key);

    Ok(OpenTurn {
        session_id,
        conversation,
        api_key,
        _slot: slot,
    })
}

/// POST /api/chat/query - Run one copilot turn
///
/// Pipeline failures are not HTTP errors: they come back in `error` and are
/// recorded in the history like any other assistant message.
pub async fn query_chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatQuery>,
) -> Result<Json<ChatResponse>, AppError> {
    let start = Instant::now();
    let turn = open_session(&state, &payload).await?;
    let copilot = state.copilot(turn.api_key.as_deref())?;
    let session_id = turn.session_id.clone();

    debug!(
        session_id = %session_id,
        history_len = turn.conversation.len(),
        "Processing chat query"
    );

    let (conversation, outcome) = copilot
        .handle_turn(turn.conversation.clone(), &payload.question, |_| {})
        .await;

    state
        .chat_sessions
        .update_conversation(&session_id, conversation.clone())
        .await;
    drop(turn);

    info!(
        session_id = %session_id,
        success = outcome.is_success(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Chat query completed"
    );

    Ok(Json(ChatResponse::new(
        session_id,
        outcome,
        &conversation,
        start,
    )))
}

/// POST /api/chat/stream - Run one copilot turn as server-sent events
///
/// Events: `sql_partial`, `sql`, `result`, `explanation_partial`,
/// `explanation`, `error`, then always `done` with the updated history.
pub async fn stream_chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let turn = open_session(&state, &payload).await?;
    let copilot = state.copilot(turn.api_key.as_deref())?;

    let (tx, rx) = mpsc::unbounded_channel::<Event>();

    tokio::spawn(async move {
        let events = tx.clone();
        let session_id = turn.session_id.clone();
        let (conversation, outcome) = copilot
            .handle_turn(turn.conversation.clone(), &payload.question, move |event| {
                let _ = events.send(turn_event(event));
            })
            .await;

        state
            .chat_sessions
            .update_conversation(&session_id, conversation.clone())
            .await;
        drop(turn);

        debug!(
            session_id = %session_id,
            success = outcome.is_success(),
            "Chat stream completed"
        );

        let done = json!({
            "session_id": session_id,
            "success": outcome.is_success(),
            "history": conversation.turns(),
        });
        let _ = tx.send(Event::default().event("done").data(done.to_string()));
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok(event), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Encode a turn event; payloads are JSON so multi-line SQL survives framing
fn turn_event(event: TurnEvent) -> Event {
    let (name, data) = match event {
        TurnEvent::SqlPartial(sql) => ("sql_partial", json!({ "sql": sql })),
        TurnEvent::Sql(sql) => ("sql", json!({ "sql": sql })),
        TurnEvent::Result(result) => (
            "result",
            json!({ "columns": result.columns, "rows": result.rows }),
        ),
        TurnEvent::ExplanationPartial(text) => ("explanation_partial", json!({ "text": text })),
        TurnEvent::Explanation(text) => ("explanation", json!({ "text": text })),
        TurnEvent::Failed { stage, message } => (
            "error",
            json!({
                "stage": stage,
                "label": stage.failure_label(),
                "message": message,
            }),
        ),
    };
    Event::default().event(name).data(data.to_string())
}
