//! FraudWatch Web Server
//!
//! Axum-based REST API for the fraud monitoring dashboard: KPIs, accounts,
//! alerts, the notification queue, the transaction simulator and the SQL
//! copilot (plain JSON or streamed as server-sent events).
//!
//! Security features:
//! - API key bearer authentication (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Copilot SQL is read-only checked before it reaches the database
//! - LLM keys supplied per chat session stay in memory
//! - Sanitized error responses

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use fraudwatch_core::db::Database;
use fraudwatch_core::llm::{BackendKind, CompletionBackend};
use fraudwatch_core::prompts::default_prompts_dir;
use fraudwatch_core::{Copilot, LlmClient, LlmConfig, Mailer, Notifier, PromptLibrary, WorkerConfig};

mod handlers;
mod scheduler;

pub use handlers::ChatSessionManager;
pub use scheduler::{start_notification_worker, WorkerHandle};

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only in production)
    pub allowed_origins: Vec<String>,
    /// API keys accepted as `Authorization: Bearer <key>`
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

impl ServerConfig {
    /// Read `FRAUDWATCH_API_KEYS` and `FRAUDWATCH_CORS_ORIGINS` (comma separated)
    pub fn from_env() -> Self {
        Self {
            require_auth: true,
            allowed_origins: split_list(std::env::var("FRAUDWATCH_CORS_ORIGINS").ok()),
            api_keys: split_list(std::env::var("FRAUDWATCH_API_KEYS").ok()),
        }
    }
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    pub config: ServerConfig,
    /// LLM settings; the API key may be replaced per chat session
    pub llm: LlmConfig,
    /// Fixed client used instead of `llm` (tests, offline demos)
    pub llm_override: Option<LlmClient>,
    /// Prompt override directory (None = embedded prompts only)
    pub prompts_dir: Option<PathBuf>,
    /// Delivers "send latest notification" and test emails
    pub mailer: Arc<dyn Notifier>,
    /// In-memory chat sessions
    pub chat_sessions: ChatSessionManager,
}

impl AppState {
    /// Copilot for one request, using the session key when one was given
    pub fn copilot(&self, api_key: Option<&str>) -> Result<Copilot, AppError> {
        let llm = match &self.llm_override {
            Some(client) => client.clone(),
            None => LlmClient::from_config(&self.llm.with_api_key(api_key))
                .map_err(AppError::from_core)?,
        };

        let mut prompts = match &self.prompts_dir {
            Some(dir) => PromptLibrary::with_override_dir(dir.clone()),
            None => PromptLibrary::embedded_only(),
        };

        Copilot::with_prompts(self.db.clone(), llm, &mut prompts).map_err(|e| {
            error!("Failed to load copilot prompts: {}", e);
            AppError::internal("Failed to load copilot prompts")
        })
    }
}

/// Optional pieces of state, for tests and embedding
#[derive(Default)]
pub struct AppOptions {
    /// LLM settings (default: read from the environment)
    pub llm: Option<LlmConfig>,
    /// Fixed LLM client, bypassing `llm`
    pub llm_client: Option<LlmClient>,
    /// Mailer (default: SMTP from the environment, console when unset)
    pub mailer: Option<Arc<dyn Notifier>>,
    /// Prompt override directory (default: the user's prompt directory)
    pub prompts_dir: Option<PathBuf>,
}

/// Authentication middleware - validates API keys
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    if let Some(auth_header) = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(api_key) = auth_header.strip_prefix("Bearer ") {
            if validate_api_key(api_key, &state.config.api_keys) {
                return next.run(request).await;
            }
            warn!(path = %request.uri().path(), "Invalid API key");
        }
    }

    warn!(path = %request.uri().path(), "Unauthenticated request rejected");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "Authentication required" })),
    )
        .into_response()
}

/// Validate an API key against the list of valid keys using constant-time comparison
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    for key in valid_keys {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len() && provided_bytes.ct_eq(key_bytes).into() {
            return true;
        }
    }
    false
}

/// Simple success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Mailer described by the environment, falling back to log output
pub fn mailer_from_env() -> Arc<dyn Notifier> {
    match Mailer::smtp_from_env() {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            info!("ℹ️  SMTP not configured ({}), alert emails will be logged only", e);
            Arc::new(Mailer::console())
        }
    }
}

/// Create the application router
pub fn create_router(db: Database, static_dir: Option<&str>, config: ServerConfig) -> Router {
    create_router_with_options(db, static_dir, config, AppOptions::default())
}

/// Create the application router with additional options (for testing)
pub fn create_router_with_options(
    db: Database,
    static_dir: Option<&str>,
    config: ServerConfig,
    options: AppOptions,
) -> Router {
    let llm = options.llm.unwrap_or_else(LlmConfig::from_env);
    if let Some(ref client) = options.llm_client {
        info!("LLM backend fixed: {} (model: {})", client.host(), client.model());
    } else if llm.backend == BackendKind::Mock {
        info!("LLM backend: offline mock");
    } else if llm.has_api_key() {
        info!("LLM backend configured: {} (model: {})", llm.host, llm.model);
    } else {
        info!(
            "ℹ️  No GROQ_API_KEY set; chat sessions must supply an API key ({})",
            llm.host
        );
    }

    let mailer = options.mailer.unwrap_or_else(mailer_from_env);
    info!("Notification mailer: {}", mailer.describe());

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        llm,
        llm_override: options.llm_client,
        prompts_dir: options.prompts_dir.or_else(default_prompts_dir),
        mailer,
        chat_sessions: ChatSessionManager::new(),
    });

    let api_routes = Router::new()
        // Dashboard
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/accounts", get(handlers::list_accounts))
        .route("/accounts/active", get(handlers::list_active_accounts))
        .route("/alerts", get(handlers::list_alerts))
        // Notification queue
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/latest/email",
            post(handlers::email_latest_notification),
        )
        .route("/notifications/test-email", post(handlers::send_test_email))
        // Transaction simulator
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::simulate_transaction),
        )
        // Copilot chat (session-scoped conversations)
        .route("/chat/session", post(handlers::create_chat_session))
        .route(
            "/chat/session/:id",
            get(handlers::get_chat_session).delete(handlers::delete_chat_session),
        )
        .route("/chat/query", post(handlers::query_chat))
        .route("/chat/stream", post(handlers::stream_chat));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // CSP: same-origin scripts, inline styles for the dashboard, data: images
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve static files if directory provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
) -> anyhow::Result<()> {
    serve_with_config(db, host, port, static_dir, ServerConfig::default(), None).await
}

/// Start the server with custom configuration
///
/// With `worker` set, the notification worker runs in-process and is stopped
/// after the server shuts down.
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
    worker: Option<WorkerConfig>,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    } else if config.api_keys.is_empty() {
        warn!("⚠️  Authentication required but no FRAUDWATCH_API_KEYS set; every API call will be rejected");
    }

    let mailer = mailer_from_env();
    let worker_handle = worker.map(|worker_config| {
        start_notification_worker(db.clone(), mailer.clone(), worker_config)
    });

    let options = AppOptions {
        mailer: Some(mailer),
        ..AppOptions::default()
    };
    let app = create_router_with_options(db, static_dir, config, options);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = worker_handle {
        handle.stop().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_gateway(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map a core error, exposing only messages about the caller's input
    pub fn from_core(err: fraudwatch_core::Error) -> Self {
        use fraudwatch_core::Error;

        match &err {
            Error::InvalidData(_) | Error::Rejected(_) | Error::Config(_) => {
                Self::bad_request(&err.to_string())
            }
            Error::NotFound(_) => Self::not_found(&err.to_string()),
            Error::Transport(_) | Error::Llm(_) => Self::bad_gateway(&err.to_string()),
            _ => err.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
