//! FraudWatch Core Library
//!
//! Shared functionality for the FraudWatch fraud monitoring dashboard:
//! - Database access, migrations and the dashboard queries
//! - Schema catalog used to ground SQL generation
//! - Streaming LLM backends (OpenAI-compatible, mock)
//! - Natural-language-to-SQL copilot (generator, guard, executor, explainer)
//! - Notification queue worker with SMTP delivery
//! - Prompt library with embedded defaults and user overrides

pub mod copilot;
pub mod db;
pub mod error;
pub mod llm;
pub mod models;
pub mod notify;
pub mod prompts;
pub mod schema_catalog;
pub mod sql_guard;

/// Test utilities including a mock OpenAI-compatible server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use copilot::{
    Conversation, Copilot, GeneratedQuery, ResultExplainer, SqlGenerator, TurnEvent, TurnFailure,
    TurnOutcome, TurnStage,
};
pub use db::{Database, QueryResult};
pub use error::{Error, Result};
pub use llm::{CompletionBackend, CompletionRequest, LlmClient, LlmConfig, TextStream};
pub use notify::{
    ConsoleNotifier, CycleReport, EmailConfig, Mailer, NotificationWorker, Notifier,
    SmtpNotifier, WorkerConfig,
};
pub use prompts::{Prompt, PromptId, PromptLibrary};
