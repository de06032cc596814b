//! Streaming chat-completion backends
//!
//! Both copilot stages talk to the model through [`CompletionBackend`], which
//! hands back a lazy stream of text fragments in arrival order. Callers decide
//! whether to render partial text ([`partials`]) or wait for the whole answer
//! ([`collect`]).
//!
//! # Configuration
//!
//! Environment variables:
//! - `FRAUDWATCH_LLM_BACKEND`: `openai_compatible` (default) or `mock`
//! - `FRAUDWATCH_LLM_HOST`: Server URL (default: https://api.groq.com/openai)
//! - `FRAUDWATCH_LLM_MODEL`: Model name (default: openai/gpt-oss-120b)
//! - `GROQ_API_KEY`: Fallback API key when none is supplied per session

mod mock;
mod openai_compatible;

pub use mock::{MockBackend, MockReply};
pub use openai_compatible::OpenAICompatibleBackend;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};

use crate::error::{Error, Result};
use crate::prompts::Prompt;

pub const DEFAULT_LLM_HOST: &str = "https://api.groq.com/openai";
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-oss-120b";

/// Lazily produced text fragments
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One single-message completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Use the sampling parameters from a prompt's frontmatter
    pub fn for_prompt(prompt: &Prompt, text: String) -> Self {
        Self {
            prompt: text,
            temperature: prompt.metadata.temperature,
            max_tokens: prompt.metadata.max_tokens,
        }
    }
}

/// Trait implemented by every completion backend
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Start a streamed completion
    ///
    /// Errors returned here mean the call could not be started. Errors yielded
    /// by the stream mean it broke after it started.
    async fn stream_completion(&self, request: CompletionRequest) -> Result<TextStream>;

    /// Get the model name (for logging)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Which backend `LlmClient::from_config` builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenAICompatible,
    Mock,
}

/// LLM connection settings
///
/// The API key is optional here because the dashboard collects it per
/// session. It lives only in memory.
#[derive(Clone)]
pub struct LlmConfig {
    pub backend: BackendKind,
    pub host: String,
    pub model: String,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::OpenAICompatible,
            host: DEFAULT_LLM_HOST.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl LlmConfig {
    /// Read settings from the environment, falling back to the Groq defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let backend = match std::env::var("FRAUDWATCH_LLM_BACKEND")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "" | "openai_compatible" | "openai" | "groq" => BackendKind::OpenAICompatible,
            "mock" => BackendKind::Mock,
            other => {
                tracing::warn!(backend = %other, "Unknown FRAUDWATCH_LLM_BACKEND, using openai_compatible");
                BackendKind::OpenAICompatible
            }
        };

        Self {
            backend,
            host: std::env::var("FRAUDWATCH_LLM_HOST").unwrap_or(defaults.host),
            model: std::env::var("FRAUDWATCH_LLM_MODEL").unwrap_or(defaults.model),
            api_key: std::env::var("GROQ_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            connect_timeout: defaults.connect_timeout,
        }
    }

    /// Copy with a session-supplied key taking precedence over the env fallback
    pub fn with_api_key(&self, api_key: Option<&str>) -> Self {
        let mut config = self.clone();
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            config.api_key = Some(key.to_string());
        }
        config
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Concrete LLM client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum LlmClient {
    /// Any `/v1/chat/completions` server (Groq, vLLM, llama-server, ...)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Scripted fragments for tests and offline demos
    Mock(MockBackend),
}

impl LlmClient {
    /// Build the client described by a config
    ///
    /// The OpenAI-compatible backend needs an API key.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match config.backend {
            BackendKind::Mock => Ok(LlmClient::Mock(MockBackend::demo())),
            BackendKind::OpenAICompatible => {
                let api_key = config.api_key.as_deref().ok_or_else(|| {
                    Error::Config(
                        "LLM API key is required (pass one for the session or set GROQ_API_KEY)"
                            .into(),
                    )
                })?;
                Ok(LlmClient::OpenAICompatible(OpenAICompatibleBackend::new(
                    &config.host,
                    &config.model,
                    api_key,
                    config.connect_timeout,
                )?))
            }
        }
    }

    /// Create a mock client for testing
    pub fn mock(backend: MockBackend) -> Self {
        LlmClient::Mock(backend)
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn stream_completion(&self, request: CompletionRequest) -> Result<TextStream> {
        match self {
            LlmClient::OpenAICompatible(b) => b.stream_completion(request).await,
            LlmClient::Mock(b) => b.stream_completion(request).await,
        }
    }

    fn model(&self) -> &str {
        match self {
            LlmClient::OpenAICompatible(b) => b.model(),
            LlmClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            LlmClient::OpenAICompatible(b) => b.host(),
            LlmClient::Mock(b) => b.host(),
        }
    }
}

/// Turn a fragment stream into a stream of the growing accumulation
///
/// Each item is everything received so far. Errors pass through unchanged.
pub fn partials(stream: TextStream) -> TextStream {
    Box::pin(stream.scan(String::new(), |acc, item| {
        let next = item.map(|fragment| {
            acc.push_str(&fragment);
            acc.clone()
        });
        futures::future::ready(Some(next))
    }))
}

/// Drain a fragment stream, concatenating in arrival order
pub async fn collect(mut stream: TextStream) -> Result<String> {
    let mut out = String::new();
    while let Some(fragment) = stream.next().await {
        out.push_str(&fragment?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragments(items: Vec<Result<String>>) -> TextStream {
        Box::pin(futures::stream::iter(items))
    }

    #[tokio::test]
    async fn test_collect_concatenates_in_order() {
        let stream = fragments(vec![
            Ok("SELECT ".into()),
            Ok("COUNT(*) ".into()),
            Ok("FROM accounts".into()),
        ]);
        assert_eq!(collect(stream).await.unwrap(), "SELECT COUNT(*) FROM accounts");
    }

    #[tokio::test]
    async fn test_collect_surfaces_stream_error() {
        let stream = fragments(vec![Ok("SEL".into()), Err(Error::Llm("reset".into()))]);
        assert!(matches!(collect(stream).await, Err(Error::Llm(_))));
    }

    #[tokio::test]
    async fn test_partials_grow() {
        let stream = partials(fragments(vec![
            Ok("a".into()),
            Ok("b".into()),
            Ok("c".into()),
        ]));
        let seen: Vec<String> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(seen, vec!["a", "ab", "abc"]);
    }

    #[test]
    fn test_with_api_key_prefers_session_key() {
        let base = LlmConfig {
            api_key: Some("env-key".into()),
            ..LlmConfig::default()
        };
        assert_eq!(
            base.with_api_key(Some("session-key")).api_key.as_deref(),
            Some("session-key")
        );
        assert_eq!(base.with_api_key(Some("  ")).api_key.as_deref(), Some("env-key"));
        assert_eq!(base.with_api_key(None).api_key.as_deref(), Some("env-key"));
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = LlmConfig::default();
        assert!(!config.has_api_key());
        assert!(matches!(
            LlmClient::from_config(&config),
            Err(Error::Config(_))
        ));

        let mock = LlmConfig {
            backend: BackendKind::Mock,
            ..LlmConfig::default()
        };
        assert!(matches!(
            LlmClient::from_config(&mock),
            Ok(LlmClient::Mock(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = LlmConfig {
            api_key: Some("gsk_secret".into()),
            ..LlmConfig::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("gsk_secret"));
        assert!(debug.contains("<redacted>"));
    }
}
