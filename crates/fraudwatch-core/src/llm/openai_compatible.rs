//! OpenAI-compatible streaming backend
//!
//! Works with any server that implements the OpenAI chat completions API with
//! `stream: true` (Groq, vLLM, llama-server, LocalAI). Fragments arrive as
//! server-sent events carrying `choices[0].delta.content`, terminated by
//! `data: [DONE]`.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::{CompletionBackend, CompletionRequest, TextStream};

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAICompatibleBackend {
    /// Create a backend with a connect timeout; the stream itself is unbounded
    pub fn new(base_url: &str, model: &str, api_key: &str, connect_timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn body(&self, request: CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt,
            }],
            temperature: request.temperature,
            max_completion_tokens: request.max_tokens,
            stream: true,
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAICompatibleBackend {
    async fn stream_completion(&self, request: CompletionRequest) -> Result<TextStream> {
        debug!(model = %self.model, temperature = request.temperature, max_tokens = request.max_tokens, "Starting streamed completion");

        let mut source = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.body(request))
            .eventsource()
            .map_err(|e| Error::Llm(format!("cannot build completion request: {}", e)))?;

        // Wait for the connection so a bad key or status fails the call itself
        let buffered = match source.next().await {
            Some(Ok(Event::Open)) => None,
            Some(Ok(Event::Message(msg))) => Some(msg.data),
            Some(Err(e)) => {
                source.close();
                warn!(host = %self.base_url, error = %e, "Completion request failed");
                return Err(Error::Llm(e.to_string()));
            }
            None => return Err(Error::Llm("completion stream closed before opening".into())),
        };

        Ok(Box::pin(CompletionStream {
            source,
            buffered,
            done: false,
        }))
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

/// Text fragments decoded from a completion event stream
struct CompletionStream {
    source: EventSource,
    buffered: Option<String>,
    done: bool,
}

impl CompletionStream {
    fn finish(&mut self) {
        // An open EventSource reconnects on its own; stop it explicitly
        self.source.close();
        self.done = true;
    }

    /// Map one event payload to an item, or None to keep polling
    fn on_data(&mut self, data: &str) -> Option<Option<Result<String>>> {
        if data.trim() == "[DONE]" {
            self.finish();
            return Some(None);
        }
        match parse_chunk(data) {
            Ok(Some(text)) if !text.is_empty() => Some(Some(Ok(text))),
            Ok(_) => None,
            Err(e) => {
                self.finish();
                Some(Some(Err(e)))
            }
        }
    }
}

impl Stream for CompletionStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        if let Some(data) = self.buffered.take() {
            if let Some(item) = self.on_data(&data) {
                return Poll::Ready(item);
            }
        }

        loop {
            match Pin::new(&mut self.source).poll_next(cx) {
                Poll::Ready(Some(Ok(Event::Open))) => continue,
                Poll::Ready(Some(Ok(Event::Message(msg)))) => {
                    if let Some(item) = self.on_data(&msg.data) {
                        return Poll::Ready(item);
                    }
                }
                Poll::Ready(Some(Err(reqwest_eventsource::Error::StreamEnded))) => {
                    self.finish();
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!(error = %e, "Completion stream broke");
                    self.finish();
                    return Poll::Ready(Some(Err(Error::Llm(e.to_string()))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Extract the content delta from one streamed chunk
fn parse_chunk(data: &str) -> Result<Option<String>> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data)?;
    if let Some(error) = chunk.error {
        return Err(Error::Llm(
            error.message.unwrap_or_else(|| "completion stream reported an error".into()),
        ));
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content))
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_completion_tokens: u32,
    stream: bool,
}

/// Chat message
#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// One `data:` payload of a streamed completion
#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    message: Option<String>,
}
