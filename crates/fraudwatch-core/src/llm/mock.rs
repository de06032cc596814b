//! Mock backend for testing
//!
//! Replies with scripted fragments instead of calling a model. Useful for unit
//! tests and for trying the dashboard without an API key
//! (`FRAUDWATCH_LLM_BACKEND=mock`).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::{CompletionBackend, CompletionRequest, TextStream};

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream these fragments, then end
    Fragments(Vec<String>),
    /// Stream these fragments, then yield an error
    BreakAfter(Vec<String>),
    /// Refuse to start the call
    Fail(String),
}

impl MockReply {
    /// Split text into word-sized fragments, the way a real stream arrives
    pub fn text(text: &str) -> Self {
        let mut fragments = Vec::new();
        let mut current = String::new();
        for c in text.chars() {
            current.push(c);
            if c == ' ' {
                fragments.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            fragments.push(current);
        }
        MockReply::Fragments(fragments)
    }
}

/// Mock LLM backend for testing
///
/// Replies are consumed in call order. When the script runs out, the fallback
/// reply is used for every further call.
#[derive(Clone)]
pub struct MockBackend {
    script: Arc<Mutex<VecDeque<MockReply>>>,
    fallback: MockReply,
    /// Answer explanation prompts by echoing the result rows
    demo: bool,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MockBackend {
    /// Create a mock that plays the given replies in order
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            script: Arc::new(Mutex::new(replies.into())),
            fallback: MockReply::Fragments(Vec::new()),
            demo: false,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shorthand for a generation reply followed by an explanation reply
    pub fn sql_then_explanation(sql: &str, explanation: &str) -> Self {
        Self::new(vec![MockReply::text(sql), MockReply::text(explanation)])
    }

    /// Offline demo: every question gets the frozen-account count
    pub fn demo() -> Self {
        let mut mock = Self::new(Vec::new());
        mock.fallback = MockReply::text(
            "SELECT CAST(COUNT(*) AS REAL) AS frozen_accounts FROM accounts WHERE account_status = 'FROZEN'",
        );
        mock.demo = true;
        mock
    }

    /// Requests seen so far, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, prompt: &str) -> MockReply {
        if let Some(reply) = self.script.lock().ok().and_then(|mut s| s.pop_front()) {
            return reply;
        }
        if self.demo {
            if let Some((_, result)) = prompt.split_once("SQL result:") {
                let rows = result.trim().lines().next().unwrap_or("[]");
                return MockReply::text(&format!(
                    "The query returned {}. That is the figure on record for your question.",
                    rows
                ));
            }
        }
        self.fallback.clone()
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn stream_completion(&self, request: CompletionRequest) -> Result<TextStream> {
        let reply = self.next_reply(&request.prompt);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let items: Vec<Result<String>> = match reply {
            MockReply::Fail(message) => return Err(Error::Llm(message)),
            MockReply::Fragments(fragments) => fragments.into_iter().map(Ok).collect(),
            MockReply::BreakAfter(fragments) => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(Error::Llm("stream reset".into()))))
                .collect(),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://"
    }
}
