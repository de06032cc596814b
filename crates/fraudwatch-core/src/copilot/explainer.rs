//! Result rows -> plain-language answer

use std::collections::HashMap;

use futures::StreamExt;

use crate::db::QueryResult;
use crate::error::{Error, Result};
use crate::llm::{collect, CompletionBackend, CompletionRequest, LlmClient, TextStream};
use crate::prompts::Prompt;

/// Narrates an executed result, grounded only in its rows
#[derive(Clone)]
pub struct ResultExplainer {
    llm: LlmClient,
    prompt: Prompt,
}

impl ResultExplainer {
    pub fn new(llm: LlmClient, prompt: Prompt) -> Self {
        Self { llm, prompt }
    }

    /// The result is passed as an ordered list of `column -> value` records
    pub fn build_prompt(&self, question: &str, result: &QueryResult) -> String {
        let records = result.records_json();
        let mut vars = HashMap::new();
        vars.insert("question", question);
        vars.insert("result", records.as_str());
        self.prompt.render(&vars)
    }

    /// Stream explanation fragments in arrival order
    pub async fn stream(&self, question: &str, result: &QueryResult) -> Result<TextStream> {
        let request =
            CompletionRequest::for_prompt(&self.prompt, self.build_prompt(question, result));
        let stream = self
            .llm
            .stream_completion(request)
            .await
            .map_err(as_explanation)?;
        Ok(Box::pin(stream.map(|item| item.map_err(as_explanation))))
    }

    /// Full explanation, trimmed; an empty answer is an error
    pub async fn explain(&self, question: &str, result: &QueryResult) -> Result<String> {
        let raw = collect(self.stream(question, result).await?).await?;
        finish_explanation(&raw)
    }
}

pub(crate) fn finish_explanation(raw: &str) -> Result<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(Error::Explanation("model returned no explanation".into()));
    }
    Ok(text.to_string())
}

fn as_explanation(e: Error) -> Error {
    match e {
        Error::Explanation(_) => e,
        other => Error::Explanation(other.to_string()),
    }
}
