//! Question -> SQL
//!
//! The generator only assembles the prompt and the streamed reply. Whether the
//! SQL is safe to run is decided later by the guard in front of the executor.

use std::collections::HashMap;

use futures::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::llm::{collect, CompletionBackend, CompletionRequest, LlmClient, TextStream};
use crate::prompts::Prompt;
use crate::schema_catalog;

/// Candidate SQL produced for one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub sql: String,
}

impl GeneratedQuery {
    /// Trim the raw stream output; nothing left means generation failed
    pub fn from_raw(raw: &str) -> Result<Self> {
        let sql = raw.trim();
        if sql.is_empty() {
            return Err(Error::Generation("model returned no SQL".into()));
        }
        Ok(Self {
            sql: sql.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct SqlGenerator {
    llm: LlmClient,
    prompt: Prompt,
    schema: String,
}

impl SqlGenerator {
    /// Generator grounded on the built-in schema catalog
    pub fn new(llm: LlmClient, prompt: Prompt) -> Self {
        Self {
            llm,
            prompt,
            schema: schema_catalog::describe(),
        }
    }

    /// Replace the schema text given to the model
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn build_prompt(&self, question: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("schema", self.schema.as_str());
        vars.insert("question", question);
        self.prompt.render(&vars)
    }

    /// Stream raw SQL fragments in arrival order
    ///
    /// Every error, at start or mid-stream, is reported as a generation failure.
    pub async fn stream(&self, question: &str) -> Result<TextStream> {
        let request = CompletionRequest::for_prompt(&self.prompt, self.build_prompt(question));
        let stream = self
            .llm
            .stream_completion(request)
            .await
            .map_err(as_generation)?;
        Ok(Box::pin(stream.map(|item| item.map_err(as_generation))))
    }

    /// Generate the complete, trimmed SQL for a question
    pub async fn generate(&self, question: &str) -> Result<GeneratedQuery> {
        let raw = collect(self.stream(question).await?).await?;
        let query = GeneratedQuery::from_raw(&raw)?;
        tracing::debug!(model = self.llm.model(), sql = %query.sql, "Generated SQL");
        Ok(query)
    }
}

fn as_generation(e: Error) -> Error {
    match e {
        Error::Generation(_) => e,
        other => Error::Generation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockBackend, MockReply};
    use crate::prompts::{PromptId, PromptLibrary};

    fn generator(mock: MockBackend) -> SqlGenerator {
        let prompt = PromptLibrary::embedded_only()
            .get(PromptId::GenerateSql)
            .unwrap()
            .clone();
        SqlGenerator::new(LlmClient::mock(mock), prompt)
    }

    #[test]
    fn test_prompt_embeds_schema_question_and_rules() {
        let g = generator(MockBackend::default());
        let prompt = g.build_prompt("Which accounts are frozen?");

        assert!(prompt.contains("TABLE accounts ("));
        assert!(prompt.contains("TABLE notification_queue ("));
        assert!(prompt.contains("Which accounts are frozen?"));
        assert!(prompt.contains("LIMIT 100"));
        assert!(prompt.contains("Return ONLY SQL."));
        assert!(!prompt.contains("{{"));
    }

    #[tokio::test]
    async fn test_generate_concatenates_and_trims() {
        let mock = MockBackend::new(vec![MockReply::Fragments(vec![
            "\n  SELECT ".into(),
            "account_id ".into(),
            "FROM accounts ".into(),
            "LIMIT 100\n".into(),
        ])]);
        let g = generator(mock.clone());

        let query = g.generate("list accounts").await.unwrap();
        assert_eq!(query.sql, "SELECT account_id FROM accounts LIMIT 100");

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].max_tokens, 2048);
        assert!((requests[0].temperature - 0.2).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_output_is_generation_failure() {
        let g = generator(MockBackend::new(vec![MockReply::Fragments(vec![
            "  ".into(),
            "\n".into(),
        ])]));
        assert!(matches!(g.generate("q").await, Err(Error::Generation(_))));
    }

    #[tokio::test]
    async fn test_backend_errors_become_generation_failures() {
        let g = generator(MockBackend::new(vec![
            MockReply::Fail("401 Unauthorized".into()),
            MockReply::BreakAfter(vec!["SELECT".into()]),
        ]));

        match g.generate("q").await {
            Err(Error::Generation(msg)) => assert!(msg.contains("401")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(g.generate("q").await, Err(Error::Generation(_))));
    }

    #[test]
    fn test_from_raw() {
        assert_eq!(GeneratedQuery::from_raw(" SELECT 1 ").unwrap().sql, "SELECT 1");
        assert!(GeneratedQuery::from_raw("").is_err());
    }
}
