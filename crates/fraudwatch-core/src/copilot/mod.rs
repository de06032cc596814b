//! Natural-language questions answered from the store
//!
//! One turn runs strictly in sequence:
//! 1. [`SqlGenerator`] streams a SELECT statement from the question
//! 2. the read-only guard and [`Database::execute_read_only_query`] run it
//! 3. [`ResultExplainer`] streams a plain-language answer from the rows
//!
//! Progress is reported through [`TurnEvent`]s as it happens. A failure at any
//! stage ends the turn and becomes a visible assistant message; nothing is
//! retried.

mod conversation;
mod explainer;
mod generator;

#[cfg(test)]
mod tests;

pub use conversation::Conversation;
pub use explainer::ResultExplainer;
pub use generator::{GeneratedQuery, SqlGenerator};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::{Database, QueryResult};
use crate::error::{Error, Result};
use crate::llm::{partials, LlmClient};
use crate::models::ChatTurn;
use crate::prompts::{PromptId, PromptLibrary};

/// Pipeline stage a turn failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStage {
    Generation,
    Guard,
    Execution,
    Explanation,
}

impl TurnStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Guard => "guard",
            Self::Execution => "execution",
            Self::Explanation => "explanation",
        }
    }

    /// Heading used for the assistant message when this stage fails
    pub fn failure_label(&self) -> &'static str {
        match self {
            Self::Generation => "SQL generation failed",
            Self::Guard => "Query rejected",
            Self::Execution => "SQL execution failed",
            Self::Explanation => "Explanation failed",
        }
    }
}

impl std::fmt::Display for TurnStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of a running turn, in the order it happens
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// SQL received so far
    SqlPartial(String),
    /// Final trimmed SQL
    Sql(String),
    Result(QueryResult),
    /// Explanation received so far
    ExplanationPartial(String),
    /// Final trimmed explanation
    Explanation(String),
    Failed { stage: TurnStage, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnFailure {
    pub stage: TurnStage,
    pub message: String,
}

impl TurnFailure {
    /// Text appended to the conversation for this failure
    pub fn to_message(&self) -> String {
        format!("❌ {}:\n\n{}", self.stage.failure_label(), self.message)
    }
}

/// Everything one turn produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub question: String,
    pub sql: Option<String>,
    pub result: Option<QueryResult>,
    pub explanation: Option<String>,
    pub error: Option<TurnFailure>,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The assistant message recorded in the conversation
    pub fn assistant_turn(&self) -> ChatTurn {
        let content = match (&self.error, &self.explanation, &self.result) {
            (Some(failure), _, _) => failure.to_message(),
            (None, Some(explanation), _) => explanation.clone(),
            (None, None, Some(result)) => format!("Query returned {} row(s).", result.row_count()),
            (None, None, None) => String::new(),
        };
        ChatTurn::assistant(content, self.sql.clone())
    }

    fn fail(&mut self, stage: TurnStage, error: &Error) -> TurnEvent {
        let message = error.to_string();
        warn!(stage = stage.as_str(), error = %message, "Copilot turn failed");
        self.error = Some(TurnFailure {
            stage,
            message: message.clone(),
        });
        TurnEvent::Failed { stage, message }
    }
}

/// Generator, executor and explainer wired to one store and one model
#[derive(Clone)]
pub struct Copilot {
    db: Database,
    generator: SqlGenerator,
    explainer: ResultExplainer,
    explain_results: bool,
}

impl Copilot {
    /// Build with prompts from the default library (embedded plus overrides)
    pub fn new(db: Database, llm: LlmClient) -> Result<Self> {
        Self::with_prompts(db, llm, &mut PromptLibrary::new())
    }

    pub fn with_prompts(db: Database, llm: LlmClient, prompts: &mut PromptLibrary) -> Result<Self> {
        let generate = prompts.get(PromptId::GenerateSql)?.clone();
        let explain = prompts.get(PromptId::ExplainResult)?.clone();
        Ok(Self {
            db,
            generator: SqlGenerator::new(llm.clone(), generate),
            explainer: ResultExplainer::new(llm, explain),
            explain_results: true,
        })
    }

    /// Stop after execution; no explanation call is made
    pub fn without_explanation(mut self) -> Self {
        self.explain_results = false;
        self
    }

    pub fn generator(&self) -> &SqlGenerator {
        &self.generator
    }

    pub fn explainer(&self) -> &ResultExplainer {
        &self.explainer
    }

    /// Run one question through the pipeline, reporting progress to `observe`
    pub async fn run_turn<F>(&self, question: &str, mut observe: F) -> TurnOutcome
    where
        F: FnMut(TurnEvent) + Send,
    {
        let question = question.trim();
        let mut outcome = TurnOutcome {
            question: question.to_string(),
            ..TurnOutcome::default()
        };

        if question.is_empty() {
            let event = outcome.fail(
                TurnStage::Generation,
                &Error::Generation("question is empty".into()),
            );
            observe(event);
            return outcome;
        }

        // 1. Generate
        let generated = match self.stream_sql(question, &mut observe).await {
            Ok(query) => query,
            Err(e) => {
                let event = outcome.fail(TurnStage::Generation, &e);
                observe(event);
                return outcome;
            }
        };
        outcome.sql = Some(generated.sql.clone());
        observe(TurnEvent::Sql(generated.sql.clone()));

        // 2. Guard + execute
        let result = match self.db.execute_read_only_query(&generated.sql) {
            Ok(result) => result,
            Err(e) => {
                let stage = match e {
                    Error::Rejected(_) => TurnStage::Guard,
                    _ => TurnStage::Execution,
                };
                let event = outcome.fail(stage, &e);
                observe(event);
                return outcome;
            }
        };
        info!(rows = result.row_count(), columns = result.columns.len(), "Copilot query executed");
        outcome.result = Some(result.clone());
        observe(TurnEvent::Result(result.clone()));

        if !self.explain_results {
            return outcome;
        }

        // 3. Explain
        match self.stream_explanation(question, &result, &mut observe).await {
            Ok(text) => {
                outcome.explanation = Some(text.clone());
                observe(TurnEvent::Explanation(text));
            }
            Err(e) => {
                let event = outcome.fail(TurnStage::Explanation, &e);
                observe(event);
            }
        }

        outcome
    }

    /// Run a turn and record both sides of it in the conversation
    pub async fn handle_turn<F>(
        &self,
        mut conversation: Conversation,
        question: &str,
        observe: F,
    ) -> (Conversation, TurnOutcome)
    where
        F: FnMut(TurnEvent) + Send,
    {
        conversation.push(ChatTurn::user(question.trim()));
        let outcome = self.run_turn(question, observe).await;
        conversation.push(outcome.assistant_turn());
        (conversation, outcome)
    }

    async fn stream_sql<F>(&self, question: &str, observe: &mut F) -> Result<GeneratedQuery>
    where
        F: FnMut(TurnEvent) + Send,
    {
        let mut stream = partials(self.generator.stream(question).await?);
        let mut latest = String::new();
        while let Some(partial) = stream.next().await {
            latest = partial?;
            observe(TurnEvent::SqlPartial(latest.clone()));
        }
        GeneratedQuery::from_raw(&latest)
    }

    async fn stream_explanation<F>(
        &self,
        question: &str,
        result: &QueryResult,
        observe: &mut F,
    ) -> Result<String>
    where
        F: FnMut(TurnEvent) + Send,
    {
        let mut stream = partials(self.explainer.stream(question, result).await?);
        let mut latest = String::new();
        while let Some(partial) = stream.next().await {
            latest = partial?;
            observe(TurnEvent::ExplanationPartial(latest.clone()));
        }
        explainer::finish_explanation(&latest)
    }
}
