//! SQL copilot command
//!
//! Streams the generated SQL and the explanation to stdout as they arrive.

use std::io::Write;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use fraudwatch_core::db::Database;
use fraudwatch_core::{Copilot, LlmClient, LlmConfig, QueryResult, TurnEvent, TurnFailure, TurnOutcome};

use super::truncate;

/// Rows printed before the table is cut off
const MAX_PRINTED_ROWS: usize = 50;

pub async fn cmd_ask(
    db: &Database,
    question: &str,
    api_key: Option<&str>,
    no_explain: bool,
) -> Result<()> {
    let config = LlmConfig::from_env().with_api_key(api_key);
    let llm = LlmClient::from_config(&config).context("LLM is not configured")?;

    let mut copilot = Copilot::new(db.clone(), llm).context("Failed to load copilot prompts")?;
    if no_explain {
        copilot = copilot.without_explanation();
    }

    let outcome = run_ask(&copilot, question).await;
    match outcome.error {
        Some(failure) => bail!("{}", failure.stage.failure_label()),
        None => Ok(()),
    }
}

/// Run one turn, printing progress as it happens
pub async fn run_ask(copilot: &Copilot, question: &str) -> TurnOutcome {
    let mut printer = StreamPrinter::default();
    copilot
        .run_turn(question, |event| printer.handle(event))
        .await
}

/// Prints the new suffix of each growing partial
#[derive(Default)]
struct StreamPrinter {
    shown: usize,
}

impl StreamPrinter {
    fn handle(&mut self, event: TurnEvent) {
        match event {
            TurnEvent::SqlPartial(partial) => self.partial("🧠 SQL:", &partial),
            TurnEvent::ExplanationPartial(partial) => self.partial("💬 Answer:", &partial),
            TurnEvent::Sql(_) | TurnEvent::Explanation(_) => self.finish_block(),
            TurnEvent::Result(result) => {
                println!();
                print_result(&result);
                println!();
            }
            TurnEvent::Failed { stage, message } => {
                self.finish_block();
                println!();
                println!("{}", TurnFailure { stage, message }.to_message());
            }
        }
    }

    fn partial(&mut self, heading: &str, partial: &str) {
        if self.shown == 0 {
            println!("{}", heading);
        }
        if let Some(delta) = partial.get(self.shown..) {
            print!("{}", delta);
            let _ = std::io::stdout().flush();
        }
        self.shown = partial.len();
    }

    fn finish_block(&mut self) {
        if self.shown > 0 {
            println!();
        }
        self.shown = 0;
    }
}

fn print_result(result: &QueryResult) {
    if result.is_empty() {
        println!("📭 No rows returned.");
        return;
    }

    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .take(MAX_PRINTED_ROWS)
        .map(|row| row.iter().map(|v| truncate(&format_cell(v), 40)).collect())
        .collect();

    let widths: Vec<usize> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(name, w)| format!("{:<w$}", name, w = *w))
        .collect();
    println!("  {}", header.join(" │ "));
    println!(
        "  {}",
        widths
            .iter()
            .map(|w| "─".repeat(*w))
            .collect::<Vec<_>>()
            .join("─┼─")
    );
    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect();
        println!("  {}", line.join(" │ "));
    }

    if result.row_count() > MAX_PRINTED_ROWS {
        println!("  ... {} more row(s)", result.row_count() - MAX_PRINTED_ROWS);
    }
}

/// Display form of one result cell
pub fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
