//! End-to-end copilot turns against a real store and a scripted model

use super::*;
use crate::llm::{MockBackend, MockReply};
use crate::models::ChatRole;
use rusqlite::params;
use serde_json::json;

const FROZEN_SQL: &str = "SELECT CAST(COUNT(*) AS REAL) AS frozen_accounts FROM accounts WHERE account_status = 'FROZEN'";

fn store_with_statuses(statuses: &[&str]) -> Database {
    let db = Database::in_memory().unwrap();
    let conn = db.conn().unwrap();
    for (i, status) in statuses.iter().enumerate() {
        let customer = format!("cust-{}", i);
        conn.execute(
            "INSERT INTO customers (customer_id, full_name, email) VALUES (?, ?, ?)",
            params![customer, format!("Customer {}", i), "c@example.com"],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO accounts (account_id, customer_id, account_status, risk_score, daily_txn_limit) VALUES (?, ?, ?, ?, ?)",
            params![format!("acct-{}", i), customer, status, 50, 1000.0],
        )
        .unwrap();
    }
    db
}

fn copilot(db: Database, mock: MockBackend) -> Copilot {
    Copilot::with_prompts(db, LlmClient::mock(mock), &mut PromptLibrary::embedded_only()).unwrap()
}

#[tokio::test]
async fn test_how_many_accounts_are_frozen() {
    let db = store_with_statuses(&["ACTIVE", "FROZEN", "FROZEN", "ACTIVE"]);
    let mock = MockBackend::sql_then_explanation(
        FROZEN_SQL,
        "There are 2 frozen accounts, so two customers currently cannot transact.",
    );
    let copilot = copilot(db, mock.clone());

    let mut events = Vec::new();
    let outcome = copilot
        .run_turn("How many accounts are frozen?", |e| events.push(e))
        .await;

    assert!(outcome.is_success(), "{:?}", outcome.error);
    let sql = outcome.sql.as_deref().unwrap();
    assert!(sql.contains("COUNT("));
    assert!(sql.contains("account_status = 'FROZEN'"));

    let result = outcome.result.as_ref().unwrap();
    assert_eq!(result.columns, vec!["frozen_accounts"]);
    assert_eq!(result.rows, vec![vec![json!(2.0)]]);

    let explanation = outcome.explanation.as_deref().unwrap();
    assert!(!explanation.is_empty());
    assert!(explanation.contains('2'));

    // The explainer saw the executed rows
    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].prompt.contains(r#"[{"frozen_accounts":2.0}]"#));

    // Partial SQL grows monotonically and ends at the final statement
    let partial_sql: Vec<&String> = events
        .iter()
        .filter_map(|e| match e {
            TurnEvent::SqlPartial(s) => Some(s),
            _ => None,
        })
        .collect();
    assert!(partial_sql.len() > 1);
    assert!(partial_sql.windows(2).all(|w| w[1].starts_with(w[0].as_str())));
    assert_eq!(partial_sql.last().unwrap().as_str(), FROZEN_SQL);

    // Stage order: SQL, result, then explanation
    let position = |pred: &dyn Fn(&TurnEvent) -> bool| events.iter().position(|e| pred(e)).unwrap();
    let sql_at = position(&|e| matches!(e, TurnEvent::Sql(_)));
    let result_at = position(&|e| matches!(e, TurnEvent::Result(_)));
    let explanation_at = position(&|e| matches!(e, TurnEvent::Explanation(_)));
    assert!(sql_at < result_at && result_at < explanation_at);
}

#[tokio::test]
async fn test_handle_turn_appends_user_and_assistant() {
    let db = store_with_statuses(&["FROZEN"]);
    let copilot = copilot(
        db,
        MockBackend::sql_then_explanation(FROZEN_SQL, "One account is frozen."),
    );

    let (conversation, outcome) = copilot
        .handle_turn(Conversation::new(), "How many accounts are frozen?", |_| {})
        .await;

    assert!(outcome.is_success());
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.turns()[0].role, ChatRole::User);
    assert_eq!(conversation.turns()[0].content, "How many accounts are frozen?");
    assert_eq!(conversation.turns()[1].role, ChatRole::Assistant);
    assert_eq!(conversation.turns()[1].content, "One account is frozen.");
    assert_eq!(conversation.turns()[1].sql.as_deref(), Some(FROZEN_SQL));
}

#[tokio::test]
async fn test_generation_failure_becomes_assistant_message() {
    let db = store_with_statuses(&[]);
    let copilot = copilot(
        db,
        MockBackend::new(vec![MockReply::Fail("invalid api key".into())]),
    );

    let (conversation, outcome) = copilot
        .handle_turn(Conversation::new(), "anything", |_| {})
        .await;

    let failure = outcome.error.unwrap();
    assert_eq!(failure.stage, TurnStage::Generation);
    assert!(outcome.sql.is_none());

    let reply = &conversation.turns()[1];
    assert!(reply.content.starts_with("❌ SQL generation failed:"));
    assert!(reply.content.contains("invalid api key"));
}

#[tokio::test]
async fn test_write_statement_is_rejected_before_execution() {
    let db = store_with_statuses(&["ACTIVE"]);
    let copilot = copilot(
        db.clone(),
        MockBackend::new(vec![MockReply::text(
            "UPDATE accounts SET account_status = 'FROZEN'",
        )]),
    );

    let mut events = Vec::new();
    let outcome = copilot.run_turn("freeze everyone", |e| events.push(e)).await;

    assert_eq!(outcome.error.as_ref().unwrap().stage, TurnStage::Guard);
    assert!(outcome.result.is_none());
    assert!(matches!(
        events.last(),
        Some(TurnEvent::Failed {
            stage: TurnStage::Guard,
            ..
        })
    ));

    // Store untouched
    assert_eq!(db.get_kpis().unwrap().frozen_accounts, 0);
}

#[tokio::test]
async fn test_execution_error_is_reported() {
    let db = store_with_statuses(&["ACTIVE"]);
    let copilot = copilot(
        db,
        MockBackend::new(vec![MockReply::text("SELECT no_such_column FROM accounts")]),
    );

    let (conversation, outcome) = copilot
        .handle_turn(Conversation::new(), "broken", |_| {})
        .await;

    assert_eq!(outcome.error.as_ref().unwrap().stage, TurnStage::Execution);
    assert!(conversation.turns()[1]
        .content
        .starts_with("❌ SQL execution failed:\n\n"));
    // The SQL is kept so the user can see what was attempted
    assert!(conversation.turns()[1].sql.is_some());
}

#[tokio::test]
async fn test_empty_result_still_explained() {
    let db = store_with_statuses(&["ACTIVE"]);
    let mock = MockBackend::sql_then_explanation(
        "SELECT account_id FROM accounts WHERE account_status = 'FROZEN' LIMIT 100",
        "No frozen accounts were found.",
    );
    let copilot = copilot(db, mock.clone());

    let outcome = copilot.run_turn("Which accounts are frozen?", |_| {}).await;

    assert!(outcome.is_success());
    let result = outcome.result.unwrap();
    assert!(result.is_empty());
    assert!(result.columns.is_empty());
    assert!(mock.requests()[1].prompt.contains("SQL result:\n[]"));
}

#[tokio::test]
async fn test_empty_explanation_is_an_error() {
    let db = store_with_statuses(&["FROZEN"]);
    let copilot = copilot(
        db,
        MockBackend::new(vec![
            MockReply::text(FROZEN_SQL),
            MockReply::Fragments(vec!["   ".into()]),
        ]),
    );

    let (conversation, outcome) = copilot
        .handle_turn(Conversation::new(), "How many accounts are frozen?", |_| {})
        .await;

    assert_eq!(outcome.error.as_ref().unwrap().stage, TurnStage::Explanation);
    // Result was still produced before the explainer failed
    assert!(outcome.result.is_some());
    assert!(conversation.turns()[1]
        .content
        .starts_with("❌ Explanation failed:"));
}

#[tokio::test]
async fn test_without_explanation_skips_second_call() {
    let db = store_with_statuses(&["FROZEN", "FROZEN"]);
    let mock = MockBackend::new(vec![MockReply::text(FROZEN_SQL)]);
    let copilot = copilot(db, mock.clone()).without_explanation();

    let outcome = copilot.run_turn("How many accounts are frozen?", |_| {}).await;

    assert!(outcome.is_success());
    assert!(outcome.explanation.is_none());
    assert_eq!(mock.requests().len(), 1);
    assert_eq!(outcome.assistant_turn().content, "Query returned 1 row(s).");
}

#[tokio::test]
async fn test_empty_question_makes_no_model_call() {
    let mock = MockBackend::default();
    let copilot = copilot(store_with_statuses(&[]), mock.clone());

    let outcome = copilot.run_turn("   ", |_| {}).await;

    assert_eq!(outcome.error.unwrap().stage, TurnStage::Generation);
    assert!(mock.requests().is_empty());
}
