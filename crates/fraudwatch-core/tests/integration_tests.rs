//! Integration tests for fraudwatch-core
//!
//! These tests exercise the seeded store through the public API: dashboard
//! queries, the simulator, a copilot turn and a worker cycle.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fraudwatch_core::{
    db::Database,
    llm::{MockBackend, MockReply},
    models::{NewTransaction, NotificationEntry, TxnType},
    notify::{NotificationWorker, Notifier, WorkerConfig},
    Conversation, Copilot, LlmClient, PromptLibrary, Result,
};

/// Collects account ids of delivered notifications
#[derive(Clone, Default)]
struct Outbox(Arc<Mutex<Vec<String>>>);

#[async_trait]
impl Notifier for Outbox {
    async fn send(&self, entry: &NotificationEntry) -> Result<()> {
        self.0.lock().unwrap().push(entry.account_id.clone());
        Ok(())
    }

    async fn send_test(&self) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        "outbox".into()
    }
}

fn seeded() -> Database {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    db.seed_demo_data().expect("Failed to seed");
    db
}

// =============================================================================
// Dashboard
// =============================================================================

#[test]
fn test_seeded_dashboard_is_consistent() {
    let db = seeded();

    let kpis = db.get_kpis().unwrap();
    let overview = db.list_accounts_overview().unwrap();
    assert_eq!(kpis.total_accounts as usize, overview.len());
    assert_eq!(
        kpis.high_risk_accounts as usize,
        overview.iter().filter(|a| a.risk_score >= 60).count()
    );
    assert!(overview
        .windows(2)
        .all(|w| w[0].risk_score >= w[1].risk_score));

    let alerts = db.list_fraud_alerts().unwrap();
    assert!(!alerts.is_empty());
    assert!(alerts.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[test]
fn test_simulator_feeds_copilot_visible_rows() {
    let db = seeded();
    let account = db.list_active_accounts().unwrap().remove(0);

    db.insert_simulated_transaction(&NewTransaction {
        account_id: account.account_id.clone(),
        amount: 2_500.0,
        txn_type: TxnType::Transfer,
    })
    .unwrap();

    let result = db
        .execute_read_only_query(&format!(
            "SELECT COUNT(*) AS n FROM transactions WHERE device_id = 'simulator' AND account_id = '{}'",
            account.account_id
        ))
        .unwrap();
    assert_eq!(result.rows[0][0], serde_json::json!(1));
}

// =============================================================================
// Copilot
// =============================================================================

#[tokio::test]
async fn test_copilot_conversation_over_seeded_store() {
    let db = seeded();
    let mock = MockBackend::new(vec![
        MockReply::text("SELECT CAST(COUNT(*) AS REAL) AS frozen_accounts FROM accounts WHERE account_status = 'FROZEN'"),
        MockReply::text("Two accounts are currently frozen."),
        MockReply::text("SELECT account_id, risk_score FROM accounts ORDER BY risk_score DESC LIMIT 100"),
        MockReply::text("The riskiest account scores 91."),
    ]);
    let copilot =
        Copilot::with_prompts(db, LlmClient::mock(mock), &mut PromptLibrary::embedded_only())
            .unwrap();

    let (conversation, first) = copilot
        .handle_turn(Conversation::new(), "How many accounts are frozen?", |_| {})
        .await;
    assert!(first.is_success());
    assert_eq!(
        first.result.unwrap().rows,
        vec![vec![serde_json::json!(2.0)]]
    );

    let (conversation, second) = copilot
        .handle_turn(conversation, "Which account is riskiest?", |_| {})
        .await;
    assert!(second.is_success());
    assert_eq!(second.result.unwrap().rows[0][1], serde_json::json!(91));

    assert_eq!(conversation.len(), 4);
    assert_eq!(conversation.question_count(), 2);
}

// =============================================================================
// Worker
// =============================================================================

#[tokio::test]
async fn test_worker_drains_seeded_queue() {
    let db = seeded();
    let pending_before = db.list_pending_notifications().unwrap();
    assert!(!pending_before.is_empty());

    let outbox = Outbox::default();
    let worker = NotificationWorker::new(
        db.clone(),
        Arc::new(outbox.clone()),
        WorkerConfig::default(),
    );

    let report = worker.poll_once().await.unwrap();
    assert_eq!(report.sent, pending_before.len());
    assert_eq!(db.count_pending_notifications().unwrap(), 0);

    let expected: Vec<String> = pending_before.into_iter().map(|e| e.account_id).collect();
    assert_eq!(*outbox.0.lock().unwrap(), expected);

    // Drained queue: nothing more is sent
    assert!(worker.poll_once().await.unwrap().is_idle());
}
