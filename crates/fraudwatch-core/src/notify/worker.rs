//! Notification queue polling
//!
//! Each cycle reads every unprocessed entry oldest first, hands it to the
//! notifier, and flips `processed` for that entry alone as soon as the send
//! succeeds. A crash between the send and the update re-sends at most one
//! entry on the next start (at-least-once delivery).
//!
//! A failed send leaves the entry pending for the next cycle. A failed
//! database call ends the cycle; the loop keeps polling either way.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::Notifier;
use crate::db::Database;
use crate::error::Result;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Worker settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sleep between cycles
    pub interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WorkerConfig {
    /// Read `FRAUDWATCH_WORKER_INTERVAL` (seconds), default 5
    pub fn from_env() -> Self {
        Self {
            interval: parse_interval(std::env::var("FRAUDWATCH_WORKER_INTERVAL").ok().as_deref()),
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }
}

fn parse_interval(value: Option<&str>) -> Duration {
    match value.map(|v| v.trim().parse::<u64>()) {
        None => DEFAULT_POLL_INTERVAL,
        Some(Ok(0)) | Some(Err(_)) => {
            warn!(value = ?value, "Invalid FRAUDWATCH_WORKER_INTERVAL, using 5 seconds");
            DEFAULT_POLL_INTERVAL
        }
        Some(Ok(secs)) => Duration::from_secs(secs),
    }
}

/// What one poll cycle did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Entries delivered and marked processed
    pub sent: usize,
    /// Entries whose send failed; still pending
    pub failed: usize,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.sent == 0 && self.failed == 0
    }
}

pub struct NotificationWorker {
    db: Database,
    notifier: Arc<dyn Notifier>,
    config: WorkerConfig,
}

impl NotificationWorker {
    pub fn new(db: Database, notifier: Arc<dyn Notifier>, config: WorkerConfig) -> Self {
        Self {
            db,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run one cycle: deliver every pending entry in creation order
    pub async fn poll_once(&self) -> Result<CycleReport> {
        let pending = self.db.list_pending_notifications()?;
        let mut report = CycleReport::default();

        if pending.is_empty() {
            debug!("No pending notifications");
            return Ok(report);
        }

        for entry in &pending {
            match self.notifier.send(entry).await {
                Ok(()) => {
                    self.db.mark_notification_processed(entry.notification_id)?;
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(
                        notification_id = entry.notification_id,
                        account_id = %entry.account_id,
                        error = %e,
                        "Notification send failed, will retry next cycle"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            sent = report.sent,
            failed = report.failed,
            "Notification cycle complete"
        );
        Ok(report)
    }

    /// Poll until `shutdown` turns true or its sender is dropped
    ///
    /// Shutdown is observed between cycles and during the sleep; an in-flight
    /// cycle finishes first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            notifier = %self.notifier.describe(),
            interval_secs = self.config.interval.as_secs_f64(),
            "Notification worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.poll_once().await {
                error!(error = %e, "Notification cycle aborted");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Notification worker stopped");
    }

    /// Run on a background task
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationEntry;
    use crate::test_utils::RecordingNotifier;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use rusqlite::params;

    fn worker(db: &Database, notifier: &RecordingNotifier) -> NotificationWorker {
        NotificationWorker::new(
            db.clone(),
            Arc::new(notifier.clone()),
            WorkerConfig::with_interval(Duration::from_millis(10)),
        )
    }

    fn enqueue(db: &Database, account: &str, message: &str, offset_secs: i64) -> i64 {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        db.enqueue_notification(
            account,
            "HIGH_RISK",
            message,
            Some(base + ChronoDuration::seconds(offset_secs)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_single_entry_scenario() {
        let db = Database::in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        let id = enqueue(&db, "A", "High risk", 0);
        assert_eq!(id, 1);

        let report = worker(&db, &notifier).poll_once().await.unwrap();

        assert_eq!(report, CycleReport { sent: 1, failed: 0 });
        assert!(db.get_notification(1).unwrap().unwrap().processed);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].account_id, "A");
        assert_eq!(sent[0].message, "High risk");
    }

    #[tokio::test]
    async fn test_cycle_processes_all_oldest_first() {
        let db = Database::in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        enqueue(&db, "acct", "third", 30);
        enqueue(&db, "acct", "first", 10);
        enqueue(&db, "acct", "fourth", 40);
        enqueue(&db, "acct", "second", 20);

        let report = worker(&db, &notifier).poll_once().await.unwrap();

        assert_eq!(report.sent, 4);
        let order: Vec<String> = notifier.sent().into_iter().map(|e| e.message).collect();
        assert_eq!(order, vec!["first", "second", "third", "fourth"]);
        assert_eq!(db.count_pending_notifications().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_idle_cycle_sends_and_updates_nothing() {
        let db = Database::in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        enqueue(&db, "acct", "done already", 0);
        db.mark_notification_processed(1).unwrap();

        let w = worker(&db, &notifier);
        let report = w.poll_once().await.unwrap();
        assert!(report.is_idle());
        assert!(notifier.sent().is_empty());

        // Second run of a drained queue is also a no-op
        assert!(w.poll_once().await.unwrap().is_idle());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_send_stays_pending() {
        let db = Database::in_memory().unwrap();
        let notifier = RecordingNotifier::failing_for(&["bad"]);
        let ok_first = enqueue(&db, "good", "one", 0);
        let failing = enqueue(&db, "bad", "two", 1);
        let ok_last = enqueue(&db, "good", "three", 2);

        let w = worker(&db, &notifier);
        let report = w.poll_once().await.unwrap();

        assert_eq!(report, CycleReport { sent: 2, failed: 1 });
        assert!(db.get_notification(ok_first).unwrap().unwrap().processed);
        assert!(db.get_notification(ok_last).unwrap().unwrap().processed);
        assert!(!db.get_notification(failing).unwrap().unwrap().processed);

        // Retried on the next cycle, still failing, never marked
        let report = w.poll_once().await.unwrap();
        assert_eq!(report, CycleReport { sent: 0, failed: 1 });
        assert_eq!(notifier.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_database_error_aborts_cycle() {
        let db = Database::in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        db.conn()
            .unwrap()
            .execute("DROP TABLE notification_queue", params![])
            .unwrap();

        assert!(worker(&db, &notifier).poll_once().await.is_err());
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let db = Database::in_memory().unwrap();
        let notifier = RecordingNotifier::new();
        enqueue(&db, "A", "High risk", 0);

        let (tx, rx) = watch::channel(false);
        let handle = worker(&db, &notifier).spawn(rx);

        // Wait for the first cycle to drain the queue
        for _ in 0..100 {
            if db.count_pending_notifications().unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(db.count_pending_notifications().unwrap(), 0);

        // Entries queued later are picked up by a later cycle
        enqueue(&db, "B", "Frozen", 5);
        for _ in 0..100 {
            if notifier.sent().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();

        let accounts: Vec<String> = notifier
            .sent()
            .into_iter()
            .map(|e: NotificationEntry| e.account_id)
            .collect();
        assert_eq!(accounts, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_run_stops_when_sender_dropped() {
        let db = Database::in_memory().unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = worker(&db, &RecordingNotifier::new()).spawn(rx);
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval(None), Duration::from_secs(5));
        assert_eq!(parse_interval(Some("12")), Duration::from_secs(12));
        assert_eq!(parse_interval(Some("0")), Duration::from_secs(5));
        assert_eq!(parse_interval(Some("soon")), Duration::from_secs(5));
    }
}
