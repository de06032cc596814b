//! Notification commands: queue worker, latest-notification email, SMTP test

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fraudwatch_core::db::Database;
use fraudwatch_core::models::NotificationEntry;
use fraudwatch_core::notify::render_alert_email;
use fraudwatch_core::{CycleReport, Mailer, NotificationWorker, Notifier, WorkerConfig};
use fraudwatch_server::start_notification_worker;

/// SMTP mailer, or the logging mailer with `--console`
fn build_mailer(console: bool) -> Result<Arc<dyn Notifier>> {
    if console {
        return Ok(Arc::new(Mailer::console()));
    }
    let mailer = Mailer::smtp_from_env()
        .context("SMTP is not configured (set SMTP_USER and SMTP_PASSWORD, or use --console)")?;
    Ok(Arc::new(mailer))
}

fn worker_config(interval: Option<u64>) -> WorkerConfig {
    match interval {
        Some(secs) => WorkerConfig::with_interval(Duration::from_secs(secs.max(1))),
        None => WorkerConfig::from_env(),
    }
}

pub async fn cmd_worker(
    db: &Database,
    interval: Option<u64>,
    console: bool,
    once: bool,
) -> Result<()> {
    let notifier = build_mailer(console)?;
    let config = worker_config(interval);

    if once {
        let report = run_worker_once(db, notifier).await?;
        println!(
            "📬 Cycle complete: {} sent, {} failed",
            report.sent, report.failed
        );
        return Ok(());
    }

    println!("📬 Notification worker running via {}", notifier.describe());
    println!("   Polling every {}s", config.interval.as_secs());
    println!("   Press Ctrl+C to stop");

    let handle = start_notification_worker(db.clone(), notifier, config);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    println!();
    println!("🛑 Stopping worker...");
    handle.stop().await;

    Ok(())
}

/// One poll cycle with the given notifier
pub async fn run_worker_once(db: &Database, notifier: Arc<dyn Notifier>) -> Result<CycleReport> {
    let worker = NotificationWorker::new(db.clone(), notifier, WorkerConfig::default());
    worker
        .poll_once()
        .await
        .context("Notification cycle failed")
}

pub async fn cmd_notify_latest(db: &Database, console: bool) -> Result<()> {
    let notifier = build_mailer(console)?;
    match send_latest(db, notifier.as_ref()).await? {
        Some(entry) => {
            let email = render_alert_email(&entry);
            println!("✅ Sent \"{}\" for account {}", email.subject, entry.account_id);
        }
        None => println!("⚠️  No notifications found."),
    }
    Ok(())
}

/// Send the newest queue entry; `None` when the queue is empty
pub async fn send_latest(
    db: &Database,
    notifier: &dyn Notifier,
) -> Result<Option<NotificationEntry>> {
    let Some(entry) = db.latest_notification()? else {
        return Ok(None);
    };
    notifier
        .send(&entry)
        .await
        .context("Failed to send notification email")?;
    Ok(Some(entry))
}

pub async fn cmd_test_email() -> Result<()> {
    let mailer = build_mailer(false)?;
    println!("📧 Sending test email via {}...", mailer.describe());
    mailer
        .send_test()
        .await
        .context("SMTP test failed")?;
    println!("✅ Test email sent.");
    Ok(())
}
