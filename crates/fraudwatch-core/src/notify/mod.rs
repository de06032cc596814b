//! Outbound fraud notifications
//!
//! - `Notifier` trait: delivers one queue entry (the email side effect)
//! - `Mailer` enum: concrete wrapper chosen from configuration
//! - `NotificationWorker`: polls the queue and drives a notifier
//!
//! # Configuration
//!
//! Environment variables:
//! - `SMTP_USER`, `SMTP_PASSWORD`: Login for the SMTP relay (required for email)
//! - `SMTP_HOST`: Relay host (default: smtp.gmail.com)
//! - `SMTP_PORT`: Submission port (default: 587, STARTTLS)
//! - `ALERT_RECIPIENT`: Where alerts go (default: SMTP_USER)
//! - `FRAUDWATCH_WORKER_INTERVAL`: Seconds between polls (default: 5)

mod email;
mod worker;

pub use email::{render_alert_email, AlertEmail, EmailConfig, SmtpNotifier, TEST_EMAIL_SUBJECT};
pub use worker::{CycleReport, NotificationWorker, WorkerConfig};

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::models::NotificationEntry;

/// Performs the side effect for one notification
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one queue entry
    async fn send(&self, entry: &NotificationEntry) -> Result<()>;

    /// Deliver a connectivity test message
    async fn send_test(&self) -> Result<()>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// Logs notifications instead of sending them
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, entry: &NotificationEntry) -> Result<()> {
        info!(
            notification_id = entry.notification_id,
            account_id = %entry.account_id,
            "[EMAIL SENT] Account: {} | Message: {}",
            entry.account_id,
            entry.message
        );
        Ok(())
    }

    async fn send_test(&self) -> Result<()> {
        info!("[EMAIL SENT] {}", TEST_EMAIL_SUBJECT);
        Ok(())
    }

    fn describe(&self) -> String {
        "console".to_string()
    }
}

/// Concrete notifier enum
#[derive(Clone)]
pub enum Mailer {
    /// Authenticated SMTP with STARTTLS
    Smtp(SmtpNotifier),
    /// Log lines only
    Console(ConsoleNotifier),
}

impl Mailer {
    /// SMTP mailer from `SMTP_*` environment variables
    pub fn smtp_from_env() -> Result<Self> {
        let config = EmailConfig::from_env()?;
        Ok(Mailer::Smtp(SmtpNotifier::new(config)?))
    }

    pub fn console() -> Self {
        Mailer::Console(ConsoleNotifier)
    }
}

#[async_trait]
impl Notifier for Mailer {
    async fn send(&self, entry: &NotificationEntry) -> Result<()> {
        match self {
            Mailer::Smtp(n) => n.send(entry).await,
            Mailer::Console(n) => n.send(entry).await,
        }
    }

    async fn send_test(&self) -> Result<()> {
        match self {
            Mailer::Smtp(n) => n.send_test().await,
            Mailer::Console(n) => n.send_test().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Mailer::Smtp(n) => n.describe(),
            Mailer::Console(n) => n.describe(),
        }
    }
}
