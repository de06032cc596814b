//! SMTP delivery of fraud alerts

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use super::Notifier;
use crate::error::{Error, Result};
use crate::models::NotificationEntry;

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const TEST_EMAIL_SUBJECT: &str = "SMTP Test - Bank Fraud Demo";
const TEST_EMAIL_BODY: &str = "This is a test email from the Bank Fraud demo system.";

/// SMTP relay settings
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    password: String,
    /// Alert recipient; the login address unless overridden
    pub recipient: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("recipient", &self.recipient)
            .finish()
    }
}

impl EmailConfig {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            smtp_host: DEFAULT_SMTP_HOST.to_string(),
            smtp_port: DEFAULT_SMTP_PORT,
            username: username.to_string(),
            password: password.to_string(),
            recipient: username.to_string(),
        }
    }

    /// Read settings from the environment
    ///
    /// Required: `SMTP_USER`, `SMTP_PASSWORD`
    /// Optional: `SMTP_HOST`, `SMTP_PORT`, `ALERT_RECIPIENT`
    pub fn from_env() -> Result<Self> {
        let username = required_env("SMTP_USER")?;
        let password = required_env("SMTP_PASSWORD")?;
        let mut config = Self::new(&username, &password);

        if let Ok(host) = std::env::var("SMTP_HOST") {
            config.smtp_host = host;
        }
        if let Ok(port) = std::env::var("SMTP_PORT") {
            config.smtp_port = port
                .parse()
                .map_err(|_| Error::Config(format!("SMTP_PORT is not a port number: {}", port)))?;
        }
        if let Ok(recipient) = std::env::var("ALERT_RECIPIENT") {
            if !recipient.trim().is_empty() {
                config.recipient = recipient;
            }
        }
        Ok(config)
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("{} is not set", name)))
}

/// Subject and HTML body for one alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEmail {
    pub subject: String,
    pub html_body: String,
}

/// Render the alert email for a queue entry
pub fn render_alert_email(entry: &NotificationEntry) -> AlertEmail {
    let customer = entry.customer_name.as_deref().unwrap_or("Unknown customer");
    let html_body = format!(
        "<h3>🚨 Bank Fraud Notification</h3>\n\
         <p><b>Customer:</b> {}</p>\n\
         <p><b>Account ID:</b> {}</p>\n\
         <p><b>Event:</b> {}</p>\n\
         <p><b>Message:</b> {}</p>\n\
         <p><b>Time:</b> {}</p>\n",
        escape_html(customer),
        escape_html(&entry.account_id),
        escape_html(&entry.event_type),
        escape_html(&entry.message),
        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
    );
    AlertEmail {
        subject: format!("[BANK ALERT] {}", entry.event_type),
        html_body,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Sends alerts through an authenticated STARTTLS relay
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    host: String,
}

impl SmtpNotifier {
    /// Build the transport; no connection is made until the first send
    pub fn new(config: EmailConfig) -> Result<Self> {
        let from: Mailbox = config
            .username
            .parse()
            .map_err(|e| Error::Config(format!("Invalid SMTP_USER address: {}", e)))?;
        let to: Mailbox = config
            .recipient
            .parse()
            .map_err(|e| Error::Config(format!("Invalid alert recipient: {}", e)))?;

        let creds = Credentials::new(config.username.clone(), config.password().to_string());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| Error::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            username = %config.username,
            "Created SMTP notifier"
        );

        Ok(Self {
            transport,
            from,
            to,
            host: format!("{}:{}", config.smtp_host, config.smtp_port),
        })
    }

    pub(crate) fn build_message(
        &self,
        to: Mailbox,
        subject: &str,
        content_type: ContentType,
        body: String,
    ) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(content_type)
            .body(body)
            .map_err(|e| Error::InvalidData(format!("Cannot build email: {}", e)))
    }

    pub(crate) fn alert_message(&self, entry: &NotificationEntry) -> Result<Message> {
        let email = render_alert_email(entry);
        self.build_message(
            self.to.clone(),
            &email.subject,
            ContentType::TEXT_HTML,
            email.html_body,
        )
    }

    async fn deliver(&self, message: Message) -> Result<()> {
        self.transport
            .send(message)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, entry: &NotificationEntry) -> Result<()> {
        let message = self.alert_message(entry)?;
        self.deliver(message).await?;
        info!(
            notification_id = entry.notification_id,
            account_id = %entry.account_id,
            to = %self.to,
            "Alert email sent"
        );
        Ok(())
    }

    /// Plain-text message to the login address itself
    async fn send_test(&self) -> Result<()> {
        let message = self.build_message(
            self.from.clone(),
            TEST_EMAIL_SUBJECT,
            ContentType::TEXT_PLAIN,
            TEST_EMAIL_BODY.to_string(),
        )?;
        self.deliver(message).await?;
        info!(to = %self.from, "Test email sent");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("smtp://{} -> {}", self.host, self.to)
    }
}
