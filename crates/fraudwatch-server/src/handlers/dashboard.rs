//! Dashboard handlers: KPIs, accounts, alerts and the notification queue

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{AppError, AppState, SuccessResponse};
use fraudwatch_core::models::{AccountOverview, DashboardKpis, FraudAlert, NotificationEntry};
use fraudwatch_core::notify::render_alert_email;

/// GET /api/dashboard - Headline KPIs
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardKpis>, AppError> {
    Ok(Json(state.db.get_kpis()?))
}

/// GET /api/accounts - Accounts overview, riskiest first
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AccountOverview>>, AppError> {
    let accounts = state.db.list_accounts_overview()?;
    debug!(count = accounts.len(), "Listed accounts");
    Ok(Json(accounts))
}

/// GET /api/accounts/active - Accounts the simulator may use
pub async fn list_active_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AccountOverview>>, AppError> {
    Ok(Json(state.db.list_active_accounts()?))
}

/// GET /api/alerts - Fraud alerts, newest first
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FraudAlert>>, AppError> {
    Ok(Json(state.db.list_fraud_alerts()?))
}

/// GET /api/notifications - Notification queue, newest first
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<NotificationEntry>>, AppError> {
    Ok(Json(state.db.list_notifications()?))
}

/// Result of emailing the latest notification
#[derive(Debug, Serialize)]
pub struct LatestEmailResponse {
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

/// POST /api/notifications/latest/email - Email the newest queue entry
///
/// The entry's `processed` flag is left alone; the worker owns it.
pub async fn email_latest_notification(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LatestEmailResponse>, AppError> {
    let Some(entry) = state.db.latest_notification()? else {
        warn!("No notifications found to email");
        return Ok(Json(LatestEmailResponse {
            sent: false,
            notification_id: None,
            subject: None,
            message: "No notifications found".to_string(),
        }));
    };

    let subject = render_alert_email(&entry).subject;
    state
        .mailer
        .send(&entry)
        .await
        .map_err(AppError::from_core)?;

    info!(
        notification_id = entry.notification_id,
        account_id = %entry.account_id,
        "Emailed latest notification"
    );

    Ok(Json(LatestEmailResponse {
        sent: true,
        notification_id: Some(entry.notification_id),
        subject: Some(subject),
        message: format!("Email sent for account {}", entry.account_id),
    }))
}

/// POST /api/notifications/test-email - Send an SMTP connectivity test
pub async fn send_test_email(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .mailer
        .send_test()
        .await
        .map_err(AppError::from_core)?;
    Ok(Json(SuccessResponse { success: true }))
}
