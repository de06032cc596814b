//! Domain models for FraudWatch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk score at or above which an account counts as high risk
pub const HIGH_RISK_THRESHOLD: i64 = 60;

/// Merchant country recorded on simulated transactions
pub const SIMULATOR_COUNTRY: &str = "IN";

/// Device id recorded on simulated transactions
pub const SIMULATOR_DEVICE: &str = "simulator";

/// Account status, assigned by external risk logic
///
/// Unknown values written by other systems are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AccountStatus {
    Active,
    Frozen,
    Other(String),
}

impl AccountStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "ACTIVE",
            Self::Frozen => "FROZEN",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for AccountStatus {
    fn from(s: String) -> Self {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Self::Active,
            "FROZEN" => Self::Frozen,
            _ => Self::Other(s),
        }
    }
}

impl From<AccountStatus> for String {
    fn from(status: AccountStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxnType {
    Pos,
    Atm,
    Transfer,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pos => "POS",
            Self::Atm => "ATM",
            Self::Transfer => "TRANSFER",
        }
    }

    pub fn all() -> &'static [TxnType] {
        &[Self::Pos, Self::Atm, Self::Transfer]
    }
}

impl std::str::FromStr for TxnType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "POS" => Ok(Self::Pos),
            "ATM" => Ok(Self::Atm),
            "TRANSFER" => Ok(Self::Transfer),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TxnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Headline numbers shown at the top of the dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardKpis {
    pub total_accounts: i64,
    pub frozen_accounts: i64,
    /// Accounts with `risk_score >= HIGH_RISK_THRESHOLD`
    pub high_risk_accounts: i64,
}

/// One row of the accounts overview (account joined with its owner)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountOverview {
    pub customer_name: String,
    pub account_id: String,
    pub account_status: AccountStatus,
    pub risk_score: i64,
    pub daily_txn_limit: f64,
}

/// A stored transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub txn_id: String,
    pub account_id: String,
    /// Signed amount; negative values are failed or reversed movements
    pub amount: f64,
    pub txn_type: String,
    pub merchant_country: Option<String>,
    pub device_id: Option<String>,
    pub txn_timestamp: DateTime<Utc>,
}

/// A transaction submitted through the simulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub account_id: String,
    pub amount: f64,
    pub txn_type: TxnType,
}

/// A fraud alert raised by external detection logic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    pub alert_id: i64,
    pub customer_name: Option<String>,
    pub account_id: String,
    pub rule_name: String,
    pub alert_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A pending or delivered entry in the notification queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEntry {
    pub notification_id: i64,
    pub account_id: String,
    pub customer_name: Option<String>,
    pub event_type: String,
    pub message: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

/// Who authored a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message in a copilot conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    /// SQL generated for this turn (assistant turns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            sql: None,
        }
    }

    pub fn assistant(content: impl Into<String>, sql: Option<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            sql,
        }
    }
}
