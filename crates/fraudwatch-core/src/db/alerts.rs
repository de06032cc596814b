//! Fraud alert listings

use rusqlite::params;

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::FraudAlert;

impl Database {
    /// Fraud alerts joined with the account owner, newest first
    pub fn list_fraud_alerts(&self) -> Result<Vec<FraudAlert>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                f.alert_id,
                c.full_name AS customer_name,
                f.account_id,
                f.rule_name,
                f.alert_message,
                f.created_at
            FROM fraud_alerts f
            LEFT JOIN accounts a ON f.account_id = a.account_id
            LEFT JOIN customers c ON a.customer_id = c.customer_id
            ORDER BY f.created_at DESC, f.alert_id DESC
            "#,
        )?;

        let alerts = stmt
            .query_map([], |row| {
                Ok(FraudAlert {
                    alert_id: row.get(0)?,
                    customer_name: row.get(1)?,
                    account_id: row.get(2)?,
                    rule_name: row.get(3)?,
                    alert_message: row.get(4)?,
                    created_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(alerts)
    }

    /// Record a fraud alert
    ///
    /// Detection normally writes these directly; this is used for seeding and tests.
    pub fn create_fraud_alert(
        &self,
        account_id: &str,
        rule_name: &str,
        alert_message: Option<&str>,
        created_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let created_at = created_at.unwrap_or_else(chrono::Utc::now);

        conn.execute(
            "INSERT INTO fraud_alerts (account_id, rule_name, alert_message, created_at) VALUES (?, ?, ?, ?)",
            params![account_id, rule_name, alert_message, format_datetime(&created_at)],
        )?;

        Ok(conn.last_insert_rowid())
    }
}
