//! Demo data for a fresh local store
//!
//! The production store is populated by core banking systems. A new SQLite file
//! gets a handful of customers, accounts, alerts and queued notifications so the
//! dashboard, copilot and worker have something to work on.

use chrono::{Duration, Utc};
use rusqlite::params;
use serde::Serialize;
use tracing::info;

use super::{format_datetime, Database};
use crate::error::Result;

/// What `seed_demo_data` inserted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub customers: usize,
    pub accounts: usize,
    pub transactions: usize,
    pub orders: usize,
    pub fraud_alerts: usize,
    pub notifications: usize,
}

/// (name, email, status, risk score, daily limit)
const DEMO_ACCOUNTS: &[(&str, &str, &str, i64, f64)] = &[
    ("Asha Raman", "asha.raman@example.com", "ACTIVE", 12, 50_000.0),
    ("Vikram Iyer", "vikram.iyer@example.com", "ACTIVE", 35, 25_000.0),
    ("Meera Kapoor", "meera.kapoor@example.com", "ACTIVE", 64, 20_000.0),
    ("Rahul Nair", "rahul.nair@example.com", "FROZEN", 91, 10_000.0),
    ("Priya Menon", "priya.menon@example.com", "FROZEN", 78, 15_000.0),
];

impl Database {
    /// Insert demo rows unless the store already has customers
    pub fn seed_demo_data(&self) -> Result<SeedSummary> {
        let mut conn = self.conn()?;

        let existing: i64 = conn.query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;
        if existing > 0 {
            info!(existing, "Store already has customers, skipping seed");
            return Ok(SeedSummary::default());
        }

        let now = Utc::now();
        let mut summary = SeedSummary::default();
        let tx = conn.transaction()?;

        let mut account_ids = Vec::with_capacity(DEMO_ACCOUNTS.len());
        for (i, (name, email, status, risk, limit)) in DEMO_ACCOUNTS.iter().enumerate() {
            let customer_id = uuid::Uuid::new_v4().to_string();
            let account_id = uuid::Uuid::new_v4().to_string();
            let created = format_datetime(&(now - Duration::days(90 - i as i64)));

            tx.execute(
                "INSERT INTO customers (customer_id, full_name, email, created_at) VALUES (?, ?, ?, ?)",
                params![customer_id, name, email, created],
            )?;
            tx.execute(
                r#"
                INSERT INTO accounts (account_id, customer_id, account_status, risk_score, daily_txn_limit, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
                params![account_id, customer_id, status, risk, limit, created],
            )?;

            summary.customers += 1;
            summary.accounts += 1;
            account_ids.push((account_id, *name));
        }

        // A few movements per account, including a failed (negative) one
        let movements: &[(f64, &str, &str, &str)] = &[
            (1_200.0, "POS", "IN", "pos_terminal_17"),
            (5_000.0, "ATM", "IN", "atm_mumbai_03"),
            (-250.0, "TRANSFER", "IN", "mobile_app"),
            (18_500.0, "TRANSFER", "AE", "unknown_device"),
        ];
        for (idx, (account_id, _)) in account_ids.iter().enumerate() {
            for (j, (amount, kind, country, device)) in movements.iter().enumerate() {
                tx.execute(
                    r#"
                    INSERT INTO transactions (txn_id, account_id, amount, txn_type, merchant_country, device_id, txn_timestamp)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        uuid::Uuid::new_v4().to_string(),
                        account_id,
                        amount * (1.0 + idx as f64 * 0.1),
                        kind,
                        country,
                        device,
                        format_datetime(&(now - Duration::hours((idx * 4 + j) as i64 * 6))),
                    ],
                )?;
                summary.transactions += 1;
            }
        }

        for (i, (name, amount)) in [("Asha Raman", 1_499.0), ("Vikram Iyer", 320.5), ("Meera Kapoor", 8_999.0)]
            .iter()
            .enumerate()
        {
            tx.execute(
                "INSERT INTO orders (customer_name, order_amount, order_date) VALUES (?, ?, ?)",
                params![name, amount, format_datetime(&(now - Duration::days(i as i64 + 1)))],
            )?;
            summary.orders += 1;
        }

        // Alerts and queued notifications for the risky accounts
        for (i, (account_id, name)) in account_ids.iter().enumerate().skip(2) {
            let created = format_datetime(&(now - Duration::minutes(30 * (5 - i as i64))));
            tx.execute(
                "INSERT INTO fraud_alerts (account_id, rule_name, alert_message, created_at) VALUES (?, ?, ?, ?)",
                params![
                    account_id,
                    "FOREIGN_HIGH_VALUE_TRANSFER",
                    format!("High value transfer abroad for {}", name),
                    created
                ],
            )?;
            summary.fraud_alerts += 1;

            tx.execute(
                "INSERT INTO notification_queue (account_id, event_type, message, processed, created_at) VALUES (?, ?, ?, 0, ?)",
                params![
                    account_id,
                    "HIGH_RISK",
                    format!("High risk activity detected for {}", name),
                    created
                ],
            )?;
            summary.notifications += 1;
        }

        tx.commit()?;

        info!(
            customers = summary.customers,
            accounts = summary.accounts,
            transactions = summary.transactions,
            alerts = summary.fraud_alerts,
            notifications = summary.notifications,
            "Seeded demo data"
        );
        Ok(summary)
    }
}
