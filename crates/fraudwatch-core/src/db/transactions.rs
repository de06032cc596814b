//! Transaction simulator inserts and listings

use chrono::Utc;
use rusqlite::params;
use tracing::info;

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    AccountStatus, NewTransaction, Transaction, SIMULATOR_COUNTRY, SIMULATOR_DEVICE,
};

/// Smallest amount the simulator accepts
pub const MIN_SIMULATED_AMOUNT: f64 = 1.0;

impl Database {
    /// Insert a simulated transaction for an active account
    ///
    /// Fraud scoring happens downstream (triggers or external jobs); this only
    /// records the movement.
    pub fn insert_simulated_transaction(&self, tx: &NewTransaction) -> Result<Transaction> {
        if !tx.amount.is_finite() || tx.amount < MIN_SIMULATED_AMOUNT {
            return Err(Error::InvalidData(format!(
                "Amount must be at least {}",
                MIN_SIMULATED_AMOUNT
            )));
        }

        let account = self
            .get_account(&tx.account_id)?
            .ok_or_else(|| Error::NotFound(format!("Account {}", tx.account_id)))?;

        if account.account_status != AccountStatus::Active {
            return Err(Error::InvalidData(format!(
                "Account {} is {}",
                tx.account_id, account.account_status
            )));
        }

        let txn = Transaction {
            txn_id: uuid::Uuid::new_v4().to_string(),
            account_id: tx.account_id.clone(),
            amount: tx.amount,
            txn_type: tx.txn_type.as_str().to_string(),
            merchant_country: Some(SIMULATOR_COUNTRY.to_string()),
            device_id: Some(SIMULATOR_DEVICE.to_string()),
            txn_timestamp: Utc::now(),
        };

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO transactions (
                txn_id, account_id, amount, txn_type, merchant_country, device_id, txn_timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                txn.txn_id,
                txn.account_id,
                txn.amount,
                txn.txn_type,
                txn.merchant_country,
                txn.device_id,
                format_datetime(&txn.txn_timestamp),
            ],
        )?;

        info!(
            txn_id = %txn.txn_id,
            account_id = %txn.account_id,
            amount = txn.amount,
            txn_type = %txn.txn_type,
            "Simulated transaction inserted"
        );

        Ok(txn)
    }

    /// Most recent transactions, newest first
    pub fn list_recent_transactions(&self, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT txn_id, account_id, amount, txn_type, merchant_country, device_id, txn_timestamp
            FROM transactions
            ORDER BY txn_timestamp DESC
            LIMIT ?
            "#,
        )?;

        let transactions = stmt
            .query_map(params![limit], |row| {
                Ok(Transaction {
                    txn_id: row.get(0)?,
                    account_id: row.get(1)?,
                    amount: row.get(2)?,
                    txn_type: row.get(3)?,
                    merchant_country: row.get(4)?,
                    device_id: row.get(5)?,
                    txn_timestamp: parse_datetime(&row.get::<_, String>(6)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(transactions)
    }
}
