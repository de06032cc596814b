//! Accounts overview and dashboard KPI queries

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::models::{AccountOverview, AccountStatus, DashboardKpis, HIGH_RISK_THRESHOLD};

const OVERVIEW_SELECT: &str = r#"
    SELECT
        c.full_name AS customer_name,
        a.account_id,
        a.account_status,
        a.risk_score,
        a.daily_txn_limit
    FROM customers c
    JOIN accounts a ON c.customer_id = a.customer_id
"#;

fn overview_from_row(row: &rusqlite::Row) -> rusqlite::Result<AccountOverview> {
    Ok(AccountOverview {
        customer_name: row.get(0)?,
        account_id: row.get(1)?,
        account_status: AccountStatus::from(row.get::<_, String>(2)?),
        risk_score: row.get(3)?,
        daily_txn_limit: row.get(4)?,
    })
}

impl Database {
    /// Headline KPIs: total, frozen and high-risk account counts
    pub fn get_kpis(&self) -> Result<DashboardKpis> {
        let conn = self.conn()?;

        // SUM over an empty table is NULL, hence the COALESCE
        let kpis = conn.query_row(
            r#"
            SELECT
                COUNT(*) AS total_accounts,
                COALESCE(SUM(CASE WHEN account_status = 'FROZEN' THEN 1 ELSE 0 END), 0) AS frozen_accounts,
                COALESCE(SUM(CASE WHEN risk_score >= ? THEN 1 ELSE 0 END), 0) AS high_risk_accounts
            FROM accounts
            "#,
            params![HIGH_RISK_THRESHOLD],
            |row| {
                Ok(DashboardKpis {
                    total_accounts: row.get(0)?,
                    frozen_accounts: row.get(1)?,
                    high_risk_accounts: row.get(2)?,
                })
            },
        )?;

        Ok(kpis)
    }

    /// All accounts with their owner's name, riskiest first
    pub fn list_accounts_overview(&self) -> Result<Vec<AccountOverview>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY a.risk_score DESC, c.full_name",
            OVERVIEW_SELECT
        ))?;

        let accounts = stmt
            .query_map([], overview_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(accounts)
    }

    /// Accounts the transaction simulator may target
    pub fn list_active_accounts(&self) -> Result<Vec<AccountOverview>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE a.account_status = ? ORDER BY c.full_name",
            OVERVIEW_SELECT
        ))?;

        let accounts = stmt
            .query_map(params![AccountStatus::Active.as_str()], overview_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(accounts)
    }

    /// Get a single account overview by id
    pub fn get_account(&self, account_id: &str) -> Result<Option<AccountOverview>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!("{} WHERE a.account_id = ?", OVERVIEW_SELECT),
                params![account_id],
                overview_from_row,
            )
            .optional()?;

        Ok(account)
    }
}
