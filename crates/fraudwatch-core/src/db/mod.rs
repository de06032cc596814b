//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `accounts` - Accounts overview and dashboard KPIs
//! - `transactions` - Transaction simulator inserts and listings
//! - `alerts` - Fraud alert listings
//! - `notifications` - Notification queue reads and processed flags
//! - `query` - Free-form SQL execution for the copilot
//! - `seed` - Demo data for a fresh local store

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::{debug, info, warn};

use crate::error::Result;

mod accounts;
mod alerts;
mod notifications;
mod query;
mod seed;
mod transactions;

pub use query::{reconcile_columns, QueryResult};
pub use seed::SeedSummary;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for the database path
pub const DB_PATH_ENV: &str = "FRAUDWATCH_DB";

/// Timestamp format used for every DATETIME column
pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| {
            warn!(value = s, "Unparseable timestamp, using current time");
            Utc::now()
        })
}

/// Format a timestamp the way SQLite's CURRENT_TIMESTAMP does
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) the database at `path` and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        debug!(path = %path, "Database opened");
        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection to `:memory:` would see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "fraudwatch_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any leftovers from an earlier run
        let _ = std::fs::remove_file(&path);

        Self::new(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: the worker process and the dashboard can share the file
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS customers (
                customer_id TEXT PRIMARY KEY,
                full_name TEXT NOT NULL,
                email TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS accounts (
                account_id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL REFERENCES customers(customer_id),
                account_status TEXT NOT NULL DEFAULT 'ACTIVE',
                risk_score INTEGER NOT NULL DEFAULT 0,
                daily_txn_limit REAL NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_accounts_customer ON accounts(customer_id);
            CREATE INDEX IF NOT EXISTS idx_accounts_status ON accounts(account_status);

            CREATE TABLE IF NOT EXISTS transactions (
                txn_id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL REFERENCES accounts(account_id),
                amount REAL NOT NULL,
                txn_type TEXT NOT NULL,
                merchant_country TEXT,
                device_id TEXT,
                txn_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_timestamp ON transactions(txn_timestamp);

            CREATE TABLE IF NOT EXISTS orders (
                order_id INTEGER PRIMARY KEY,
                customer_name TEXT NOT NULL,
                order_amount REAL NOT NULL,
                order_date DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Written by external detection logic
            CREATE TABLE IF NOT EXISTS fraud_alerts (
                alert_id INTEGER PRIMARY KEY,
                account_id TEXT NOT NULL,
                rule_name TEXT NOT NULL,
                alert_message TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_fraud_alerts_created ON fraud_alerts(created_at);

            -- Written by external triggers, drained by the notification worker
            CREATE TABLE IF NOT EXISTS notification_queue (
                notification_id INTEGER PRIMARY KEY,
                account_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                message TEXT NOT NULL,
                processed BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_notification_queue_pending
                ON notification_queue(processed, created_at);
            "#,
        )?;

        info!("Database migrations complete");
        Ok(())
    }
}
