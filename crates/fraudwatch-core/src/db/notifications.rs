//! Notification queue operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, parse_datetime, Database};
use crate::error::Result;
use crate::models::NotificationEntry;

const NOTIFICATION_SELECT: &str = r#"
    SELECT
        n.notification_id,
        n.account_id,
        c.full_name AS customer_name,
        n.event_type,
        n.message,
        n.processed,
        n.created_at
    FROM notification_queue n
    LEFT JOIN accounts a ON n.account_id = a.account_id
    LEFT JOIN customers c ON a.customer_id = c.customer_id
"#;

fn notification_from_row(row: &rusqlite::Row) -> rusqlite::Result<NotificationEntry> {
    Ok(NotificationEntry {
        notification_id: row.get(0)?,
        account_id: row.get(1)?,
        customer_name: row.get(2)?,
        event_type: row.get(3)?,
        message: row.get(4)?,
        processed: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

impl Database {
    /// Unprocessed entries, oldest first
    ///
    /// Ties on `created_at` fall back to insertion order.
    pub fn list_pending_notifications(&self) -> Result<Vec<NotificationEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE n.processed = 0 ORDER BY n.created_at ASC, n.notification_id ASC",
            NOTIFICATION_SELECT
        ))?;

        let entries = stmt
            .query_map([], notification_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Flip a single entry to processed
    ///
    /// Returns false if the entry was already processed or does not exist.
    pub fn mark_notification_processed(&self, notification_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE notification_queue SET processed = 1 WHERE notification_id = ? AND processed = 0",
            params![notification_id],
        )?;
        Ok(changed > 0)
    }

    /// Whole queue, newest first
    pub fn list_notifications(&self) -> Result<Vec<NotificationEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY n.created_at DESC, n.notification_id DESC",
            NOTIFICATION_SELECT
        ))?;

        let entries = stmt
            .query_map([], notification_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Most recent entry regardless of processed state
    pub fn latest_notification(&self) -> Result<Option<NotificationEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!(
                    "{} ORDER BY n.created_at DESC, n.notification_id DESC LIMIT 1",
                    NOTIFICATION_SELECT
                ),
                [],
                notification_from_row,
            )
            .optional()?;

        Ok(entry)
    }

    /// Get a single entry by id
    pub fn get_notification(&self, notification_id: i64) -> Result<Option<NotificationEntry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!("{} WHERE n.notification_id = ?", NOTIFICATION_SELECT),
                params![notification_id],
                notification_from_row,
            )
            .optional()?;

        Ok(entry)
    }

    /// Number of entries still waiting for delivery
    pub fn count_pending_notifications(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM notification_queue WHERE processed = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Enqueue a notification
    ///
    /// Triggers normally write these directly; this is used for seeding and tests.
    pub fn enqueue_notification(
        &self,
        account_id: &str,
        event_type: &str,
        message: &str,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let created_at = created_at.unwrap_or_else(Utc::now);

        conn.execute(
            "INSERT INTO notification_queue (account_id, event_type, message, processed, created_at) VALUES (?, ?, ?, 0, ?)",
            params![account_id, event_type, message, format_datetime(&created_at)],
        )?;

        Ok(conn.last_insert_rowid())
    }
}
