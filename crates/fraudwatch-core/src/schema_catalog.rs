//! Static description of the tables the copilot may query
//!
//! Rendered into the SQL generation prompt. Kept in code rather than read from
//! the live store so the model only ever sees the columns listed here.

/// A table as presented to the model
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    /// (column, type) pairs in declaration order
    pub columns: &'static [(&'static str, &'static str)],
}

pub const TABLES: &[TableDef] = &[
    TableDef {
        name: "accounts",
        columns: &[
            ("account_id", "TEXT"),
            ("customer_id", "TEXT"),
            ("account_status", "TEXT"),
            ("risk_score", "INTEGER"),
            ("daily_txn_limit", "REAL"),
            ("created_at", "DATETIME"),
        ],
    },
    TableDef {
        name: "customers",
        columns: &[
            ("customer_id", "TEXT"),
            ("full_name", "TEXT"),
            ("email", "TEXT"),
            ("created_at", "DATETIME"),
        ],
    },
    TableDef {
        name: "orders",
        columns: &[
            ("order_id", "INTEGER"),
            ("customer_name", "TEXT"),
            ("order_amount", "REAL"),
            ("order_date", "DATETIME"),
        ],
    },
    TableDef {
        name: "transactions",
        columns: &[
            ("txn_id", "TEXT"),
            ("account_id", "TEXT"),
            ("amount", "REAL"),
            ("txn_type", "TEXT"),
            ("merchant_country", "TEXT"),
            ("device_id", "TEXT"),
            ("txn_timestamp", "DATETIME"),
        ],
    },
    TableDef {
        name: "fraud_alerts",
        columns: &[
            ("alert_id", "INTEGER"),
            ("account_id", "TEXT"),
            ("rule_name", "TEXT"),
            ("alert_message", "TEXT"),
            ("created_at", "DATETIME"),
        ],
    },
    TableDef {
        name: "notification_queue",
        columns: &[
            ("notification_id", "INTEGER"),
            ("account_id", "TEXT"),
            ("event_type", "TEXT"),
            ("message", "TEXT"),
            ("processed", "BOOLEAN"),
            ("created_at", "DATETIME"),
        ],
    },
];

/// Notes on value domains the column types alone don't convey
const VALUE_NOTES: &str = "\
accounts.account_status is one of 'ACTIVE', 'FROZEN'
transactions.txn_type is one of 'POS', 'ATM', 'TRANSFER'
transactions.amount is signed; negative amounts are failed or reversed movements
notification_queue.processed is 0 (pending) or 1 (sent)";

/// Render the catalog as prompt text
pub fn describe() -> String {
    let mut out = String::new();
    for table in TABLES {
        out.push_str(&format!("TABLE {} (\n", table.name));
        let cols: Vec<String> = table
            .columns
            .iter()
            .map(|(name, ty)| format!("  {} {}", name, ty))
            .collect();
        out.push_str(&cols.join(",\n"));
        out.push_str("\n)\n\n");
    }
    out.push_str(VALUE_NOTES);
    out.push('\n');
    out
}
