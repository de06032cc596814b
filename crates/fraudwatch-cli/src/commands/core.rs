//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use fraudwatch_core::db::Database;

/// Open the database, creating tables on first use
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

pub fn cmd_init(db_path: &Path, seed: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;

    if seed {
        let summary = db.seed_demo_data().context("Failed to seed demo data")?;
        if summary.customers == 0 {
            println!("   Demo data already present, nothing seeded");
        } else {
            println!(
                "   Seeded {} customers, {} accounts, {} transactions",
                summary.customers, summary.accounts, summary.transactions
            );
            println!(
                "   Seeded {} fraud alerts, {} queued notifications",
                summary.fraud_alerts, summary.notifications
            );
        }
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Ask a question: fraudwatch ask \"How many accounts are frozen?\"");
    println!("  2. Start web UI: fraudwatch serve");

    Ok(())
}
