//! Dashboard listings (KPIs, accounts, alerts, notifications)

use anyhow::Result;
use fraudwatch_core::db::Database;

use super::truncate;

pub fn cmd_dashboard(db: &Database) -> Result<()> {
    let kpis = db.get_kpis()?;
    let pending = db.count_pending_notifications()?;

    println!();
    println!("╭─────────────────────────────────────────╮");
    println!("│       🏦 FraudWatch Dashboard           │");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!("  Total accounts:        {}", kpis.total_accounts);
    println!("  🧊 Frozen accounts:    {}", kpis.frozen_accounts);
    println!("  ⚠️  High-risk accounts: {}", kpis.high_risk_accounts);
    println!("  📬 Pending alerts:     {}", pending);
    println!();

    Ok(())
}

pub fn cmd_accounts(db: &Database) -> Result<()> {
    let accounts = db.list_accounts_overview()?;

    if accounts.is_empty() {
        println!("No accounts found. Run 'fraudwatch init --seed' for demo data.");
        return Ok(());
    }

    println!();
    println!(
        "  {:<22} {:<36} {:<8} {:>5} {:>12}",
        "Customer", "Account", "Status", "Risk", "Daily limit"
    );
    println!("  {}", "─".repeat(87));
    for account in &accounts {
        println!(
            "  {:<22} {:<36} {:<8} {:>5} {:>12.2}",
            truncate(&account.customer_name, 22),
            account.account_id,
            account.account_status.as_str(),
            account.risk_score,
            account.daily_txn_limit
        );
    }
    println!();

    Ok(())
}

pub fn cmd_alerts(db: &Database) -> Result<()> {
    let alerts = db.list_fraud_alerts()?;

    if alerts.is_empty() {
        println!("✅ No fraud alerts.");
        return Ok(());
    }

    println!();
    for alert in &alerts {
        println!(
            "  🚨 [{}] {} - {}",
            alert.created_at.format("%Y-%m-%d %H:%M"),
            alert.rule_name,
            alert.customer_name.as_deref().unwrap_or("Unknown customer")
        );
        println!("     Account: {}", alert.account_id);
        if let Some(message) = &alert.alert_message {
            println!("     {}", truncate(message, 100));
        }
    }
    println!();
    println!("  {} alert(s)", alerts.len());

    Ok(())
}

pub fn cmd_notifications(db: &Database) -> Result<()> {
    let entries = db.list_notifications()?;

    if entries.is_empty() {
        println!("📭 Notification queue is empty.");
        return Ok(());
    }

    println!();
    for entry in &entries {
        let marker = if entry.processed { "✅" } else { "⏳" };
        println!(
            "  {} #{} [{}] {} - {}",
            marker,
            entry.notification_id,
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.event_type,
            entry.customer_name.as_deref().unwrap_or("Unknown customer")
        );
        println!("     {}", truncate(&entry.message, 100));
    }
    println!();

    let pending = entries.iter().filter(|e| !e.processed).count();
    println!("  {} entries, {} pending", entries.len(), pending);

    Ok(())
}
