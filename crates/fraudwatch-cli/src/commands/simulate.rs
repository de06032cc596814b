//! Transaction simulator command

use anyhow::{Context, Result};
use fraudwatch_core::db::Database;
use fraudwatch_core::models::{NewTransaction, Transaction, TxnType};

pub fn cmd_simulate(
    db: &Database,
    account_id: &str,
    amount: f64,
    txn_type: TxnType,
) -> Result<Transaction> {
    let txn = db
        .insert_simulated_transaction(&NewTransaction {
            account_id: account_id.to_string(),
            amount,
            txn_type,
        })
        .context("Failed to insert simulated transaction")?;

    println!("✅ Transaction inserted");
    println!("   ID:      {}", txn.txn_id);
    println!("   Account: {}", txn.account_id);
    println!("   Amount:  {:.2}", txn.amount);
    println!("   Type:    {}", txn.txn_type);

    Ok(txn)
}
