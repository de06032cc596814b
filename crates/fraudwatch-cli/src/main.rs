//! FraudWatch CLI - fraud monitoring dashboard and SQL copilot
//!
//! Usage:
//!   fraudwatch init --seed              Create tables and demo data
//!   fraudwatch dashboard                Show KPIs
//!   fraudwatch ask "How many frozen?"   Ask the SQL copilot
//!   fraudwatch worker                   Email queued notifications
//!   fraudwatch serve --port 3000        Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    // Credentials may live in a local .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init { seed } => commands::cmd_init(&cli.db, seed),
        Commands::Dashboard => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_dashboard(&db)
        }
        Commands::Accounts => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_accounts(&db)
        }
        Commands::Alerts => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_alerts(&db)
        }
        Commands::Notifications => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_notifications(&db)
        }
        Commands::Simulate {
            account,
            amount,
            txn_type,
        } => {
            let db = commands::open_db(&cli.db)?;
            let txn_type = txn_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?;
            commands::cmd_simulate(&db, &account, amount, txn_type).map(|_| ())
        }
        Commands::Ask {
            question,
            api_key,
            no_explain,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_ask(&db, &question, api_key.as_deref(), no_explain).await
        }
        Commands::Worker {
            interval,
            console,
            once,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_worker(&db, interval, console, once).await
        }
        Commands::NotifyLatest { console } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_notify_latest(&db, console).await
        }
        Commands::TestEmail => commands::cmd_test_email().await,
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
            with_worker,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                no_auth,
                static_dir.as_deref(),
                with_worker,
            )
            .await
        }
    }
}
