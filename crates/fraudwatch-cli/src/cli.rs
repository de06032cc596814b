//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// FraudWatch - Monitor bank accounts and ask questions about them in plain English
#[derive(Parser)]
#[command(name = "fraudwatch")]
#[command(about = "Fraud monitoring dashboard with a natural-language SQL copilot", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, env = "FRAUDWATCH_DB", default_value = "fraudwatch.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init {
        /// Insert demo customers, accounts, alerts and queued notifications
        #[arg(long)]
        seed: bool,
    },

    /// Show headline KPIs
    Dashboard,

    /// List accounts, riskiest first
    Accounts,

    /// List fraud alerts, newest first
    Alerts,

    /// List the notification queue, newest first
    Notifications,

    /// Insert a simulated transaction
    Simulate {
        /// Account ID (must be ACTIVE)
        #[arg(short, long)]
        account: String,

        /// Amount (at least 1)
        #[arg(long)]
        amount: f64,

        /// Transaction type: POS, ATM, TRANSFER
        #[arg(short, long, default_value = "POS")]
        txn_type: String,
    },

    /// Ask the SQL copilot a question
    ///
    /// The LLM key comes from --api-key or GROQ_API_KEY and is never stored.
    Ask {
        /// Question in plain English
        question: String,

        /// LLM API key for this call
        #[arg(long)]
        api_key: Option<String>,

        /// Show the query result without an explanation
        #[arg(long)]
        no_explain: bool,
    },

    /// Poll the notification queue and email each entry
    Worker {
        /// Seconds between polls (default: FRAUDWATCH_WORKER_INTERVAL or 5)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Log alerts instead of sending email
        #[arg(long)]
        console: bool,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Email the most recent notification
    NotifyLatest {
        /// Log the alert instead of sending email
        #[arg(long)]
        console: bool,
    },

    /// Send an SMTP test message to the configured sender
    TestEmail,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        #[arg(long)]
        no_auth: bool,

        /// Directory with the built dashboard to serve
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Run the notification worker in the same process
        #[arg(long)]
        with_worker: bool,
    },
}
