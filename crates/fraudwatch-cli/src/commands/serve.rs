//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use fraudwatch_core::WorkerConfig;
use fraudwatch_server::ServerConfig;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    static_dir: Option<&Path>,
    with_worker: bool,
) -> Result<()> {
    println!("🚀 Starting FraudWatch web server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    let mut config = ServerConfig::from_env();
    config.require_auth = !no_auth;

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else if config.api_keys.is_empty() {
        println!("   ❌ Authentication enabled but FRAUDWATCH_API_KEYS is empty");
        println!("      Every API call will be rejected; set keys or use --no-auth locally");
    } else {
        println!(
            "   🔑 API keys: {} configured (FRAUDWATCH_API_KEYS)",
            config.api_keys.len()
        );
    }

    let worker = with_worker.then(WorkerConfig::from_env);
    if let Some(ref worker) = worker {
        println!(
            "   📬 Notification worker: every {}s",
            worker.interval.as_secs()
        );
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path)?;
    let static_dir = static_dir
        .map(|d| d.to_str().context("Static dir path is not valid UTF-8"))
        .transpose()?;

    fraudwatch_server::serve_with_config(db, host, port, static_dir, config, worker).await
}
