//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `ask` - SQL copilot question
//! - `core` - Init and shared utilities (open_db)
//! - `notify` - Notification worker, latest-notification email, SMTP test
//! - `serve` - Web server command
//! - `simulate` - Transaction simulator
//! - `status` - Dashboard, accounts, alerts and notification listings

pub mod ask;
pub mod core;
pub mod notify;
pub mod serve;
pub mod simulate;
pub mod status;

// Re-export command functions for main.rs
pub use ask::*;
pub use core::*;
pub use notify::*;
pub use serve::*;
pub use simulate::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
