//! Error types for FraudWatch

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The LLM endpoint rejected the request or the stream broke mid-way
    #[error("LLM error: {0}")]
    Llm(String),

    /// SQL generation produced nothing usable
    #[error("SQL generation failed: {0}")]
    Generation(String),

    /// Generated SQL failed the read-only guard
    #[error("Query rejected: {0}")]
    Rejected(String),

    /// Result narration produced nothing usable
    #[error("Explanation failed: {0}")]
    Explanation(String),

    /// Email transport could not be built or the message could not be sent
    #[error("Email transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
