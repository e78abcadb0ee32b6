use thiserror::Error;

/// Centralized error type for the bot.
///
/// Storage, export and configuration failures all funnel into this enum so
/// handlers can log them uniformly and answer the user with a generic error.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// JSON serialization errors (database export)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A ledger invariant would be broken by the requested write
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Anyhow errors (migrations, startup)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

/// Failure to hand one message to the messaging platform.
///
/// Kept separate from [`AppError`]: delivery failures are counted or logged,
/// never propagated as a failed operation.
#[derive(Error, Debug)]
#[error("delivery to {chat_id} failed: {reason}")]
pub struct DeliveryError {
    pub chat_id: i64,
    pub reason: String,
}

impl DeliveryError {
    pub fn new(chat_id: i64, reason: impl Into<String>) -> Self {
        Self {
            chat_id,
            reason: reason.into(),
        }
    }
}
