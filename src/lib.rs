//! Refbot - Telegram referral-reward bot
//!
//! Users join through referral links, earn a bonus for every user they bring
//! in and request a payout once their balance reaches the minimum.
//! Administrators broadcast messages, inspect statistics, export the ledger
//! and adjust balances.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, amounts and export
//! - `storage`: SQLite ledger of users and referral edges
//! - `dialog`: session-driven multi-step flows (withdrawal, broadcast, balance edit)
//! - `telegram`: Telegram bot integration and handlers
//! - `i18n`: Fluent localization

pub mod cli;
pub mod core;
pub mod dialog;
pub mod i18n;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult, Settings};
pub use crate::dialog::{DialogDeps, Outbox, Outgoing, SessionManager};
pub use crate::storage::{create_pool, get_connection, DbConnection, DbPool};
