use std::collections::BTreeSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;

use crate::core::error::{AppError, AppResult};

/// Database file path
/// Read from DATABASE_PATH (or the older DATABASE_FILE) environment variable
/// Default: bot_users.db
pub static DATABASE_PATH: Lazy<String> = Lazy::new(|| {
    env::var("DATABASE_PATH")
        .or_else(|_| env::var("DATABASE_FILE"))
        .unwrap_or_else(|_| "bot_users.db".to_string())
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: refbot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "refbot.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Referral program defaults
pub mod referral {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Bonus credited to a referrer per referred user
    pub const DEFAULT_REWARD_AMOUNT: Decimal = dec!(0.14);

    /// Minimum balance required to request a payout
    pub const DEFAULT_MIN_WITHDRAWAL: Decimal = dec!(10);
}

/// Parses a comma/whitespace separated list of admin ids, skipping junk.
pub fn parse_admin_ids(raw: &str) -> BTreeSet<i64> {
    raw.split([',', ' ', '\n', '\t'])
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

/// Runtime settings for the referral program and the admin allow-list.
#[derive(Debug, Clone)]
pub struct Settings {
    pub reward_amount: Decimal,
    pub min_withdrawal: Decimal,
    pub admin_ids: BTreeSet<i64>,
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup.
    ///
    /// Malformed amounts fall back to the defaults with a warning; a missing
    /// or empty `ADMIN_IDS` is an error.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let reward_amount = read_amount(&lookup, "REWARD_AMOUNT", referral::DEFAULT_REWARD_AMOUNT);
        let min_withdrawal = read_amount(&lookup, "MIN_WITHDRAWAL", referral::DEFAULT_MIN_WITHDRAWAL);

        let admin_ids = lookup("ADMIN_IDS").map(|raw| parse_admin_ids(&raw)).unwrap_or_default();
        if admin_ids.is_empty() {
            return Err(AppError::Config(
                "ADMIN_IDS environment variable is required (comma-separated list of Telegram user IDs)".to_string(),
            ));
        }

        Ok(Self {
            reward_amount,
            min_withdrawal,
            admin_ids,
        })
    }

    /// Authorization is plain membership in the configured allow-list.
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

fn read_amount<F>(lookup: &F, key: &str, default: Decimal) -> Decimal
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match Decimal::from_str(raw.trim()) {
            Ok(value) if value >= Decimal::ZERO => value,
            _ => {
                log::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}
