//! Ledger export as a JSON document

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::storage::db::User;

/// Exported shape of one user record.
#[derive(Debug, Serialize)]
pub struct ExportedUser {
    pub user_id: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub referred_by: Option<i64>,
    pub join_date: DateTime<Utc>,
    pub language: String,
    pub referrals: Vec<i64>,
}

impl From<&User> for ExportedUser {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            balance: user.balance,
            referred_by: user.referred_by,
            join_date: user.join_date,
            language: user.language.clone(),
            referrals: user.referrals.clone(),
        }
    }
}

/// Renders the export: an object keyed by stringified user id.
pub fn export_to_json(users: &BTreeMap<i64, User>) -> Result<String, serde_json::Error> {
    let document: BTreeMap<String, ExportedUser> = users
        .iter()
        .map(|(id, user)| (id.to_string(), ExportedUser::from(user)))
        .collect();
    serde_json::to_string_pretty(&document)
}

/// File name of an export taken at `at`.
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("database_{}.json", at.format("%Y-%m-%d_%H%M%S"))
}
