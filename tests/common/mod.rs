//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tempfile::TempDir;

use refbot::core::error::DeliveryError;
use refbot::core::Settings;
use refbot::dialog::{DialogDeps, Outbox, Outgoing};
use refbot::storage::db::{self, DbPool};

/// Administrator configured in every test environment.
pub const ADMIN_ID: i64 = 1;

/// A file-backed ledger in a temporary directory, removed on drop.
pub struct TestLedger {
    _dir: TempDir,
    pub pool: Arc<DbPool>,
}

impl TestLedger {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("ledger.db");
        let pool = db::create_pool(path.to_str().expect("utf-8 path")).expect("pool");
        Self {
            _dir: dir,
            pool: Arc::new(pool),
        }
    }

    /// Registers a user without referrer and sets their balance.
    pub fn seed_user(&self, user_id: i64, balance: Decimal) {
        let mut conn = db::get_connection(&self.pool).expect("connection");
        db::create_user(&mut conn, user_id, None, Decimal::ZERO).expect("create user");
        db::update_balance(&conn, user_id, balance).expect("set balance");
    }

    pub fn user(&self, user_id: i64) -> Option<db::User> {
        let conn = db::get_connection(&self.pool).expect("connection");
        db::get_user(&conn, user_id).expect("get user")
    }

    pub fn balance(&self, user_id: i64) -> Decimal {
        self.user(user_id).map(|u| u.balance).expect("user exists")
    }
}

pub fn test_settings(reward: &str, min_withdrawal: &str, admins: &[i64]) -> Settings {
    let mut values = HashMap::new();
    values.insert("REWARD_AMOUNT", reward.to_string());
    values.insert("MIN_WITHDRAWAL", min_withdrawal.to_string());
    values.insert(
        "ADMIN_IDS",
        admins.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(","),
    );
    Settings::from_lookup(|key| values.get(key).cloned()).expect("settings")
}

/// Ledger plus dialog dependencies with reward 0.14, minimum 10 and [`ADMIN_ID`].
pub fn test_env() -> (TestLedger, DialogDeps) {
    let ledger = TestLedger::new();
    let settings = test_settings("0.14", "10", &[ADMIN_ID]);
    let deps = DialogDeps::new(Arc::clone(&ledger.pool), Arc::new(settings));
    (ledger, deps)
}

/// Outbox fake that records deliveries and fails for chosen chats.
#[derive(Default)]
pub struct RecordingOutbox {
    sent: Mutex<Vec<(i64, Outgoing)>>,
    failing: Mutex<HashSet<i64>>,
}

impl RecordingOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivery to `chat_id` fails from now on.
    pub fn fail_for(&self, chat_id: i64) {
        self.failing.lock().unwrap().insert(chat_id);
    }

    pub fn sent(&self) -> Vec<(i64, Outgoing)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<Outgoing> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, message)| message)
            .collect()
    }

    pub fn last_text_to(&self, chat_id: i64) -> Option<String> {
        self.sent_to(chat_id)
            .last()
            .and_then(|m| m.text().map(str::to_string))
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Outbox for RecordingOutbox {
    async fn deliver(&self, chat_id: i64, message: Outgoing) -> Result<(), DeliveryError> {
        if self.failing.lock().unwrap().contains(&chat_id) {
            return Err(DeliveryError::new(chat_id, "Forbidden: bot was blocked by the user"));
        }
        self.sent.lock().unwrap().push((chat_id, message));
        Ok(())
    }
}
