use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Type, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;

use crate::core::error::{AppError, AppResult};
use crate::i18n::DEFAULT_LANG_CODE;
use crate::storage::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Timestamp layout used for `join_date` and `date_added` (UTC).
/// Lexicographic order matches chronological order, which the stats queries rely on.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A user of the referral program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Telegram user ID
    pub user_id: i64,
    pub balance: Decimal,
    /// Who invited this user; set once at creation
    pub referred_by: Option<i64>,
    pub join_date: DateTime<Utc>,
    /// Interface language code ("en", "ru")
    pub language: String,
    /// Users that name this user as their referrer, in join order
    pub referrals: Vec<i64>,
}

/// One row of the append-only `referrals` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferralEdge {
    pub referrer_id: i64,
    pub referred_id: i64,
    pub date_added: DateTime<Utc>,
}

/// Registration counts computed on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub total: i64,
    pub last_day: i64,
    pub last_week: i64,
    pub last_month: i64,
}

/// Create a new database connection pool
///
/// Initializes a pool with up to 10 connections and applies the schema
/// migrations on the first connection.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use refbot::storage::db;
///
/// let pool = db::create_pool("bot_users.db")?;
/// # Ok::<(), refbot::core::error::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager =
        SqliteConnectionManager::file(database_path).with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool. It returns to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn read_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Reads a balance column.
///
/// New rows store decimal text; databases created by older deployments hold
/// REAL or INTEGER values, which are converted as well.
fn read_decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    match row.get_ref(idx)? {
        ValueRef::Null => Ok(Decimal::ZERO),
        ValueRef::Integer(value) => Ok(Decimal::from(value)),
        ValueRef::Real(value) => Decimal::try_from(value)
            .map(|d| d.round_dp(8).normalize())
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Real, Box::new(e))),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|text| Decimal::from_str(text.trim()).ok())
            .ok_or_else(|| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, "invalid decimal".into())),
        ValueRef::Blob(_) => Err(rusqlite::Error::InvalidColumnType(idx, "balance".to_string(), Type::Blob)),
    }
}

/// Maps `user_id, balance, referred_by, join_date, language`; referrals are filled in by the caller.
fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        balance: read_decimal(row, 1)?,
        referred_by: row.get(2)?,
        join_date: read_timestamp(row, 3)?,
        language: row.get(4)?,
        referrals: Vec::new(),
    })
}

fn get_referrals(conn: &Connection, referrer_id: i64) -> AppResult<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT referred_id FROM referrals WHERE referrer_id = ?1 ORDER BY rowid")?;
    let rows = stmt.query_map([referrer_id], |row| row.get(0))?;

    let mut referrals = Vec::new();
    for row in rows {
        referrals.push(row?);
    }
    Ok(referrals)
}

/// Fetches a user together with the ids of everyone they referred.
///
/// Returns `Ok(None)` when the user does not exist; errors only on storage failures.
pub fn get_user(conn: &Connection, user_id: i64) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT user_id, balance, referred_by, join_date, language FROM users WHERE user_id = ?1",
            [user_id],
            user_from_row,
        )
        .optional()?;

    match user {
        Some(mut user) => {
            user.referrals = get_referrals(conn, user_id)?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

/// Checks for a user row without loading referrals.
pub fn user_exists(conn: &Connection, user_id: i64) -> AppResult<bool> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE user_id = ?1", [user_id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

/// Creates a user joining now. See [`create_user_at`].
pub fn create_user(conn: &mut Connection, user_id: i64, referred_by: Option<i64>, bonus: Decimal) -> AppResult<()> {
    create_user_at(conn, user_id, referred_by, bonus, Utc::now())
}

/// Inserts a new user with zero balance.
///
/// With a referrer, the referral edge and the referrer's bonus credit are
/// written in the same `IMMEDIATE` transaction as the user row: either all
/// three become visible or none does. The caller is expected to have
/// checked that the referrer exists and differs from `user_id`; a violation
/// still rolls back with [`AppError::Ledger`].
///
/// # Errors
///
/// Fails if the user already exists, the referrer is missing, or on any
/// storage error.
pub fn create_user_at(
    conn: &mut Connection,
    user_id: i64,
    referred_by: Option<i64>,
    bonus: Decimal,
    joined_at: DateTime<Utc>,
) -> AppResult<()> {
    let joined = format_timestamp(joined_at);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    tx.execute(
        "INSERT INTO users (user_id, balance, referred_by, join_date, language) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user_id, Decimal::ZERO.to_string(), referred_by, joined, DEFAULT_LANG_CODE],
    )?;

    if let Some(referrer_id) = referred_by {
        if referrer_id == user_id {
            return Err(AppError::Ledger(format!("user {} cannot refer itself", user_id)));
        }

        let current = tx
            .query_row("SELECT balance FROM users WHERE user_id = ?1", [referrer_id], |row| {
                read_decimal(row, 0)
            })
            .optional()?
            .ok_or_else(|| AppError::Ledger(format!("referrer {} does not exist", referrer_id)))?;

        tx.execute(
            "INSERT INTO referrals (referrer_id, referred_id, date_added) VALUES (?1, ?2, ?3)",
            params![referrer_id, user_id, joined],
        )?;
        tx.execute(
            "UPDATE users SET balance = ?1 WHERE user_id = ?2",
            params![(current + bonus).normalize().to_string(), referrer_id],
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Overwrites a user's balance (no increment, last writer wins).
///
/// Returns `false` when no such user exists.
pub fn update_balance(conn: &Connection, user_id: i64, new_balance: Decimal) -> AppResult<bool> {
    let updated = conn.execute(
        "UPDATE users SET balance = ?1 WHERE user_id = ?2",
        params![new_balance.normalize().to_string(), user_id],
    )?;
    Ok(updated > 0)
}

/// Stores the interface language. Returns `false` when no such user exists.
pub fn update_language(conn: &Connection, user_id: i64, language: &str) -> AppResult<bool> {
    let updated = conn.execute(
        "UPDATE users SET language = ?1 WHERE user_id = ?2",
        params![language, user_id],
    )?;
    Ok(updated > 0)
}

pub fn get_user_language(conn: &Connection, user_id: i64) -> AppResult<Option<String>> {
    let language = conn
        .query_row("SELECT language FROM users WHERE user_id = ?1", [user_id], |row| row.get(0))
        .optional()?;
    Ok(language)
}

/// Ids of every known user, ascending.
pub fn list_all_user_ids(conn: &Connection) -> AppResult<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT user_id FROM users ORDER BY user_id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Edges ending at `referred_id`. At most one is expected.
pub fn get_referral_edges_to(conn: &Connection, referred_id: i64) -> AppResult<Vec<ReferralEdge>> {
    let mut stmt =
        conn.prepare("SELECT referrer_id, referred_id, date_added FROM referrals WHERE referred_id = ?1 ORDER BY rowid")?;
    let rows = stmt.query_map([referred_id], |row| {
        Ok(ReferralEdge {
            referrer_id: row.get(0)?,
            referred_id: row.get(1)?,
            date_added: read_timestamp(row, 2)?,
        })
    })?;

    let mut edges = Vec::new();
    for row in rows {
        edges.push(row?);
    }
    Ok(edges)
}

/// Registration stats relative to the current time. See [`compute_stats_at`].
pub fn compute_stats(conn: &Connection) -> AppResult<Stats> {
    compute_stats_at(conn, Utc::now())
}

/// Counts users in total and per window.
///
/// A user is in the "last N days" window while fewer than N + 1 whole days
/// have elapsed since they joined, measured from `now`.
pub fn compute_stats_at(conn: &Connection, now: DateTime<Utc>) -> AppResult<Stats> {
    let total: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

    let count_within = |days: i64| -> AppResult<i64> {
        let cutoff = format_timestamp(now - chrono::Duration::days(days + 1));
        let count = conn.query_row("SELECT COUNT(*) FROM users WHERE join_date > ?1", [cutoff], |row| {
            row.get(0)
        })?;
        Ok(count)
    };

    Ok(Stats {
        total,
        last_day: count_within(1)?,
        last_week: count_within(7)?,
        last_month: count_within(30)?,
    })
}

/// Loads every user with referrals populated, keyed by user id.
pub fn export_all(conn: &Connection) -> AppResult<BTreeMap<i64, User>> {
    let mut users = BTreeMap::new();

    let mut stmt = conn.prepare("SELECT user_id, balance, referred_by, join_date, language FROM users")?;
    let rows = stmt.query_map([], user_from_row)?;
    for row in rows {
        let user = row?;
        users.insert(user.user_id, user);
    }

    let mut stmt = conn.prepare("SELECT referrer_id, referred_id FROM referrals ORDER BY rowid")?;
    let edges = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?;
    for edge in edges {
        let (referrer_id, referred_id) = edge?;
        if let Some(referrer) = users.get_mut(&referrer_id) {
            referrer.referrals.push(referred_id);
        } else {
            log::warn!("Referral edge {} -> {} points at a missing user", referrer_id, referred_id);
        }
    }

    Ok(users)
}
