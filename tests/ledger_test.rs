//! Integration tests for the user ledger
//!
//! Run with: cargo test --test ledger_test

mod common;

use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::TestLedger;
use refbot::core::error::AppError;
use refbot::core::export::export_to_json;
use refbot::storage::db::{self, Stats};

#[test]
fn referral_credits_bonus_and_writes_one_edge() {
    let ledger = TestLedger::new();
    ledger.seed_user(100, dec!(1.00));

    let mut conn = db::get_connection(&ledger.pool).unwrap();
    db::create_user(&mut conn, 200, Some(100), dec!(0.14)).unwrap();

    let referred = db::get_user(&conn, 200).unwrap().unwrap();
    assert_eq!(referred.balance, Decimal::ZERO);
    assert_eq!(referred.referred_by, Some(100));

    let referrer = db::get_user(&conn, 100).unwrap().unwrap();
    assert_eq!(referrer.balance, dec!(1.14));
    assert_eq!(referrer.referrals, vec![200]);

    let edges = db::get_referral_edges_to(&conn, 200).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].referrer_id, 100);
    assert_eq!(edges[0].referred_id, 200);
}

#[test]
fn missing_referrer_leaves_no_partial_state() {
    let ledger = TestLedger::new();
    let mut conn = db::get_connection(&ledger.pool).unwrap();

    let result = db::create_user(&mut conn, 200, Some(999), dec!(0.14));

    assert!(matches!(result, Err(AppError::Ledger(_))));
    assert!(db::get_user(&conn, 200).unwrap().is_none());
    assert!(db::get_referral_edges_to(&conn, 200).unwrap().is_empty());
}

#[test]
fn duplicate_registration_does_not_credit_again() {
    let ledger = TestLedger::new();
    ledger.seed_user(100, Decimal::ZERO);
    let mut conn = db::get_connection(&ledger.pool).unwrap();
    db::create_user(&mut conn, 200, Some(100), dec!(0.14)).unwrap();

    let again = db::create_user(&mut conn, 200, Some(100), dec!(0.14));

    assert!(again.is_err());
    let referrer = db::get_user(&conn, 100).unwrap().unwrap();
    assert_eq!(referrer.balance, dec!(0.14));
    assert_eq!(referrer.referrals, vec![200]);
    assert_eq!(db::get_referral_edges_to(&conn, 200).unwrap().len(), 1);
}

#[test]
fn get_user_is_idempotent() {
    let ledger = TestLedger::new();
    ledger.seed_user(100, dec!(3.5));
    let mut conn = db::get_connection(&ledger.pool).unwrap();
    db::create_user(&mut conn, 101, Some(100), dec!(0.14)).unwrap();

    let first = db::get_user(&conn, 100).unwrap();
    let second = db::get_user(&conn, 100).unwrap();

    assert_eq!(first, second);
    assert!(db::get_user(&conn, 12345).unwrap().is_none());
}

#[test]
fn update_balance_overwrites() {
    let ledger = TestLedger::new();
    ledger.seed_user(100, dec!(12.34));
    let conn = db::get_connection(&ledger.pool).unwrap();

    assert!(db::update_balance(&conn, 100, dec!(0.5)).unwrap());
    assert_eq!(ledger.balance(100), dec!(0.5));
    assert!(!db::update_balance(&conn, 404, dec!(1)).unwrap());
}

#[test]
fn update_language_persists() {
    let ledger = TestLedger::new();
    ledger.seed_user(100, Decimal::ZERO);
    let conn = db::get_connection(&ledger.pool).unwrap();

    assert_eq!(db::get_user_language(&conn, 100).unwrap().as_deref(), Some("ru"));
    assert!(db::update_language(&conn, 100, "en").unwrap());
    assert_eq!(db::get_user_language(&conn, 100).unwrap().as_deref(), Some("en"));
    assert!(!db::update_language(&conn, 404, "en").unwrap());
}

fn stats_for_fixture_at(now: chrono::DateTime<Utc>) -> Stats {
    let ledger = TestLedger::new();
    let mut conn = db::get_connection(&ledger.pool).unwrap();

    let offsets = [Duration::hours(25), Duration::days(2), Duration::days(10), Duration::days(40)];
    for (i, offset) in offsets.iter().enumerate() {
        db::create_user_at(&mut conn, 10 + i as i64, None, Decimal::ZERO, now - *offset).unwrap();
    }

    db::compute_stats_at(&conn, now).unwrap()
}

#[test]
fn stats_windows_follow_elapsed_time() {
    let expected = Stats {
        total: 4,
        last_day: 1,
        last_week: 2,
        last_month: 3,
    };

    for (hour, minute) in [(0, 0), (0, 30), (0, 59), (1, 0), (12, 0), (23, 0), (23, 59)] {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, hour, minute, 0).unwrap();
        assert_eq!(stats_for_fixture_at(now), expected, "query time {}", now);
    }
}

#[test]
fn stats_window_edges() {
    let ledger = TestLedger::new();
    let now = Utc.with_ymd_and_hms(2026, 10, 16, 0, 30, 0).unwrap();
    let mut conn = db::get_connection(&ledger.pool).unwrap();

    // 47h elapsed is still within the one-day window, exactly two days is not
    db::create_user_at(&mut conn, 1, None, Decimal::ZERO, now - Duration::hours(47)).unwrap();
    db::create_user_at(&mut conn, 2, None, Decimal::ZERO, now - Duration::days(2)).unwrap();
    db::create_user_at(&mut conn, 3, None, Decimal::ZERO, now - Duration::days(31)).unwrap();

    let stats = db::compute_stats_at(&conn, now).unwrap();

    assert_eq!(
        stats,
        Stats {
            total: 3,
            last_day: 1,
            last_week: 2,
            last_month: 2,
        }
    );
}

#[test]
fn list_all_user_ids_is_sorted() {
    let ledger = TestLedger::new();
    for id in [30, 10, 20] {
        ledger.seed_user(id, Decimal::ZERO);
    }
    let conn = db::get_connection(&ledger.pool).unwrap();

    assert_eq!(db::list_all_user_ids(&conn).unwrap(), vec![10, 20, 30]);
}

#[test]
fn export_includes_referrals() {
    let ledger = TestLedger::new();
    ledger.seed_user(100, Decimal::ZERO);
    let mut conn = db::get_connection(&ledger.pool).unwrap();
    db::create_user(&mut conn, 200, Some(100), dec!(0.14)).unwrap();
    db::create_user(&mut conn, 300, Some(100), dec!(0.14)).unwrap();

    let users = db::export_all(&conn).unwrap();
    assert_eq!(users.len(), 3);
    assert_eq!(users[&100].referrals, vec![200, 300]);
    assert_eq!(users[&100].balance, dec!(0.28));

    let json: serde_json::Value = serde_json::from_str(&export_to_json(&users).unwrap()).unwrap();
    assert_eq!(json["300"]["referred_by"], serde_json::json!(100));
    assert_eq!(json["100"]["referrals"], serde_json::json!([200, 300]));
}

#[test]
fn reopening_pool_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reopen.db");
    let path = path.to_str().unwrap();

    {
        let pool = db::create_pool(path).unwrap();
        let mut conn = db::get_connection(&pool).unwrap();
        db::create_user(&mut conn, 7, None, Decimal::ZERO).unwrap();
    }

    let pool = db::create_pool(path).unwrap();
    let conn = db::get_connection(&pool).unwrap();
    assert!(db::user_exists(&conn, 7).unwrap());
}
