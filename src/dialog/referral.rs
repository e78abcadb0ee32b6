//! Registration through `/start`, with optional referral credit

use fluent_templates::fluent_bundle::FluentArgs;
use rusqlite::Connection;

use crate::core::amount::format_amount;
use crate::core::error::{AppError, AppResult};
use crate::dialog::outbox::{notify, Outbox, Outgoing};
use crate::dialog::DialogDeps;
use crate::i18n;
use crate::storage::db::{self, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The user was already known; nothing changed.
    Existing(User),
    Created { user: User, referrer: Option<i64> },
}

impl Registration {
    pub fn user(&self) -> &User {
        match self {
            Registration::Existing(user) | Registration::Created { user, .. } => user,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Registration::Created { .. })
    }
}

/// Turns a `/start` argument into a referrer id the ledger will accept.
///
/// Anything that is not the id of another registered user is ignored, so the
/// store never sees a self-referral or a dangling referrer.
pub fn resolve_referrer(conn: &Connection, new_user_id: i64, start_arg: &str) -> AppResult<Option<i64>> {
    let Ok(candidate) = start_arg.trim().parse::<i64>() else {
        return Ok(None);
    };
    if candidate <= 0 || candidate == new_user_id {
        return Ok(None);
    }
    if db::user_exists(conn, candidate)? {
        Ok(Some(candidate))
    } else {
        Ok(None)
    }
}

/// Registers `user_id` on first contact, crediting a valid referrer.
///
/// Later calls return the stored record untouched; the referrer is fixed at
/// creation.
pub async fn register(deps: &DialogDeps, outbox: &dyn Outbox, user_id: i64, start_arg: &str) -> AppResult<Registration> {
    let (user, referrer) = {
        let mut conn = db::get_connection(&deps.db_pool)?;
        if let Some(user) = db::get_user(&conn, user_id)? {
            return Ok(Registration::Existing(user));
        }

        let referrer = resolve_referrer(&conn, user_id, start_arg)?;
        if let Err(e) = db::create_user(&mut conn, user_id, referrer, deps.settings.reward_amount) {
            // a concurrent /start from the same user got there first
            if let Some(user) = db::get_user(&conn, user_id)? {
                log::debug!("User {} registered concurrently: {}", user_id, e);
                return Ok(Registration::Existing(user));
            }
            return Err(e);
        }

        let user = db::get_user(&conn, user_id)?
            .ok_or_else(|| AppError::Ledger(format!("user {} missing right after creation", user_id)))?;
        (user, referrer)
    };

    match referrer {
        Some(referrer_id) => {
            log::info!("New user {} referred by {}", user_id, referrer_id);
            let lang = deps.lang(referrer_id);
            let mut args = FluentArgs::new();
            args.set("bonus", format_amount(deps.settings.reward_amount));
            let text = i18n::t_args(&lang, "new-referral-notification", &args);
            notify(outbox, referrer_id, Outgoing::Text(text)).await;
        }
        None => log::info!("New user {}", user_id),
    }

    Ok(Registration::Created { user, referrer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::run_migrations;
    use rust_decimal_macros::dec;

    fn ledger() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        db::create_user(&mut conn, 100, None, dec!(0.14)).unwrap();
        conn
    }

    #[test]
    fn accepts_existing_other_user() {
        let conn = ledger();
        assert_eq!(resolve_referrer(&conn, 200, "100").unwrap(), Some(100));
        assert_eq!(resolve_referrer(&conn, 200, " 100 ").unwrap(), Some(100));
    }

    #[test]
    fn rejects_self_unknown_and_junk() {
        let conn = ledger();
        assert_eq!(resolve_referrer(&conn, 100, "100").unwrap(), None);
        assert_eq!(resolve_referrer(&conn, 200, "999").unwrap(), None);
        assert_eq!(resolve_referrer(&conn, 200, "").unwrap(), None);
        assert_eq!(resolve_referrer(&conn, 200, "ref_100").unwrap(), None);
        assert_eq!(resolve_referrer(&conn, 200, "-100").unwrap(), None);
    }
}
