//! Admin balance edit: pick a user, then overwrite their balance

use fluent_templates::fluent_bundle::FluentArgs;
use rust_decimal::Decimal;

use crate::core::amount::{format_amount, parse_amount};
use crate::core::error::{AppError, AppResult};
use crate::dialog::outbox::{notify, Outbox, Outgoing};
use crate::dialog::session::{AdminSession, Session};
use crate::dialog::DialogDeps;
use crate::i18n;
use crate::storage::db;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    UnknownUser,
    AwaitingAmount { target: i64, balance: Decimal },
    NoPendingEdit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountOutcome {
    InvalidAmount,
    Updated { target: i64, amount: Decimal },
    NoPendingEdit,
}

pub async fn start_balance_edit(deps: &DialogDeps, outbox: &dyn Outbox, admin_id: i64) {
    deps.sessions
        .open(admin_id, Session::Admin(AdminSession::AwaitingBalanceUserId));
    let lang = deps.lang(admin_id);
    notify(outbox, admin_id, Outgoing::Text(i18n::t(&lang, "balance-prompt-id"))).await;
}

/// First step: the input must name a registered user.
pub async fn submit_target(deps: &DialogDeps, outbox: &dyn Outbox, admin_id: i64, input: &str) -> AppResult<TargetOutcome> {
    let lang = deps.lang(admin_id);
    let input = input.trim();

    let target = match input.parse::<i64>() {
        Ok(user_id) => {
            let conn = db::get_connection(&deps.db_pool)?;
            db::get_user(&conn, user_id)?
        }
        Err(_) => None,
    };

    let Some(user) = target else {
        let mut args = FluentArgs::new();
        args.set("input", input.to_string());
        let text = i18n::t_args(&lang, "balance-user-not-found", &args);
        notify(outbox, admin_id, Outgoing::Text(text)).await;
        return Ok(TargetOutcome::UnknownUser);
    };

    let advanced = deps.sessions.replace_if(
        admin_id,
        &Session::Admin(AdminSession::AwaitingBalanceUserId),
        Session::Admin(AdminSession::AwaitingBalanceAmount { target: user.user_id }),
    );
    if !advanced {
        return Ok(TargetOutcome::NoPendingEdit);
    }

    let mut args = FluentArgs::new();
    args.set("user_id", user.user_id.to_string());
    args.set("balance", format_amount(user.balance));
    let text = i18n::t_args(&lang, "balance-prompt-amount", &args);
    notify(outbox, admin_id, Outgoing::Html(text)).await;

    Ok(TargetOutcome::AwaitingAmount {
        target: user.user_id,
        balance: user.balance,
    })
}

/// Second step: overwrite the target's balance with a non-negative amount.
pub async fn submit_amount(
    deps: &DialogDeps,
    outbox: &dyn Outbox,
    admin_id: i64,
    target: i64,
    input: &str,
) -> AppResult<AmountOutcome> {
    let lang = deps.lang(admin_id);

    let Some(amount) = parse_amount(input) else {
        notify(outbox, admin_id, Outgoing::Text(i18n::t(&lang, "balance-invalid-amount"))).await;
        return Ok(AmountOutcome::InvalidAmount);
    };

    let expected = Session::Admin(AdminSession::AwaitingBalanceAmount { target });
    let Some(claimed) = deps.sessions.take_if(admin_id, |s| *s == expected) else {
        return Ok(AmountOutcome::NoPendingEdit);
    };

    let updated = db::get_connection(&deps.db_pool)
        .map_err(AppError::from)
        .and_then(|conn| db::update_balance(&conn, target, amount));
    match updated {
        Ok(true) => {}
        Ok(false) => {
            return Err(AppError::Ledger(format!("user {} vanished during balance edit", target)));
        }
        Err(e) => {
            deps.sessions.open(admin_id, claimed);
            return Err(e);
        }
    }

    log::info!("Admin {} set balance of {} to {}", admin_id, target, amount);

    let mut args = FluentArgs::new();
    args.set("user_id", target.to_string());
    args.set("amount", format_amount(amount));
    notify(outbox, admin_id, Outgoing::Text(i18n::t_args(&lang, "balance-update-success", &args))).await;

    Ok(AmountOutcome::Updated { target, amount })
}
