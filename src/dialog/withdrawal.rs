//! Withdrawal dialog: balance check, wallet collection, payout request

use fluent_templates::fluent_bundle::FluentArgs;
use lazy_regex::regex_is_match;
use rust_decimal::Decimal;

use crate::core::amount::format_amount;
use crate::core::error::{AppError, AppResult};
use crate::dialog::outbox::{notify, Outbox, Outgoing};
use crate::dialog::session::{Session, UserSession};
use crate::dialog::DialogDeps;
use crate::i18n;
use crate::storage::db;

/// TRC20 address: `T` followed by 33 alphanumerics.
pub fn is_valid_wallet(address: &str) -> bool {
    regex_is_match!(r"^T[a-zA-Z0-9]{33}$", address)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalStart {
    Insufficient { balance: Decimal, minimum: Decimal },
    AwaitingWallet { amount: Decimal },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletOutcome {
    InvalidAddress,
    Completed { amount: Decimal, wallet: String },
    /// The session was cancelled or claimed by a concurrent message.
    NoPendingWithdrawal,
}

/// Opens a withdrawal if the balance reaches the minimum.
///
/// The amount to pay is captured now and is not re-read when the wallet
/// arrives.
pub async fn start_withdrawal(deps: &DialogDeps, outbox: &dyn Outbox, user_id: i64) -> AppResult<WithdrawalStart> {
    let user = {
        let conn = db::get_connection(&deps.db_pool)?;
        db::get_user(&conn, user_id)?
    }
    .ok_or_else(|| AppError::Ledger(format!("user {} is not registered", user_id)))?;

    let lang = i18n::lang_from_code(&user.language);
    let minimum = deps.settings.min_withdrawal;

    if user.balance < minimum {
        let mut args = FluentArgs::new();
        args.set("min", format_amount(minimum));
        args.set("balance", format_amount(user.balance));
        let text = i18n::t_args(&lang, "withdraw-insufficient-funds", &args);
        notify(outbox, user_id, Outgoing::Text(text)).await;
        return Ok(WithdrawalStart::Insufficient {
            balance: user.balance,
            minimum,
        });
    }

    let amount = user.balance;
    deps.sessions
        .open(user_id, Session::User(UserSession::AwaitingWallet { amount }));
    log::info!("User {} opened a withdrawal of {}", user_id, amount);

    let mut args = FluentArgs::new();
    args.set("amount", format_amount(amount));
    notify(outbox, user_id, Outgoing::Text(i18n::t_args(&lang, "withdraw-prompt", &args))).await;

    Ok(WithdrawalStart::AwaitingWallet { amount })
}

/// Consumes the wallet address of an open withdrawal.
///
/// On a valid address the session is claimed, the balance is zeroed and the
/// user and every administrator are notified. A failed reset puts the
/// session back so the user can retry.
pub async fn submit_wallet(deps: &DialogDeps, outbox: &dyn Outbox, user_id: i64, input: &str) -> AppResult<WalletOutcome> {
    let lang = deps.lang(user_id);

    if !is_valid_wallet(input) {
        if !matches!(deps.sessions.get(user_id), Some(Session::User(UserSession::AwaitingWallet { .. }))) {
            return Ok(WalletOutcome::NoPendingWithdrawal);
        }
        notify(outbox, user_id, Outgoing::Text(i18n::t(&lang, "withdraw-invalid-wallet"))).await;
        return Ok(WalletOutcome::InvalidAddress);
    }

    let claimed = deps
        .sessions
        .take_if(user_id, |s| matches!(s, Session::User(UserSession::AwaitingWallet { .. })));
    let Some(Session::User(UserSession::AwaitingWallet { amount })) = claimed else {
        return Ok(WalletOutcome::NoPendingWithdrawal);
    };

    let reset = db::get_connection(&deps.db_pool)
        .map_err(AppError::from)
        .and_then(|conn| db::update_balance(&conn, user_id, Decimal::ZERO));
    match reset {
        Ok(true) => {}
        Ok(false) => {
            return Err(AppError::Ledger(format!("user {} vanished during withdrawal", user_id)));
        }
        Err(e) => {
            deps.sessions
                .open(user_id, Session::User(UserSession::AwaitingWallet { amount }));
            return Err(e);
        }
    }

    log::info!("Withdrawal of {} by {} to {}", amount, user_id, input);

    let mut args = FluentArgs::new();
    args.set("amount", format_amount(amount));
    args.set("wallet", input.to_string());
    notify(outbox, user_id, Outgoing::Html(i18n::t_args(&lang, "withdraw-success-user", &args))).await;

    args.set("user_id", user_id.to_string());
    for &admin_id in &deps.settings.admin_ids {
        let admin_lang = deps.lang(admin_id);
        let text = i18n::t_args(&admin_lang, "admin-withdrawal-notification", &args);
        notify(outbox, admin_id, Outgoing::Html(text)).await;
    }

    Ok(WalletOutcome::Completed {
        amount,
        wallet: input.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_trc20_shape() {
        assert!(is_valid_wallet("TQn9Y2khEsLJW1ChVWFMSMeRDow5KcbLSE"));
        assert!(is_valid_wallet(&format!("T{}", "a".repeat(33))));
    }

    #[test]
    fn rejects_wrong_prefix_length_or_charset() {
        assert!(!is_valid_wallet(&format!("X{}", "a".repeat(33))));
        assert!(!is_valid_wallet(&format!("T{}", "a".repeat(32))));
        assert!(!is_valid_wallet(&format!("T{}", "a".repeat(34))));
        assert!(!is_valid_wallet(&format!("T{}-", "a".repeat(32))));
        assert!(!is_valid_wallet(""));
        assert!(!is_valid_wallet(&format!(" T{}", "a".repeat(33))));
    }
}
