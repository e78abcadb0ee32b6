//! User menus: language picker, profile and callback routing

use std::sync::Arc;

use fluent_templates::fluent_bundle::FluentArgs;
use rust_decimal::Decimal;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use unic_langid::LanguageIdentifier;

use crate::core::amount::format_amount;
use crate::core::error::AppResult;
use crate::dialog::withdrawal;
use crate::i18n;
use crate::storage::db::{self, DbPool, User};
use crate::telegram::admin::{self, AdminAction};
use crate::telegram::handlers::{report_failure, HandlerDeps, HandlerError};
use crate::telegram::{Bot, TelegramOutbox};

/// Parsed inline button payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Language(&'static str),
    MainMenu,
    Balance,
    Withdraw,
    Gift,
    Admin(AdminAction),
}

impl CallbackAction {
    /// Parses `lang:*`, `menu:*`, `user:*` and `admin:*` payloads.
    pub fn parse(data: &str) -> Option<Self> {
        let (scope, action) = data.split_once(':')?;
        match scope {
            "lang" => i18n::is_language_supported(action)
                .filter(|code| code.eq_ignore_ascii_case(action))
                .map(CallbackAction::Language),
            "menu" if action == "main" => Some(CallbackAction::MainMenu),
            "user" => match action {
                "balance" => Some(CallbackAction::Balance),
                "withdraw" => Some(CallbackAction::Withdraw),
                "gift" => Some(CallbackAction::Gift),
                _ => None,
            },
            "admin" => AdminAction::parse(action).map(CallbackAction::Admin),
            _ => None,
        }
    }
}

/// Deep link that registers the opener as a referral of `user_id`.
pub fn referral_link(bot_username: Option<&str>, user_id: i64) -> String {
    format!("https://t.me/{}?start={}", bot_username.unwrap_or_default(), user_id)
}

/// HTML profile text of a user.
pub fn profile_text(lang: &LanguageIdentifier, user: &User, min_withdrawal: Decimal, link: &str) -> String {
    let mut args = FluentArgs::new();
    args.set("min", format_amount(min_withdrawal));
    args.set("link", link.to_string());
    args.set("count", user.referrals.len().to_string());
    args.set("balance", format_amount(user.balance));
    args.set("id", user.user_id.to_string());
    i18n::t_args(lang, "profile-text", &args)
}

pub fn profile_keyboard(lang: &LanguageIdentifier) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback(i18n::t(lang, "btn-balance"), "user:balance"),
            InlineKeyboardButton::callback(i18n::t(lang, "btn-withdraw"), "user:withdraw"),
        ],
        vec![InlineKeyboardButton::callback(i18n::t(lang, "btn-gift"), "user:gift")],
    ])
}

/// One button per supported language.
pub fn language_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        i18n::SUPPORTED_LANGS
            .iter()
            .map(|(code, name)| vec![InlineKeyboardButton::callback(*name, format!("lang:{}", code))])
            .collect::<Vec<_>>(),
    )
}

/// Greeting shown before a language is chosen, in every supported language.
pub fn welcome_text() -> String {
    i18n::SUPPORTED_LANGS
        .iter()
        .rev()
        .map(|(code, _)| i18n::t(&i18n::lang_from_code(code), "welcome"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub async fn send_language_selection(bot: &Bot, chat_id: ChatId) -> ResponseResult<()> {
    bot.send_message(chat_id, welcome_text())
        .reply_markup(language_keyboard())
        .await?;
    Ok(())
}

fn load_user(db_pool: &Arc<DbPool>, user_id: i64) -> AppResult<Option<User>> {
    let conn = db::get_connection(db_pool)?;
    db::get_user(&conn, user_id)
}

/// Sends the profile as a new message.
pub async fn send_profile(bot: &Bot, chat_id: ChatId, user: &User, deps: &HandlerDeps) -> ResponseResult<()> {
    let lang = i18n::lang_from_code(&user.language);
    let link = referral_link(deps.bot_username.as_deref(), user.user_id);
    let text = profile_text(&lang, user, deps.dialog.settings.min_withdrawal, &link);

    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(profile_keyboard(&lang))
        .await?;
    Ok(())
}

/// Replaces a menu message with the freshly loaded profile.
async fn edit_to_profile(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    user_id: i64,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let Some(user) = load_user(&deps.dialog.db_pool, user_id)? else {
        log::warn!("Profile requested by unregistered user {}", user_id);
        return Ok(());
    };

    let lang = i18n::lang_from_code(&user.language);
    let link = referral_link(deps.bot_username.as_deref(), user.user_id);
    let text = profile_text(&lang, &user, deps.dialog.settings.min_withdrawal, &link);

    let edited = bot
        .edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(profile_keyboard(&lang))
        .await;
    if let Err(e) = edited {
        // "message is not modified" when nothing changed
        log::debug!("Profile edit skipped for {}: {}", user_id, e);
    }
    Ok(())
}

/// Routes inline button presses.
pub async fn handle_menu_callback(bot: Bot, q: CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        log::debug!("Callback answer failed for {}: {}", q.from.id, e);
    }

    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        log::debug!("Ignoring callback data {:?}", q.data);
        return Ok(());
    };
    let (Some(chat_id), Some(message_id)) = (q.message.as_ref().map(|m| m.chat().id), q.message.as_ref().map(|m| m.id()))
    else {
        return Ok(());
    };
    let Ok(user_id) = i64::try_from(q.from.id.0) else {
        return Ok(());
    };

    if let Err(e) = dispatch_action(&bot, chat_id, message_id, user_id, action, deps).await {
        report_failure(&bot, chat_id, user_id, deps, e).await;
    }
    Ok(())
}

async fn dispatch_action(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    user_id: i64,
    action: CallbackAction,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    log::info!("Callback {:?} from {}", action, user_id);

    match action {
        CallbackAction::Language(code) => {
            let updated = {
                let conn = db::get_connection(&deps.dialog.db_pool)?;
                db::update_language(&conn, user_id, code)?
            };
            if !updated {
                log::warn!("Language chosen by unregistered user {}", user_id);
            }
            edit_to_profile(bot, chat_id, message_id, user_id, deps).await?;
        }
        CallbackAction::MainMenu => {
            edit_to_profile(bot, chat_id, message_id, user_id, deps).await?;
        }
        CallbackAction::Balance => {
            if let Some(user) = load_user(&deps.dialog.db_pool, user_id)? {
                let lang = i18n::lang_from_code(&user.language);
                let mut args = FluentArgs::new();
                args.set("balance", format_amount(user.balance));
                bot.send_message(chat_id, i18n::t_args(&lang, "balance-display", &args))
                    .await?;
            }
            edit_to_profile(bot, chat_id, message_id, user_id, deps).await?;
        }
        CallbackAction::Withdraw => {
            let outbox = TelegramOutbox::new(bot.clone());
            withdrawal::start_withdrawal(&deps.dialog, &outbox, user_id).await?;
        }
        CallbackAction::Gift => {
            let lang = deps.dialog.lang(user_id);
            bot.send_message(chat_id, i18n::t(&lang, "gift-not-implemented")).await?;
        }
        CallbackAction::Admin(admin_action) => {
            admin::handle_admin_action(bot, chat_id, user_id, admin_action, deps).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_known_callbacks() {
        assert_eq!(CallbackAction::parse("lang:en"), Some(CallbackAction::Language("en")));
        assert_eq!(CallbackAction::parse("lang:ru"), Some(CallbackAction::Language("ru")));
        assert_eq!(CallbackAction::parse("menu:main"), Some(CallbackAction::MainMenu));
        assert_eq!(CallbackAction::parse("user:withdraw"), Some(CallbackAction::Withdraw));
        assert_eq!(
            CallbackAction::parse("admin:stats"),
            Some(CallbackAction::Admin(AdminAction::Stats))
        );
    }

    #[test]
    fn rejects_unknown_callbacks() {
        assert_eq!(CallbackAction::parse("lang:de"), None);
        assert_eq!(CallbackAction::parse("lang:en-US"), None);
        assert_eq!(CallbackAction::parse("user:steal"), None);
        assert_eq!(CallbackAction::parse("menu"), None);
        assert_eq!(CallbackAction::parse(""), None);
    }

    #[test]
    fn profile_lists_link_balance_and_referrals() {
        let user = User {
            user_id: 42,
            balance: dec!(0.28),
            referred_by: None,
            join_date: Utc::now(),
            language: "en".to_string(),
            referrals: vec![43, 44],
        };
        let lang = i18n::lang_from_code("en");
        let link = referral_link(Some("ref_bot"), user.user_id);
        let text = profile_text(&lang, &user, dec!(10), &link);

        assert_eq!(link, "https://t.me/ref_bot?start=42");
        assert!(text.contains("<code>https://t.me/ref_bot?start=42</code>"));
        assert!(text.contains("<b>2 confirmed referrals</b>"));
        assert!(text.contains("0.28 USDT"));
        assert!(text.contains("10.00 USDT"));
    }

    #[test]
    fn language_keyboard_offers_every_language() {
        let keyboard = language_keyboard();
        assert_eq!(keyboard.inline_keyboard.len(), i18n::SUPPORTED_LANGS.len());
        assert!(welcome_text().contains("Welcome"));
    }
}
