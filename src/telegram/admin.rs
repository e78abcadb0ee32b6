//! Admin panel: menu, counters and database export
//!
//! Access is plain membership in `ADMIN_IDS`; non-admins get a single
//! refusal and no session is opened.

use chrono::Utc;
use fluent_templates::fluent_bundle::FluentArgs;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode};
use unic_langid::LanguageIdentifier;

use crate::core::export::{export_file_name, export_to_json};
use crate::dialog::{balance_edit, broadcast};
use crate::i18n;
use crate::storage::db::{self, Stats};
use crate::telegram::handlers::{HandlerDeps, HandlerError};
use crate::telegram::{Bot, TelegramOutbox};

/// Buttons of the admin menu (`admin:*` callbacks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    UserCount,
    Stats,
    DbDownload,
    MassMessage,
    ChangeBalance,
}

impl AdminAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "user_count" => Some(AdminAction::UserCount),
            "stats" => Some(AdminAction::Stats),
            "db_download" => Some(AdminAction::DbDownload),
            "mass_message" => Some(AdminAction::MassMessage),
            "change_balance" => Some(AdminAction::ChangeBalance),
            _ => None,
        }
    }
}

pub fn admin_keyboard(lang: &LanguageIdentifier) -> InlineKeyboardMarkup {
    let button = |key: &str, data: &str| InlineKeyboardButton::callback(i18n::t(lang, key), data.to_string());
    InlineKeyboardMarkup::new(vec![
        vec![
            button("btn-user-count", "admin:user_count"),
            button("btn-stats", "admin:stats"),
        ],
        vec![
            button("btn-db-download", "admin:db_download"),
            button("btn-mass-message", "admin:mass_message"),
        ],
        vec![button("btn-change-balance", "admin:change_balance")],
        vec![button("btn-back-to-user-menu", "menu:main")],
    ])
}

/// HTML statistics message.
pub fn stats_text(lang: &LanguageIdentifier, stats: &Stats) -> String {
    let mut args = FluentArgs::new();
    args.set("total", stats.total.to_string());
    args.set("day", stats.last_day.to_string());
    args.set("week", stats.last_week.to_string());
    args.set("month", stats.last_month.to_string());
    format!(
        "<b>{}</b>\n\n{}",
        i18n::t(lang, "stats-title"),
        i18n::t_args(lang, "stats-text", &args)
    )
}

async fn refuse(bot: &Bot, chat_id: ChatId, lang: &LanguageIdentifier) -> ResponseResult<()> {
    bot.send_message(chat_id, i18n::t(lang, "not-admin")).await?;
    Ok(())
}

/// Handle /admin command - show the admin menu
pub async fn handle_admin_command(bot: &Bot, chat_id: ChatId, user_id: i64, deps: &HandlerDeps) -> ResponseResult<()> {
    let lang = deps.dialog.lang(user_id);
    if !deps.dialog.settings.is_admin(user_id) {
        log::warn!("Non-admin {} tried /admin", user_id);
        return refuse(bot, chat_id, &lang).await;
    }

    bot.send_message(chat_id, i18n::t(&lang, "admin-activated"))
        .reply_markup(admin_keyboard(&lang))
        .await?;
    Ok(())
}

/// Runs one admin menu button.
pub async fn handle_admin_action(
    bot: &Bot,
    chat_id: ChatId,
    user_id: i64,
    action: AdminAction,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let lang = deps.dialog.lang(user_id);
    if !deps.dialog.settings.is_admin(user_id) {
        log::warn!("Non-admin {} pressed {:?}", user_id, action);
        refuse(bot, chat_id, &lang).await?;
        return Ok(());
    }

    match action {
        AdminAction::UserCount => {
            let stats = {
                let conn = db::get_connection(&deps.dialog.db_pool)?;
                db::compute_stats(&conn)?
            };
            let mut args = FluentArgs::new();
            args.set("total", stats.total.to_string());
            bot.send_message(chat_id, i18n::t_args(&lang, "user-count", &args))
                .await?;
        }
        AdminAction::Stats => {
            let stats = {
                let conn = db::get_connection(&deps.dialog.db_pool)?;
                db::compute_stats(&conn)?
            };
            bot.send_message(chat_id, stats_text(&lang, &stats))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        AdminAction::DbDownload => send_database_export(bot, chat_id, &lang, deps).await?,
        AdminAction::MassMessage => {
            let outbox = TelegramOutbox::new(bot.clone());
            broadcast::start_broadcast(&deps.dialog, &outbox, user_id).await;
        }
        AdminAction::ChangeBalance => {
            let outbox = TelegramOutbox::new(bot.clone());
            balance_edit::start_balance_edit(&deps.dialog, &outbox, user_id).await;
        }
    }

    Ok(())
}

/// Sends the whole ledger as a JSON document.
async fn send_database_export(
    bot: &Bot,
    chat_id: ChatId,
    lang: &LanguageIdentifier,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let users = {
        let conn = db::get_connection(&deps.dialog.db_pool)?;
        db::export_all(&conn)?
    };

    if users.is_empty() {
        bot.send_message(chat_id, i18n::t(lang, "db-empty")).await?;
        return Ok(());
    }

    let json = export_to_json(&users)?;
    let file_name = export_file_name(Utc::now());
    log::info!("Exporting {} users as {}", users.len(), file_name);

    bot.send_document(chat_id, InputFile::memory(json.into_bytes()).file_name(file_name))
        .caption(i18n::t(lang, "db-caption"))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_admin_actions() {
        assert_eq!(AdminAction::parse("db_download"), Some(AdminAction::DbDownload));
        assert_eq!(AdminAction::parse("change_balance"), Some(AdminAction::ChangeBalance));
        assert_eq!(AdminAction::parse("users"), None);
    }

    #[test]
    fn admin_keyboard_ends_with_back_button() {
        let lang = i18n::lang_from_code("en");
        let keyboard = admin_keyboard(&lang);
        assert_eq!(keyboard.inline_keyboard.len(), 4);
        assert_eq!(keyboard.inline_keyboard[3][0].text, "⬅️ Back to user menu");
    }

    #[test]
    fn stats_text_lists_all_windows() {
        let lang = i18n::lang_from_code("en");
        let stats = Stats {
            total: 4,
            last_day: 1,
            last_week: 2,
            last_month: 3,
        };
        let text = stats_text(&lang, &stats);

        assert!(text.starts_with("<b>📊 Statistics</b>"));
        assert!(text.contains("Total users: 4"));
        assert!(text.contains("Since yesterday: 1"));
        assert!(text.contains("Last 7 days: 2"));
        assert!(text.contains("Last 30 days: 3"));
    }
}
