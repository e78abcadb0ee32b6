//! Command handler implementations (/start, /cancel)

use teloxide::types::Message;

use super::types::{sender_id, HandlerDeps, HandlerError};
use crate::dialog::{self, referral};
use crate::telegram::menu::{send_language_selection, send_profile};
use crate::telegram::{Bot, TelegramOutbox};

/// Handle /start command
///
/// New users are registered (crediting the referrer from the deep-link
/// argument) and asked for a language; known users get their profile.
pub(super) async fn handle_start_command(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    start_arg: &str,
) -> Result<(), HandlerError> {
    let Some(user_id) = sender_id(msg) else {
        return Ok(());
    };

    let outbox = TelegramOutbox::new(bot.clone());
    match referral::register(&deps.dialog, &outbox, user_id, start_arg).await? {
        referral::Registration::Existing(user) => send_profile(bot, msg.chat.id, &user, deps).await?,
        referral::Registration::Created { .. } => send_language_selection(bot, msg.chat.id).await?,
    }
    Ok(())
}

/// Handle /cancel command - drop whatever dialog is open
pub(super) async fn handle_cancel_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) {
    let Some(user_id) = sender_id(msg) else {
        return;
    };
    let outbox = TelegramOutbox::new(bot.clone());
    dialog::cancel(&deps.dialog, &outbox, user_id).await;
}
