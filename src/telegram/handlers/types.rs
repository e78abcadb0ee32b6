//! Handler types, dependencies and message helpers

use teloxide::prelude::*;
use teloxide::types::Message;

use crate::dialog::{DialogDeps, Inbound};
use crate::i18n;
use crate::telegram::Bot;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub dialog: DialogDeps,
    /// Used to build referral links
    pub bot_username: Option<String>,
}

impl HandlerDeps {
    pub fn new(dialog: DialogDeps, bot_username: Option<String>) -> Self {
        Self { dialog, bot_username }
    }
}

/// Telegram id of the message author.
pub fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok())
}

/// Reduces a Telegram message to what dialogs understand.
pub fn inbound_from_message(msg: &Message) -> Inbound {
    if let Some(text) = msg.text() {
        return Inbound::Text(text.to_string());
    }
    // Telegram lists sizes ascending; resend the largest
    match msg.photo().and_then(|sizes| sizes.last()) {
        Some(photo) => Inbound::Photo {
            file_id: photo.file.id.0.clone(),
            caption: msg.caption().map(str::to_string),
        },
        None => Inbound::Other,
    }
}

/// Logs a failed operation and answers with the generic error text.
pub async fn report_failure(bot: &Bot, chat_id: ChatId, user_id: i64, deps: &HandlerDeps, error: HandlerError) {
    log::error!("Handler failed for user {}: {}", user_id, error);
    let lang = deps.dialog.lang(user_id);
    if let Err(e) = bot.send_message(chat_id, i18n::t(&lang, "error-generic")).await {
        log::warn!("Failed to report error to {}: {}", user_id, e);
    }
}
