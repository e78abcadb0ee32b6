//! Bot API implementation of the dialog outbox

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, ParseMode};

use crate::core::error::DeliveryError;
use crate::dialog::{Outbox, Outgoing};
use crate::telegram::Bot;

/// Delivers dialog messages through the Bot API.
#[derive(Clone)]
pub struct TelegramOutbox {
    bot: Bot,
}

impl TelegramOutbox {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Outbox for TelegramOutbox {
    async fn deliver(&self, chat_id: i64, message: Outgoing) -> Result<(), DeliveryError> {
        let chat = ChatId(chat_id);
        let sent = match message {
            Outgoing::Text(text) => self.bot.send_message(chat, text).await.map(|_| ()),
            Outgoing::Html(text) => self
                .bot
                .send_message(chat, text)
                .parse_mode(ParseMode::Html)
                .await
                .map(|_| ()),
            Outgoing::Photo { file_id, caption } => {
                let mut request = self.bot.send_photo(chat, InputFile::file_id(FileId(file_id)));
                if let Some(caption) = caption {
                    request = request.caption(caption);
                }
                request.await.map(|_| ())
            }
        };

        sent.map_err(|e| DeliveryError::new(chat_id, e.to_string()))
    }
}
