//! Outbound message abstraction
//!
//! Dialog flows talk to chats only through [`Outbox`], so they run the same
//! against the Bot API and against a recording fake in tests.

use async_trait::async_trait;

use crate::core::error::DeliveryError;

/// A message the bot wants to send to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text(String),
    /// Text with Telegram HTML markup.
    Html(String),
    /// Photo re-sent by its Telegram file id.
    Photo { file_id: String, caption: Option<String> },
}

impl Outgoing {
    /// Visible text of the message, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Outgoing::Text(text) | Outgoing::Html(text) => Some(text),
            Outgoing::Photo { caption, .. } => caption.as_deref(),
        }
    }
}

#[async_trait]
pub trait Outbox: Send + Sync {
    async fn deliver(&self, chat_id: i64, message: Outgoing) -> Result<(), DeliveryError>;
}

/// Best-effort delivery: failures are logged and otherwise ignored.
pub async fn notify(outbox: &dyn Outbox, chat_id: i64, message: Outgoing) -> bool {
    match outbox.deliver(chat_id, message).await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to notify {}: {}", chat_id, e);
            false
        }
    }
}
