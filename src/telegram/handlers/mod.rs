//! Telegram bot handler tree configuration
//!
//! Dialog logic lives in [`crate::dialog`]; handlers here only translate
//! updates into dialog calls and render menus.

mod commands;
mod schema;
mod types;

pub use schema::schema;
pub use types::{inbound_from_message, report_failure, sender_id, HandlerDeps, HandlerError};
