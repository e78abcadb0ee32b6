//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::{handle_cancel_command, handle_start_command};
use super::types::{inbound_from_message, report_failure, sender_id, HandlerDeps, HandlerError};
use crate::dialog::{self, Routed};
use crate::telegram::admin::handle_admin_command;
use crate::telegram::bot::Command;
use crate::telegram::menu::handle_menu_callback;
use crate::telegram::{Bot, TelegramOutbox};

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Commands are matched first so `/cancel` always reaches its handler, even
/// mid-dialog; any other private message goes to the user's open dialog.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .branch(dptree::entry().filter_command::<Command>().endpoint(
            move |bot: Bot, msg: Message, cmd: Command| {
                let deps = deps.clone();
                async move {
                    log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);
                    let user_id = sender_id(&msg).unwrap_or(msg.chat.id.0);

                    let result = match cmd {
                        Command::Start(arg) => handle_start_command(&bot, &msg, &deps, &arg).await,
                        Command::Admin => handle_admin_command(&bot, msg.chat.id, user_id, &deps)
                            .await
                            .map_err(HandlerError::from),
                        Command::Cancel => {
                            handle_cancel_command(&bot, &msg, &deps).await;
                            Ok(())
                        }
                    };

                    if let Err(e) = result {
                        report_failure(&bot, msg.chat.id, user_id, &deps, e).await;
                    }
                    Ok(())
                }
            },
        ))
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let Some(user_id) = sender_id(&msg) else {
                    return Ok(());
                };

                let outbox = TelegramOutbox::new(bot.clone());
                match dialog::route_message(&deps.dialog, &outbox, user_id, inbound_from_message(&msg)).await {
                    Ok(Routed::Consumed) => {}
                    Ok(Routed::NoSession) => log::debug!("No open dialog for {}, message ignored", user_id),
                    Err(e) => report_failure(&bot, msg.chat.id, user_id, &deps, Box::new(e)).await,
                }
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move { handle_menu_callback(bot, q, &deps).await }
    })
}
