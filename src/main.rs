use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use dotenvy::dotenv;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;

use refbot::cli::{Cli, Commands};
use refbot::core::export::{export_file_name, export_to_json};
use refbot::core::{config, init_logger, Settings};
use refbot::dialog::DialogDeps;
use refbot::storage::db;
use refbot::storage::{create_pool, get_connection};
use refbot::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, configuration, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        None | Some(Commands::Run) => run_bot().await,
        Some(Commands::Stats) => print_stats(),
        Some(Commands::Export { output }) => export_database(output),
    }
}

async fn run_bot() -> Result<()> {
    log::info!("Starting referral bot...");

    let settings = Arc::new(Settings::from_env()?);
    log::info!(
        "Reward {} per referral, minimum withdrawal {}, {} admin(s)",
        settings.reward_amount,
        settings.min_withdrawal,
        settings.admin_ids.len()
    );

    let db_pool = Arc::new(create_pool(&config::DATABASE_PATH)?);
    log::info!("Database ready at {}", *config::DATABASE_PATH);

    let bot = create_bot()?;
    let me = bot.get_me().await?;
    let bot_username = me.username.clone();
    log::info!("Authorized as @{}", bot_username.as_deref().unwrap_or("<unknown>"));

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let handler_deps = HandlerDeps::new(DialogDeps::new(db_pool, settings), bot_username);
    let handler = schema(handler_deps);

    log::info!("📡 Ready to receive updates!");
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();
    Dispatcher::builder(bot, handler)
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}

fn print_stats() -> Result<()> {
    let pool = create_pool(&config::DATABASE_PATH)?;
    let conn = get_connection(&pool)?;
    let stats = db::compute_stats(&conn)?;

    println!("Total users:     {}", stats.total);
    println!("Since yesterday: {}", stats.last_day);
    println!("Last 7 days:     {}", stats.last_week);
    println!("Last 30 days:    {}", stats.last_month);
    Ok(())
}

fn export_database(output: Option<PathBuf>) -> Result<()> {
    let pool = create_pool(&config::DATABASE_PATH)?;
    let conn = get_connection(&pool)?;
    let users = db::export_all(&conn)?;

    let path = output.unwrap_or_else(|| PathBuf::from(export_file_name(Utc::now())));
    std::fs::write(&path, export_to_json(&users)?)?;

    log::info!("Exported {} users to {}", users.len(), path.display());
    println!("{}", path.display());
    Ok(())
}
