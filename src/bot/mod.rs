pub mod callbacks;
pub mod commands;
pub mod events;
pub mod handlers;

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::config::AppConfig;
use crate::db::Database;
use crate::onboarding::OnboardingSessions;

/// Shared application state, accessible from all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub sessions: OnboardingSessions,
}

type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Commands first, then inline buttons, then every other message
/// (mini-app submissions and onboarding answers).
pub fn build_handler() -> UpdateHandler<HandlerError> {
    let commands = Update::filter_message()
        .filter_command::<commands::BotCommand>()
        .endpoint(commands::handle_command);

    let buttons = Update::filter_callback_query().endpoint(callbacks::handle_callback);

    let messages = Update::filter_message().endpoint(handlers::handle_message);

    dptree::entry().branch(commands).branch(buttons).branch(messages)
}

/// Publishes the command menu and serves updates until Ctrl-C.
pub async fn run(state: Arc<AppState>) {
    let bot = Bot::new(&state.config.telegram_bot_token);

    if let Err(e) = bot
        .set_my_commands(commands::BotCommand::bot_commands())
        .await
    {
        tracing::warn!("Could not publish the command menu: {}", e);
    }

    tracing::info!("🚛 Polling for updates");
    Dispatcher::builder(bot, build_handler())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    AppState {
        config: crate::config::test_config(),
        db: crate::db::test_db().await,
        sessions: OnboardingSessions::new(),
    }
}
