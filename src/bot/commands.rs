use std::path::Path;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::bot::AppState;
use crate::db::models::UserField;
use crate::{intro, requests, webapp};

const ACCESS_DENIED: &str = "⛔️ У вас нет доступа к этой команде.";
const RECENT_REQUESTS_LIMIT: i64 = 20;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum BotCommand {
    #[command(description = "Начать / перезапустить бота")]
    Start(String),
    #[command(description = "Открыть мини-приложение")]
    Webapp,
    #[command(description = "Реферальная ссылка")]
    Ref,
    #[command(description = "Последние заявки (админ)")]
    Requests,
    #[command(description = "Удалить все данные (админ)")]
    Clear,
    #[command(description = "Показать помощь")]
    Help,
}

/// `ref_<id>` deep-link payload of a referral link.
pub fn parse_referrer(payload: &str) -> Option<i64> {
    payload.trim().strip_prefix("ref_")?.parse().ok()
}

/// Wipes the store and every onboarding pointer. Returns false, touching
/// nothing, when `user_id` is not the administrator.
pub async fn reset_all(state: &AppState, user_id: i64) -> anyhow::Result<bool> {
    if !state.config.is_admin(user_id) {
        tracing::warn!("User {} tried to clear all data", user_id);
        return Ok(false);
    }
    state.db.clear_all_data().await?;
    state.sessions.clear();
    tracing::warn!("All data cleared by admin {}", user_id);
    Ok(true)
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: BotCommand,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = from.id.0 as i64;

    match cmd {
        BotCommand::Start(payload) => {
            let known = state.db.get_user_info(user_id).await?.is_some();
            if !known {
                if let Some(referrer) = parse_referrer(&payload).filter(|r| *r != user_id) {
                    match state.db.add_ref_count(referrer).await {
                        Ok(()) => tracing::info!("User {} credited for inviting {}", referrer, user_id),
                        Err(e) => tracing::error!("Referral credit for {} failed: {}", referrer, e),
                    }
                }
            }

            let identity = [
                (UserField::FirstName, from.first_name.as_str()),
                (UserField::LastName, from.last_name.as_deref().unwrap_or_default()),
                (UserField::Username, from.username.as_deref().unwrap_or_default()),
            ];
            if let Err(e) = state.db.save_user_info(user_id, &identity).await {
                tracing::error!("Saving profile of user {} failed: {}", user_id, e);
            }

            let info = state.db.get_user_info(user_id).await?;
            match info.as_ref().filter(|u| u.has_contact_details()) {
                Some(user) => {
                    let name = user
                        .first_name
                        .as_deref()
                        .filter(|n| !n.is_empty())
                        .unwrap_or(&from.first_name);
                    let keyboard = webapp::miniapp_keyboard(&webapp::miniapp_url(
                        &state.config,
                        user_id,
                        Some(user),
                    )?)?;
                    bot.send_message(msg.chat.id, format!("Привет, {name}! Рад снова видеть тебя 👋"))
                        .reply_markup(keyboard)
                        .await?;
                }
                None => {
                    intro::send_slide(&bot, msg.chat.id, Path::new(&state.config.media_dir), 0)
                        .await?;
                }
            }
        }

        BotCommand::Webapp => {
            let user = state.db.get_user_info(user_id).await?;
            let url = webapp::miniapp_url(&state.config, user_id, user.as_ref())?;
            bot.send_message(msg.chat.id, "Открой мини-приложение кнопкой ниже:")
                .reply_markup(webapp::launcher_keyboard(&url)?)
                .await?;
        }

        BotCommand::Ref => {
            let count = state.db.get_ref_count(user_id).await?;
            bot.send_message(
                msg.chat.id,
                format!(
                    "🔗 Ваша ссылка для приглашений:\n{}\n\nПриглашено: {}",
                    state.config.ref_link(user_id),
                    count
                ),
            )
            .await?;
        }

        BotCommand::Requests => {
            if !state.config.is_admin(user_id) {
                bot.send_message(msg.chat.id, ACCESS_DENIED).await?;
                return Ok(());
            }
            let rows = state.db.get_all_requests(RECENT_REQUESTS_LIMIT).await?;
            if rows.is_empty() {
                bot.send_message(msg.chat.id, "Заявок пока нет.").await?;
            } else {
                let mut text = String::from("🧺 Последние заявки:\n\n");
                for row in &rows {
                    text.push_str(&requests::request_line(row));
                    text.push('\n');
                }
                bot.send_message(msg.chat.id, text).await?;
            }
        }

        BotCommand::Clear => {
            let reply = if reset_all(&state, user_id).await? {
                "✅ Все данные очищены."
            } else {
                ACCESS_DENIED
            };
            bot.send_message(msg.chat.id, reply).await?;
        }

        BotCommand::Help => {
            bot.send_message(msg.chat.id, BotCommand::descriptions().to_string())
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::test_state;

    #[test]
    fn referral_payload_parses() {
        assert_eq!(parse_referrer("ref_12345"), Some(12345));
        assert_eq!(parse_referrer(" ref_7 "), Some(7));
        assert_eq!(parse_referrer(""), None);
        assert_eq!(parse_referrer("ref_"), None);
        assert_eq!(parse_referrer("promo_5"), None);
    }

    #[test]
    fn commands_parse_by_name() {
        assert!(matches!(
            BotCommand::parse("/start ref_9", "test_bot"),
            Ok(BotCommand::Start(p)) if p == "ref_9"
        ));
        assert!(matches!(BotCommand::parse("/clear", "test_bot"), Ok(BotCommand::Clear)));
        assert!(matches!(BotCommand::parse("/webapp", "test_bot"), Ok(BotCommand::Webapp)));
    }

    #[tokio::test]
    async fn admin_reset_wipes_store_and_sessions() {
        let state = test_state().await;
        state
            .db
            .save_user_info(5, &[(UserField::Street, "Мира")])
            .await
            .unwrap();
        let request_id = state.db.add_request(5, 2, "").await.unwrap();
        state.db.add_ref_count(5).await.unwrap();
        state.sessions.begin(5);

        assert!(reset_all(&state, state.config.admin_id).await.unwrap());

        assert!(state.db.get_user_info(5).await.unwrap().is_none());
        assert!(state.db.get_request(request_id).await.unwrap().is_none());
        assert_eq!(state.db.get_ref_count(5).await.unwrap(), 0);
        assert_eq!(state.sessions.current(5), None);
    }

    #[tokio::test]
    async fn reset_by_non_admin_changes_nothing() {
        let state = test_state().await;
        state
            .db
            .save_user_info(5, &[(UserField::Street, "Мира")])
            .await
            .unwrap();
        let request_id = state.db.add_request(5, 2, "").await.unwrap();
        state.db.add_ref_count(5).await.unwrap();
        state.sessions.begin(5);

        assert!(!reset_all(&state, 5).await.unwrap());

        assert!(state.db.get_user_info(5).await.unwrap().is_some());
        assert!(state.db.get_request(request_id).await.unwrap().is_some());
        assert_eq!(state.db.get_ref_count(5).await.unwrap(), 1);
        assert!(state.sessions.current(5).is_some());
    }
}
