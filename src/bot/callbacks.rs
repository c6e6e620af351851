use std::path::Path;
use std::sync::Arc;

use teloxide::prelude::*;

use crate::bot::events::CallbackAction;
use crate::bot::AppState;
use crate::intro;
use crate::onboarding::OnboardingStep;
use crate::requests::{self, Completion};

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    };

    let user_id = q.from.id.0 as i64;
    let chat_id = ChatId(user_id);

    match action {
        // ── Intro Carousel ─────────────────────────────────────────────
        CallbackAction::NextSlide(idx) => {
            bot.answer_callback_query(&q.id).await?;
            intro::send_slide(&bot, chat_id, Path::new(&state.config.media_dir), idx).await?;
        }

        CallbackAction::ShowConsent => {
            bot.answer_callback_query(&q.id).await?;
            bot.send_message(chat_id, intro::CONSENT_TEXT)
                .reply_markup(intro::consent_keyboard())
                .await?;
        }

        // ── Onboarding Start ───────────────────────────────────────────
        CallbackAction::ConsentAccepted => {
            bot.answer_callback_query(&q.id).await?;
            state.sessions.begin(user_id);
            tracing::info!("User {} started onboarding", user_id);
            bot.send_message(chat_id, OnboardingStep::FIRST.prompt()).await?;
        }

        // ── Request Completion ─────────────────────────────────────────
        CallbackAction::CompleteRequest(request_id) => {
            match requests::complete_as(&state, user_id, request_id).await? {
                Completion::Denied => {
                    bot.answer_callback_query(&q.id)
                        .text("⛔️ Нет доступа.")
                        .await?;
                    return Ok(());
                }
                Completion::Completed { owner } => {
                    tracing::info!("Request {} completed by admin {}", request_id, user_id);
                    bot.answer_callback_query(&q.id)
                        .text("Заявка отмечена выполненной ✅")
                        .await?;
                    if let Some(owner) = owner {
                        // A requester who blocked the bot must not stall the admin.
                        if let Err(e) = bot
                            .send_message(ChatId(owner), requests::REQUEST_DONE_TEXT)
                            .await
                        {
                            tracing::warn!("Could not notify user {}: {}", owner, e);
                        }
                    }
                }
                Completion::AlreadyDone => {
                    bot.answer_callback_query(&q.id)
                        .text("Заявка уже закрыта.")
                        .await?;
                }
                Completion::NotFound => {
                    tracing::warn!("Completion pressed for unknown request {}", request_id);
                    bot.answer_callback_query(&q.id)
                        .text("Заявка не найдена.")
                        .await?;
                }
            }

            if let Some(message) = &q.message {
                if let Err(e) = bot
                    .edit_message_reply_markup(message.chat().id, message.id())
                    .await
                {
                    tracing::warn!("Could not remove completion button: {}", e);
                }
            }
        }
    }

    Ok(())
}
