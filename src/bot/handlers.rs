use std::sync::Arc;

use teloxide::prelude::*;

use crate::bot::events::{Inbound, WebAppPayload};
use crate::bot::AppState;
use crate::db::models::UserField;
use crate::onboarding::{self, StepOutcome};
use crate::{requests, webapp};

/// Handler for every non-command message: mini-app submissions first,
/// then onboarding answers. Anything else is ignored.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };

    match Inbound::from_message(&msg) {
        Inbound::WebAppData(raw) => handle_webapp_data(&bot, &msg, from, &state, &raw).await?,
        inbound => handle_onboarding_answer(&bot, &msg, from.id.0 as i64, &state, &inbound).await?,
    }

    Ok(())
}

async fn handle_onboarding_answer(
    bot: &Bot,
    msg: &Message,
    user_id: i64,
    state: &AppState,
    inbound: &Inbound,
) -> anyhow::Result<()> {
    match onboarding::handle_input(&state.db, &state.sessions, user_id, inbound).await {
        Ok(StepOutcome::Ignored) => {}
        Ok(StepOutcome::Advanced(step)) => {
            bot.send_message(msg.chat.id, step.prompt()).await?;
        }
        Ok(StepOutcome::Completed) => {
            tracing::info!("User {} finished onboarding", user_id);
            let keyboard = webapp::keyboard_for_user(&state.config, &state.db, user_id).await?;
            bot.send_message(msg.chat.id, "✅ Адрес сохранён. Открывайте меню:")
                .reply_markup(keyboard)
                .await?;
        }
        Err(e) => {
            tracing::error!("Saving onboarding answer of user {} failed: {}", user_id, e);
            bot.send_message(
                msg.chat.id,
                "⚠️ Не удалось сохранить ответ. Попробуйте отправить его ещё раз.",
            )
            .await?;
        }
    }
    Ok(())
}

async fn handle_webapp_data(
    bot: &Bot,
    msg: &Message,
    from: &teloxide::types::User,
    state: &AppState,
    raw: &str,
) -> anyhow::Result<()> {
    tracing::debug!("Web App Data from {}: {}", from.id, raw);
    let user_id = from.id.0 as i64;

    let Some(payload) = WebAppPayload::parse(raw) else {
        return Ok(());
    };

    match payload {
        WebAppPayload::CreateRequest { bags, comment } => {
            requests::create_request(bot, state, from, bags, &comment).await?;
            bot.send_message(msg.chat.id, "✅ Заявка отправлена администратору.")
                .await?;
        }

        WebAppPayload::SelectTariff { tariff } => {
            let tariff = tariff.trim();
            if tariff.is_empty() {
                return Ok(());
            }
            state
                .db
                .save_user_info(user_id, &[(UserField::Tariff, tariff)])
                .await?;
            bot.send_message(msg.chat.id, "✅ Тариф сохранён.").await?;
        }

        WebAppPayload::UpdateProfile(update) => {
            let fields = update.fields();
            if fields.is_empty() {
                return Ok(());
            }
            state.db.save_user_info(user_id, &fields).await?;
            let keyboard = webapp::keyboard_for_user(&state.config, &state.db, user_id).await?;
            bot.send_message(msg.chat.id, "✅ Профиль обновлён.")
                .reply_markup(keyboard)
                .await?;
        }
    }

    Ok(())
}
