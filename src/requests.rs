use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::utils::html;

use crate::bot::events::CallbackAction;
use crate::bot::AppState;
use crate::db::models::{non_empty, RequestStatus, RequestWithUser, UserAddress};
use crate::db::Database;
use crate::profile::{format_address, user_link, PLACEHOLDER};

pub const REQUEST_DONE_TEXT: &str = "✅ Ваша заявка выполнена.";

/// HTML summary of a new request for the administrator.
pub fn admin_summary(bags: i64, comment: &str, address: Option<&UserAddress>, link: &str) -> String {
    let address = address.cloned().unwrap_or_default();
    let phone = non_empty(&address.phone).unwrap_or(PLACEHOLDER);

    let mut text = format!(
        "🧺 <b>Заявка</b>\n\
         Пакеты: <b>{}</b>\n\
         Адрес: {}\n\
         Телефон: {}\n\
         Юзернейм: {}",
        bags,
        html::escape(&format_address(&address)),
        html::escape(phone),
        link
    );
    let comment = comment.trim();
    if !comment.is_empty() {
        text.push_str(&format!("\nКомментарий: {}", html::escape(comment)));
    }
    text
}

pub fn complete_keyboard(request_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "✅ Забрал мусор",
        CallbackAction::CompleteRequest(request_id).to_data(),
    )]])
}

/// Records a request from the mini-app and forwards it to the admin.
pub async fn create_request(
    bot: &Bot,
    state: &AppState,
    from: &teloxide::types::User,
    bags: i64,
    comment: &str,
) -> anyhow::Result<i64> {
    let user_id = from.id.0 as i64;
    let request_id = state.db.add_request(user_id, bags, comment).await?;
    tracing::info!("Request {} created by user {} ({} bags)", request_id, user_id, bags);

    let address = state.db.get_user_address(user_id).await?;
    let link = user_link(user_id, from.username.as_deref(), &from.first_name);
    let text = admin_summary(bags, comment, address.as_ref(), &link);

    bot.send_message(ChatId(state.config.admin_id), text)
        .parse_mode(ParseMode::Html)
        .reply_markup(complete_keyboard(request_id))
        .await?;

    Ok(request_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// This call moved the request to `done`; `owner` is who to notify.
    Completed { owner: Option<i64> },
    AlreadyDone,
    NotFound,
    /// Pressed by someone other than the administrator.
    Denied,
}

/// Completion on behalf of `actor`; only the administrator may close requests.
pub async fn complete_as(state: &AppState, actor: i64, request_id: i64) -> anyhow::Result<Completion> {
    if !state.config.is_admin(actor) {
        tracing::warn!("User {} tried to complete request {}", actor, request_id);
        return Ok(Completion::Denied);
    }
    finish_request(&state.db, request_id).await
}

/// Marks the request done and resolves its owner. Only the call that
/// performs the transition reports an owner, so a double press notifies
/// the requester once.
pub async fn finish_request(db: &Database, request_id: i64) -> anyhow::Result<Completion> {
    if !db.mark_request_completed(request_id).await? {
        return Ok(match db.get_request(request_id).await? {
            Some(_) => Completion::AlreadyDone,
            None => Completion::NotFound,
        });
    }
    let owner = db.get_user_id_by_request_id(request_id).await?;
    Ok(Completion::Completed { owner })
}

/// One line of the admin `/requests` listing.
pub fn request_line(req: &RequestWithUser) -> String {
    let status = match RequestStatus::from_str_loose(&req.status) {
        RequestStatus::Done => "✅",
        RequestStatus::New => "🕓",
    };
    let address = UserAddress {
        street: req.street.clone(),
        house: req.house.clone(),
        flat: req.flat.clone(),
        entrance: req.entrance.clone(),
        floor: req.floor.clone(),
        city: req.city.clone(),
        phone: req.phone.clone(),
    };
    format!(
        "{} #{} · {} пак. · {} · {}",
        status,
        req.id,
        req.bags,
        format_address(&address),
        non_empty(&req.phone).unwrap_or(PLACEHOLDER)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::test_state;
    use crate::db::models::UserField;
    use crate::db::test_db;

    #[test]
    fn summary_lists_bags_address_phone_and_link() {
        let address = UserAddress {
            street: Some("Ленина".to_string()),
            house: Some("5".to_string()),
            flat: Some("10".to_string()),
            phone: Some("+79001234567".to_string()),
            ..Default::default()
        };

        let text = admin_summary(3, "", Some(&address), "@ivan");

        assert_eq!(
            text,
            "🧺 <b>Заявка</b>\nПакеты: <b>3</b>\nАдрес: Ленина, д.5, кв.10\nТелефон: +79001234567\nЮзернейм: @ivan"
        );
    }

    #[test]
    fn summary_without_profile_uses_placeholders_and_escapes_comment() {
        let text = admin_summary(1, " <тяжёлый> ", None, "@ivan");
        assert!(text.contains("Адрес: —\n"));
        assert!(text.contains("Телефон: —\n"));
        assert!(text.ends_with("\nКомментарий: &lt;тяжёлый&gt;"));
    }

    #[test]
    fn complete_button_is_bound_to_request() {
        let keyboard = complete_keyboard(17);
        match &keyboard.inline_keyboard[0][0].kind {
            teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => {
                assert_eq!(data, "complete:17")
            }
            other => panic!("unexpected button kind: {other:?}"),
        }
    }

    #[tokio::test]
    async fn finishing_twice_reports_the_owner_once() {
        let db = test_db().await;
        let id = db.add_request(77, 2, "").await.unwrap();

        assert_eq!(
            finish_request(&db, id).await.unwrap(),
            Completion::Completed { owner: Some(77) }
        );
        assert_eq!(finish_request(&db, id).await.unwrap(), Completion::AlreadyDone);
        assert_eq!(db.get_request(id).await.unwrap().unwrap().status, "done");
    }

    #[tokio::test]
    async fn completion_by_non_admin_leaves_request_open() {
        let state = test_state().await;
        let id = state.db.add_request(77, 1, "").await.unwrap();

        assert_eq!(complete_as(&state, 77, id).await.unwrap(), Completion::Denied);
        assert_eq!(state.db.get_request(id).await.unwrap().unwrap().status, "new");

        assert_eq!(
            complete_as(&state, state.config.admin_id, id).await.unwrap(),
            Completion::Completed { owner: Some(77) }
        );
    }

    #[tokio::test]
    async fn finishing_unknown_request_is_not_found() {
        let db = test_db().await;
        assert_eq!(finish_request(&db, 404).await.unwrap(), Completion::NotFound);
    }

    #[tokio::test]
    async fn listing_line_shows_status_and_address() {
        let db = test_db().await;
        db.save_user_info(1, &[(UserField::Street, "Мира"), (UserField::Phone, "555")])
            .await
            .unwrap();
        let id = db.add_request(1, 2, "").await.unwrap();
        db.mark_request_completed(id).await.unwrap();

        let rows = db.get_all_requests(5).await.unwrap();
        assert_eq!(request_line(&rows[0]), format!("✅ #{id} · 2 пак. · Мира · 555"));
    }
}
