use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use serde::Serialize;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, WebAppInfo};
use url::Url;

use crate::config::AppConfig;
use crate::db::models::User;
use crate::db::Database;

/// Profile snapshot handed to the mini-app in the `p` query parameter.
#[derive(Debug, Serialize)]
struct LaunchPayload<'a> {
    user_id: i64,
    first_name: &'a str,
    street: &'a str,
    house: &'a str,
    flat: &'a str,
    entrance: &'a str,
    floor: &'a str,
    phone: &'a str,
    tab: &'a str,
}

fn or_empty(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

fn append_param(base: &str, param: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}{param}")
}

/// Launch URL carrying the user's profile as url-safe base64 JSON.
pub fn miniapp_url(config: &AppConfig, user_id: i64, user: Option<&User>) -> anyhow::Result<String> {
    let empty = User::default();
    let user = user.unwrap_or(&empty);
    let payload = LaunchPayload {
        user_id,
        first_name: or_empty(&user.first_name),
        street: or_empty(&user.street),
        house: or_empty(&user.house),
        flat: or_empty(&user.flat),
        entrance: or_empty(&user.entrance),
        floor: or_empty(&user.floor),
        phone: or_empty(&user.phone),
        tab: "menu",
    };
    let encoded = URL_SAFE.encode(serde_json::to_vec(&payload)?);

    Ok(append_param(
        &config.webapp_url,
        &format!("v={}&p={}", config.webapp_version, encoded),
    ))
}

pub fn tab_url(base_url: &str, tab: &str) -> String {
    append_param(base_url, &format!("tab={tab}"))
}

/// "Меню" and "Профиль" launchers.
pub fn miniapp_keyboard(base_url: &str) -> anyhow::Result<InlineKeyboardMarkup> {
    let menu = Url::parse(base_url)?;
    let profile = Url::parse(&tab_url(base_url, "profile"))?;
    Ok(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::web_app("Меню", WebAppInfo { url: menu }),
        InlineKeyboardButton::web_app("Профиль", WebAppInfo { url: profile }),
    ]]))
}

/// Launchers prefilled with the user's current stored profile.
pub async fn keyboard_for_user(
    config: &AppConfig,
    db: &Database,
    user_id: i64,
) -> anyhow::Result<InlineKeyboardMarkup> {
    let user = db.get_user_info(user_id).await?;
    miniapp_keyboard(&miniapp_url(config, user_id, user.as_ref())?)
}

/// Single "open the mini-app" launcher for `/webapp`.
pub fn launcher_keyboard(base_url: &str) -> anyhow::Result<InlineKeyboardMarkup> {
    let url = Url::parse(base_url)?;
    Ok(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::web_app("Открыть мини-приложение", WebAppInfo { url }),
    ]]))
}
