use serde::Serialize;
use teloxide::utils::html;

use crate::db::models::{non_empty, User, UserAddress};

/// Shown wherever a value is missing.
pub const PLACEHOLDER: &str = "—";

/// Profile as rendered by the mini-application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    pub name: String,
    pub username: String,
    pub phone: String,
    pub address: String,
}

impl ProfileView {
    /// Builds the view for a stored user, or the placeholder shape for an
    /// unknown one.
    pub fn from_user(user: Option<&User>) -> Self {
        let Some(user) = user else {
            return Self {
                name: PLACEHOLDER.to_string(),
                username: PLACEHOLDER.to_string(),
                phone: PLACEHOLDER.to_string(),
                address: PLACEHOLDER.to_string(),
            };
        };

        Self {
            name: display_name(user),
            username: non_empty(&user.username).unwrap_or(PLACEHOLDER).to_string(),
            phone: non_empty(&user.phone).unwrap_or(PLACEHOLDER).to_string(),
            address: format_address(&UserAddress::from(user)),
        }
    }
}

impl From<&User> for UserAddress {
    fn from(user: &User) -> Self {
        Self {
            street: user.street.clone(),
            house: user.house.clone(),
            flat: user.flat.clone(),
            entrance: user.entrance.clone(),
            floor: user.floor.clone(),
            city: user.city.clone(),
            phone: user.phone.clone(),
        }
    }
}

/// Joins the present address parts in street → city order,
/// e.g. `Ленина, д.5, кв.10`.
pub fn format_address(address: &UserAddress) -> String {
    let mut parts = Vec::new();
    if let Some(street) = non_empty(&address.street) {
        parts.push(street.to_string());
    }
    if let Some(house) = non_empty(&address.house) {
        parts.push(format!("д.{house}"));
    }
    if let Some(flat) = non_empty(&address.flat) {
        parts.push(format!("кв.{flat}"));
    }
    if let Some(entrance) = non_empty(&address.entrance) {
        parts.push(format!("подъезд {entrance}"));
    }
    if let Some(floor) = non_empty(&address.floor) {
        parts.push(format!("этаж {floor}"));
    }
    if let Some(city) = non_empty(&address.city) {
        parts.push(city.to_string());
    }

    if parts.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        parts.join(", ")
    }
}

/// First and last name, or the placeholder when neither is set.
pub fn display_name(user: &User) -> String {
    let first = non_empty(&user.first_name).unwrap_or_default();
    let name = match non_empty(&user.last_name) {
        Some(last) => format!("{first} {last}"),
        None => first.to_string(),
    };
    let name = name.trim();
    if name.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        name.to_string()
    }
}

/// HTML reference to a Telegram user: `@handle` when known, otherwise a
/// `tg://user` mention link.
pub fn user_link(user_id: i64, username: Option<&str>, first_name: &str) -> String {
    match username.filter(|u| !u.is_empty()) {
        Some(username) => format!("@{}", html::escape(username)),
        None => {
            let label = if first_name.is_empty() { "пользователь" } else { first_name };
            format!(
                r#"<a href="tg://user?id={}">{}</a>"#,
                user_id,
                html::escape(label)
            )
        }
    }
}
