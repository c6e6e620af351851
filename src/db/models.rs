use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub flat: Option<String>,
    pub entrance: Option<String>,
    pub floor: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub comment: Option<String>,
    pub tariff: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl User {
    /// True once the user has gone through onboarding at least partially.
    pub fn has_contact_details(&self) -> bool {
        non_empty(&self.street).is_some() || non_empty(&self.phone).is_some()
    }
}

/// Address and phone projection of a user row.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct UserAddress {
    pub street: Option<String>,
    pub house: Option<String>,
    pub flat: Option<String>,
    pub entrance: Option<String>,
    pub floor: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Request {
    pub id: i64,
    pub user_id: i64,
    pub bags: i64,
    pub comment: Option<String>,
    pub status: String,
    pub created_at: Option<NaiveDateTime>,
}

/// A request joined with the owner's address and identity.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RequestWithUser {
    pub id: i64,
    pub user_id: i64,
    pub bags: i64,
    pub comment: Option<String>,
    pub status: String,
    pub created_at: Option<NaiveDateTime>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub flat: Option<String>,
    pub entrance: Option<String>,
    pub floor: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    New,
    Done,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Done => "done",
        }
    }

    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "done" => Self::Done,
            _ => Self::New,
        }
    }
}

/// Writable columns of the `users` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    FirstName,
    LastName,
    Username,
    Street,
    House,
    Flat,
    Entrance,
    Floor,
    City,
    Phone,
    Comment,
    Tariff,
}

impl UserField {
    pub fn column(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Username => "username",
            Self::Street => "street",
            Self::House => "house",
            Self::Flat => "flat",
            Self::Entrance => "entrance",
            Self::Floor => "floor",
            Self::City => "city",
            Self::Phone => "phone",
            Self::Comment => "comment",
            Self::Tariff => "tariff",
        }
    }
}

/// Treats `None` and empty strings alike.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
