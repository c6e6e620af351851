//! Closed inbound event types: inline-button payloads, message kinds, and
//! mini-app submissions.

use serde::{Deserialize, Deserializer};
use teloxide::types::Message;

use crate::db::models::UserField;

/// Data carried by an inline button and echoed back in a callback query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Show the carousel slide at this index.
    NextSlide(usize),
    /// Show the personal-data consent prompt.
    ShowConsent,
    /// The user accepted the consent prompt.
    ConsentAccepted,
    /// Admin marks a request as collected.
    CompleteRequest(i64),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "pd" => return Some(Self::ShowConsent),
            "pd_ok" => return Some(Self::ConsentAccepted),
            _ => {}
        }
        if let Some(idx) = data.strip_prefix("next:") {
            return idx.parse().ok().map(Self::NextSlide);
        }
        if let Some(id) = data.strip_prefix("complete:") {
            return id.parse().ok().map(Self::CompleteRequest);
        }
        None
    }

    pub fn to_data(self) -> String {
        match self {
            Self::NextSlide(idx) => format!("next:{idx}"),
            Self::ShowConsent => "pd".to_string(),
            Self::ConsentAccepted => "pd_ok".to_string(),
            Self::CompleteRequest(id) => format!("complete:{id}"),
        }
    }
}

/// What a plain (non-command) message carries, as far as the flows care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    WebAppData(String),
    Text(String),
    Other,
}

impl Inbound {
    pub fn from_message(msg: &Message) -> Self {
        if let Some(data) = msg.web_app_data() {
            Self::WebAppData(data.data.clone())
        } else if let Some(text) = msg.text() {
            Self::Text(text.to_string())
        } else {
            Self::Other
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Structured data submitted from the mini-application.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WebAppPayload {
    CreateRequest {
        #[serde(default = "default_bags", deserialize_with = "bags_from_number_or_string")]
        bags: i64,
        #[serde(default, deserialize_with = "null_as_empty")]
        comment: String,
    },
    SelectTariff {
        tariff: String,
    },
    UpdateProfile(ProfileUpdate),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileUpdate {
    pub street: Option<String>,
    pub house: Option<String>,
    pub flat: Option<String>,
    pub entrance: Option<String>,
    pub floor: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub comment: Option<String>,
}

impl ProfileUpdate {
    /// Provided fields with surrounding whitespace removed; blank ones are
    /// skipped so they never overwrite stored values.
    pub fn fields(&self) -> Vec<(UserField, &str)> {
        [
            (UserField::Street, &self.street),
            (UserField::House, &self.house),
            (UserField::Flat, &self.flat),
            (UserField::Entrance, &self.entrance),
            (UserField::Floor, &self.floor),
            (UserField::City, &self.city),
            (UserField::Phone, &self.phone),
            (UserField::Comment, &self.comment),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            let value = value.as_deref()?.trim();
            (!value.is_empty()).then_some((field, value))
        })
        .collect()
    }
}

impl WebAppPayload {
    /// Parses a raw submission. Malformed JSON, unknown types and
    /// non-positive bag counts yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Self>(raw) {
            Ok(Self::CreateRequest { bags, .. }) if bags < 1 => {
                tracing::warn!("Dropping mini-app request with bag count {}", bags);
                None
            }
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!("Dropping malformed mini-app payload: {}", e);
                None
            }
        }
    }
}

fn default_bags() -> i64 {
    1
}

fn bags_from_number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Bags {
        Integer(i64),
        Float(f64),
        Text(String),
    }

    fn whole(n: f64) -> Option<i64> {
        (n.is_finite() && n.fract() == 0.0).then_some(n as i64)
    }

    let bags = match Bags::deserialize(deserializer)? {
        Bags::Integer(n) => Some(n),
        Bags::Float(n) => whole(n),
        Bags::Text(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| s.parse().ok().and_then(whole))
        }
    };
    bags.ok_or_else(|| serde::de::Error::custom("bag count is not a whole number"))
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
