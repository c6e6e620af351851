use std::path::{Path, PathBuf};

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile};

use crate::bot::events::CallbackAction;

/// One carousel slide: candidate image file names (first match wins) and
/// the caption shown with or without the image.
pub struct Slide {
    pub photo_names: &'static [&'static str],
    pub caption: &'static str,
}

pub const SLIDES: [Slide; 5] = [
    Slide {
        photo_names: &["photo1.jpg", "фото1.jpg", "фото 1.jpg", "Фото 1.jpg", "1.jpg"],
        caption: "Оставьте заявку",
    },
    Slide {
        photo_names: &["photo2.jpg", "фото2.jpg", "фото 2.jpg", "Фото 2.jpg", "2.jpg"],
        caption: "Выставите за дверь",
    },
    Slide {
        photo_names: &["photo3.jpg", "фото3.jpg", "фото 3.jpg", "Фото 3.jpg", "3.jpg"],
        caption: "Ожидайте курьера",
    },
    Slide {
        photo_names: &["photo4.jpg", "фото4.jpg", "фото 4.jpg", "Фото 4.jpg", "4.jpg"],
        caption: "Мы заберем",
    },
    Slide {
        photo_names: &["photo5.jpg", "фото5.jpg", "фото 5.jpg", "Фото 5.jpg", "5.jpg"],
        caption: "До бака донесем",
    },
];

pub const CONSENT_TEXT: &str = "🛡️ Согласие на обработку персональных данных";

/// Out-of-range indices restart the carousel.
pub fn clamp_index(idx: usize) -> usize {
    if idx < SLIDES.len() {
        idx
    } else {
        0
    }
}

pub fn find_slide_photo(media_dir: &Path, idx: usize) -> Option<PathBuf> {
    SLIDES[clamp_index(idx)]
        .photo_names
        .iter()
        .map(|name| media_dir.join(name))
        .find(|path| path.is_file())
}

/// "Next" on every slide but the last, which leads to the consent step.
pub fn slide_keyboard(idx: usize) -> InlineKeyboardMarkup {
    let idx = clamp_index(idx);
    let button = if idx + 1 < SLIDES.len() {
        InlineKeyboardButton::callback("Далее ➡️", CallbackAction::NextSlide(idx + 1).to_data())
    } else {
        InlineKeyboardButton::callback("Перейти к согласию", CallbackAction::ShowConsent.to_data())
    };
    InlineKeyboardMarkup::new(vec![vec![button]])
}

pub fn consent_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "✅ Согласен",
        CallbackAction::ConsentAccepted.to_data(),
    )]])
}

pub async fn send_slide(
    bot: &Bot,
    chat_id: ChatId,
    media_dir: &Path,
    idx: usize,
) -> anyhow::Result<()> {
    let idx = clamp_index(idx);
    let caption = SLIDES[idx].caption;
    let keyboard = slide_keyboard(idx);

    match find_slide_photo(media_dir, idx) {
        Some(path) => {
            bot.send_photo(chat_id, InputFile::file(path))
                .caption(caption)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            tracing::debug!("No image for intro slide {}, sending caption only", idx);
            bot.send_message(chat_id, caption)
                .reply_markup(keyboard)
                .await?;
        }
    }
    Ok(())
}
