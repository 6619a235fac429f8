//! Callback-query actions: a closed set of typed actions parsed at the
//! boundary, then dispatched on the variant.
//!
//! Topics are percent-encoded inside callback payloads so any character a
//! topic may legally contain survives the round trip. Telegram caps callback
//! data at 64 bytes, which is why file and delete buttons on the detail view
//! address lectures by row id instead of (course, topic).

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, ParseMode};
use tracing::{error, info, warn};

use crate::bot::{BotState, menu};
use crate::store::{FileKind, Lecture};

/// Telegram's limit on callback data, in bytes.
pub const CALLBACK_DATA_LIMIT: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackAction {
    ShowLecture { course: u8, topic: String },
    GetFile { kind: FileKind, lecture_id: i64 },
    DeleteLecture { course: u8, topic: String },
    DeleteConfirm { course: u8, topic: String },
    DeleteCancel { course: u8, topic: String },
    DeleteById { lecture_id: i64 },
    ViewPhoto { course: u8, topic: String },
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            Self::ShowLecture { course, topic } => {
                format!("show_lecture:{course}:{}", urlencoding::encode(topic))
            }
            Self::GetFile { kind, lecture_id } => {
                format!("get_file:{}:{lecture_id}", kind.as_str())
            }
            Self::DeleteLecture { course, topic } => {
                format!("delete_lecture:{course}:{}", urlencoding::encode(topic))
            }
            Self::DeleteConfirm { course, topic } => {
                format!("delete_confirm:{course}:{}", urlencoding::encode(topic))
            }
            Self::DeleteCancel { course, topic } => {
                format!("delete_cancel:{course}:{}", urlencoding::encode(topic))
            }
            Self::DeleteById { lecture_id } => format!("delete_by_id:{lecture_id}"),
            Self::ViewPhoto { course, topic } => {
                format!("view_photo:{course}:{}", urlencoding::encode(topic))
            }
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.splitn(3, ':');
        let tag = parts.next()?;
        match tag {
            "show_lecture" | "delete_lecture" | "delete_confirm" | "delete_cancel"
            | "view_photo" => {
                let course: u8 = parts.next()?.parse().ok()?;
                let topic = urlencoding::decode(parts.next()?).ok()?.into_owned();
                Some(match tag {
                    "show_lecture" => Self::ShowLecture { course, topic },
                    "delete_lecture" => Self::DeleteLecture { course, topic },
                    "delete_confirm" => Self::DeleteConfirm { course, topic },
                    "delete_cancel" => Self::DeleteCancel { course, topic },
                    _ => Self::ViewPhoto { course, topic },
                })
            }
            "get_file" => {
                let kind = FileKind::parse(parts.next()?)?;
                let lecture_id: i64 = parts.next()?.parse().ok()?;
                Some(Self::GetFile { kind, lecture_id })
            }
            "delete_by_id" => {
                let lecture_id: i64 = parts.next()?.parse().ok()?;
                if parts.next().is_some() {
                    return None;
                }
                Some(Self::DeleteById { lecture_id })
            }
            _ => None,
        }
    }

    /// Encoded payload, or None when it would not fit a callback button.
    pub fn encode_checked(&self) -> Option<String> {
        let data = self.encode();
        if data.len() > CALLBACK_DATA_LIMIT {
            warn!("callback payload too long ({} bytes): {data}", data.len());
            return None;
        }
        Some(data)
    }
}

pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(data) = q.data.as_deref() else {
        return ack(&bot, &q).await;
    };
    let Some(action) = CallbackAction::parse(data) else {
        warn!("malformed callback data: {data}");
        return notice(&bot, &q, "❌ Bad button data.").await;
    };
    let Some(message) = q.message.as_ref() else {
        return ack(&bot, &q).await;
    };
    let chat_id = message.chat().id;
    let message_id = message.id();
    let is_admin = state.config.is_admin(q.from.id);

    info!("callback {data} from {}", q.from.id);

    match action {
        CallbackAction::ShowLecture { course, topic } => {
            let lecture = match state.store.get_lecture(course, &topic) {
                Ok(Some(l)) => l,
                Ok(None) => return notice(&bot, &q, "❌ Lecture not found.").await,
                Err(e) => {
                    error!("lecture lookup failed: {e}");
                    return notice(&bot, &q, "⚠️ Something went wrong.").await;
                }
            };
            bot.edit_message_text(chat_id, message_id, lecture_details(&lecture))
                .parse_mode(ParseMode::Html)
                .reply_markup(menu::lecture_keyboard(&lecture, is_admin))
                .await?;
            ack(&bot, &q).await
        }

        CallbackAction::GetFile { kind, lecture_id } => {
            let lecture = match state.store.get_lecture_by_id(lecture_id) {
                Ok(Some(l)) => l,
                Ok(None) => return notice(&bot, &q, "❌ Lecture not found.").await,
                Err(e) => {
                    error!("lecture lookup failed: {e}");
                    return notice(&bot, &q, "⚠️ Something went wrong.").await;
                }
            };
            let Some(file_id) = lecture.file(kind) else {
                return notice(&bot, &q, "❌ File missing.").await;
            };
            let file = InputFile::file_id(FileId(file_id.to_string()));
            match kind {
                FileKind::Audio => {
                    bot.send_audio(chat_id, file).await?;
                }
                FileKind::Photo => {
                    bot.send_photo(chat_id, file).await?;
                }
                // Presentations are stored as plain documents.
                FileKind::Document | FileKind::Presentation => {
                    bot.send_document(chat_id, file).await?;
                }
            }
            notice(&bot, &q, "✅ File sent.").await
        }

        CallbackAction::DeleteLecture { course, topic } => {
            if !is_admin {
                return notice(&bot, &q, "⛔ You are not allowed to delete lectures.").await;
            }
            match state.store.lecture_exists(course, &topic) {
                Ok(true) => {}
                Ok(false) => return notice(&bot, &q, "❌ Lecture not found.").await,
                Err(e) => {
                    error!("lecture lookup failed: {e}");
                    return notice(&bot, &q, "⚠️ Something went wrong.").await;
                }
            }
            bot.edit_message_text(
                chat_id,
                message_id,
                format!("⚠️ Delete lecture «{topic}» (course {course})?"),
            )
            .reply_markup(menu::delete_confirm_keyboard(course, &topic))
            .await?;
            ack(&bot, &q).await
        }

        CallbackAction::DeleteConfirm { course, topic } => {
            if !is_admin {
                return notice(&bot, &q, "⛔ You are not allowed to delete lectures.").await;
            }
            if let Err(e) = state.store.delete_lecture(course, &topic) {
                error!("failed to delete lecture: {e}");
                return notice(&bot, &q, "⚠️ Failed to delete.").await;
            }
            bot.edit_message_text(
                chat_id,
                message_id,
                format!("🗑 Lecture «{topic}» (course {course}) deleted."),
            )
            .await?;
            ack(&bot, &q).await
        }

        CallbackAction::DeleteCancel { .. } => {
            bot.edit_message_text(chat_id, message_id, "❌ Deletion cancelled.").await?;
            ack(&bot, &q).await
        }

        CallbackAction::DeleteById { lecture_id } => {
            if !is_admin {
                return notice(&bot, &q, "⛔ You are not allowed to delete lectures.").await;
            }
            let lecture = match state.store.get_lecture_by_id(lecture_id) {
                Ok(Some(l)) => l,
                Ok(None) => return notice(&bot, &q, "❌ Lecture not found.").await,
                Err(e) => {
                    error!("lecture lookup failed: {e}");
                    return notice(&bot, &q, "⚠️ Something went wrong.").await;
                }
            };
            if let Err(e) = state.store.delete_lecture(lecture.course, &lecture.topic) {
                error!("failed to delete lecture: {e}");
                return notice(&bot, &q, "⚠️ Failed to delete.").await;
            }
            info!("admin {} deleted lecture: {} (course {})", q.from.id, lecture.topic, lecture.course);
            bot.edit_message_text(
                chat_id,
                message_id,
                format!("✅ Lecture '{}' (course {}) deleted.", lecture.topic, lecture.course),
            )
            .await?;
            ack(&bot, &q).await
        }

        CallbackAction::ViewPhoto { course, topic } => {
            let photo = match state.store.photo_id(course, &topic) {
                Ok(Some(id)) => id,
                Ok(None) => return notice(&bot, &q, "❌ Photo not found.").await,
                Err(e) => {
                    error!("photo lookup failed: {e}");
                    return notice(&bot, &q, "⚠️ Something went wrong.").await;
                }
            };
            bot.send_photo(chat_id, InputFile::file_id(FileId(photo)))
                .caption(format!("📸 Photo for «{topic}» (course {course})"))
                .await?;
            ack(&bot, &q).await
        }
    }
}

fn lecture_details(lecture: &Lecture) -> String {
    let mut text = format!("📖 <b>{}</b>\nCourse: {}\n\n", lecture.topic, lecture.course);
    let available: Vec<&str> = [
        (FileKind::Audio, "🎧 Audio available"),
        (FileKind::Document, "📄 Document available"),
        (FileKind::Presentation, "📊 Presentation available"),
        (FileKind::Photo, "🖼 Photo available"),
    ]
    .into_iter()
    .filter(|(kind, _)| lecture.file(*kind).is_some())
    .map(|(_, line)| line)
    .collect();

    if available.is_empty() {
        text.push_str("❌ No files for this lecture.");
    } else {
        text.push_str(&available.join("\n"));
    }
    text
}

async fn notice(bot: &Bot, q: &CallbackQuery, text: &str) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).text(text).await?;
    Ok(())
}

async fn ack(bot: &Bot, q: &CallbackQuery) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}
