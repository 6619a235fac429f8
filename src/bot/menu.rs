//! Menu labels and keyboard builders.

use regex::Regex;
use std::sync::OnceLock;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

use crate::bot::callback::CallbackAction;
use crate::store::{FileKind, Lecture};

pub const BTN_LECTURES: &str = "📚 Lectures";
pub const BTN_ADD_LECTURE: &str = "➕ Add lecture";
pub const BTN_ADD_FILE: &str = "📁 Add file";
pub const BTN_DATABASE: &str = "📊 Database";
pub const BTN_HELP: &str = "❓ Help";
pub const BTN_ABOUT: &str = "ℹ️ About";
pub const BTN_AI_CHAT: &str = "🤖 AI chat";
pub const BTN_BACK: &str = "🔙 Back";

fn reply_keyboard(labels: &[&str]) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> =
        labels.iter().map(|l| vec![KeyboardButton::new(l.to_string())]).collect();
    KeyboardMarkup::new(rows).resize_keyboard()
}

pub fn main_menu(is_admin: bool) -> KeyboardMarkup {
    if is_admin {
        reply_keyboard(&[
            BTN_LECTURES,
            BTN_ADD_LECTURE,
            BTN_ADD_FILE,
            BTN_DATABASE,
            BTN_HELP,
            BTN_AI_CHAT,
        ])
    } else {
        reply_keyboard(&[BTN_LECTURES, BTN_HELP, BTN_ABOUT, BTN_AI_CHAT])
    }
}

pub fn back_keyboard() -> KeyboardMarkup {
    reply_keyboard(&[BTN_BACK])
}

pub fn course_button(course: u8) -> String {
    format!("📘 Course {course}")
}

pub fn parse_course_button(text: &str) -> Option<u8> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^📘 Course (\d+)$").unwrap());
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

pub fn course_keyboard(courses: &[u8]) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = courses
        .iter()
        .map(|c| vec![KeyboardButton::new(course_button(*c))])
        .collect();
    rows.push(vec![KeyboardButton::new(BTN_BACK)]);
    KeyboardMarkup::new(rows).resize_keyboard()
}

/// Topic selection in the add-file flow (reply keyboard, one topic per row).
pub fn topic_keyboard(topics: &[String]) -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = topics
        .iter()
        .map(|t| vec![KeyboardButton::new(format!("{}{t}", super::wizard::TOPIC_BUTTON_PREFIX))])
        .collect();
    rows.push(vec![KeyboardButton::new(BTN_BACK)]);
    KeyboardMarkup::new(rows).resize_keyboard()
}

pub fn file_kind_keyboard() -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = vec![
        vec![
            KeyboardButton::new(FileKind::Audio.label()),
            KeyboardButton::new(FileKind::Document.label()),
        ],
        vec![
            KeyboardButton::new(FileKind::Presentation.label()),
            KeyboardButton::new(FileKind::Photo.label()),
        ],
    ];
    rows.push(vec![KeyboardButton::new(BTN_BACK)]);
    KeyboardMarkup::new(rows).resize_keyboard()
}

/// Inline keyboard of a course's topics. Buttons whose callback payload
/// would not fit Telegram's size limit are skipped.
pub fn topics_inline(course: u8, topics: &[String]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = topics
        .iter()
        .filter_map(|topic| {
            let data = CallbackAction::ShowLecture { course, topic: topic.clone() }
                .encode_checked()?;
            Some(vec![InlineKeyboardButton::callback(topic.clone(), data)])
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

/// Detail-view keyboard: one button per attached file, plus a delete button
/// for administrators. All payloads address the lecture by id and so always
/// fit the callback limit.
pub fn lecture_keyboard(lecture: &Lecture, is_admin: bool) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for kind in FileKind::ALL {
        if lecture.file(kind).is_some() {
            let data = CallbackAction::GetFile { kind, lecture_id: lecture.id }.encode();
            rows.push(vec![InlineKeyboardButton::callback(kind.label(), data)]);
        }
    }
    if is_admin {
        let data = CallbackAction::DeleteById { lecture_id: lecture.id }.encode();
        rows.push(vec![InlineKeyboardButton::callback("🗑 Delete lecture", data)]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn delete_confirm_keyboard(course: u8, topic: &str) -> InlineKeyboardMarkup {
    let confirm = CallbackAction::DeleteConfirm { course, topic: topic.to_string() }.encode();
    let cancel = CallbackAction::DeleteCancel { course, topic: topic.to_string() }.encode();
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Yes", confirm),
        InlineKeyboardButton::callback("❌ No", cancel),
    ]])
}

/// Management keyboard for the admin database view: per lecture a delete
/// button and, when a photo is attached, a photo preview button. Rows whose
/// topic does not fit the callback limit are skipped.
pub fn database_keyboard(lectures: &[Lecture]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    for lecture in lectures {
        let mut row = Vec::new();
        let delete = CallbackAction::DeleteLecture {
            course: lecture.course,
            topic: lecture.topic.clone(),
        };
        if let Some(data) = delete.encode_checked() {
            row.push(InlineKeyboardButton::callback(
                format!("🗑 {} — {}", lecture.course, lecture.topic),
                data,
            ));
        }
        if lecture.photo.is_some() {
            let photo = CallbackAction::ViewPhoto {
                course: lecture.course,
                topic: lecture.topic.clone(),
            };
            if let Some(data) = photo.encode_checked() {
                row.push(InlineKeyboardButton::callback("🖼", data));
            }
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }
    InlineKeyboardMarkup::new(rows)
}
