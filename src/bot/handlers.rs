//! Message routing: menu buttons, wizard steps, and the AI chat passthrough.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{KeyboardMarkup, Message, ParseMode};
use tracing::{error, info, warn};

use crate::bot::{BotState, menu, wizard};
use crate::bot::wizard::{Keyboard, Session, StepReply, WizardInput};

/// Telegram's limit on message text, in characters.
const MESSAGE_CHAR_LIMIT: usize = 4096;

const HELP_TEXT: &str = "🤖 Lectern — help\n\n\
    📚 Lectures — browse course materials\n\
    ℹ️ About — project info\n\
    🤖 AI chat — talk to the AI assistant\n\n\
    👨‍💼 For administrators:\n\
    ➕ Add lecture\n\
    📁 Add file\n\
    📊 Database";

const ABOUT_TEXT: &str = "🤖 Lectern v0.1\nA bot for accessing lecture recordings and materials.";

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(ref user) = msg.from else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    let is_admin = state.config.is_admin(user.id);
    let key = (user.id.0, chat_id.0);
    let text = msg.text();

    // The back command cancels whatever is in progress, from anywhere.
    if text == Some(menu::BTN_BACK) {
        let slot = state.sessions.slot(key);
        *slot.lock().await = None;
        return go_home(&bot, chat_id, is_admin).await;
    }

    if text == Some("/start") {
        info!("/start from {}", user.id);
        let slot = state.sessions.slot(key);
        *slot.lock().await = None;

        let mut welcome = "👋 Welcome to Lectern!".to_string();
        if is_admin {
            welcome.push_str("\n👨‍💼 Administrator mode");
        }
        bot.send_message(chat_id, welcome)
            .reply_markup(menu::main_menu(is_admin))
            .await?;
        return Ok(());
    }

    // Holding the slot lock for the rest of the update serializes handling
    // per (user, chat) pair.
    let slot = state.sessions.slot(key);
    let mut session = slot.lock().await;

    match *session {
        Some(Session::AiChat) => return relay_to_ai(&bot, &msg, &state).await,
        Some(_) => {
            let input = wizard_input(&msg);
            let reply = wizard::advance(&state.store, &mut session, input);
            return send_step_reply(&bot, chat_id, is_admin, reply).await;
        }
        None => {}
    }

    let Some(text) = text else {
        return unknown(&bot, chat_id, is_admin).await;
    };

    match text {
        menu::BTN_LECTURES => {
            info!("'Lectures' from {}", user.id);
            let courses = match state.store.all_courses() {
                Ok(c) => c,
                Err(e) => {
                    error!("failed to list courses: {e}");
                    bot.send_message(chat_id, "⚠️ Failed to load courses.").await?;
                    return Ok(());
                }
            };
            if courses.is_empty() {
                bot.send_message(chat_id, "📭 No courses available.").await?;
                return Ok(());
            }
            bot.send_message(chat_id, "Pick a course:")
                .reply_markup(menu::course_keyboard(&courses))
                .await?;
        }

        menu::BTN_HELP => {
            bot.send_message(chat_id, HELP_TEXT).await?;
        }

        menu::BTN_ABOUT => {
            bot.send_message(chat_id, ABOUT_TEXT).await?;
        }

        menu::BTN_AI_CHAT => {
            if !state.gemini.is_configured() {
                bot.send_message(chat_id, "⚠️ AI chat is not configured on this bot.").await?;
                return Ok(());
            }
            *session = Some(Session::AiChat);
            bot.send_message(
                chat_id,
                "🤖 You are now chatting with Gemini 2.5 Flash.\n\
                 Send a message, or hit 🔙 Back to leave.",
            )
            .reply_markup(menu::back_keyboard())
            .await?;
        }

        menu::BTN_ADD_LECTURE if is_admin => {
            let reply = wizard::start_add_lecture(&mut session);
            return send_step_reply(&bot, chat_id, is_admin, reply).await;
        }

        menu::BTN_ADD_FILE if is_admin => {
            let reply = wizard::start_add_file(&mut session);
            return send_step_reply(&bot, chat_id, is_admin, reply).await;
        }

        menu::BTN_DATABASE if is_admin => {
            return send_database_view(&bot, chat_id, &state).await;
        }

        _ => {
            if let Some(course) = menu::parse_course_button(text) {
                return send_topic_list(&bot, chat_id, &state, course).await;
            }
            return unknown(&bot, chat_id, is_admin).await;
        }
    }

    Ok(())
}

async fn go_home(bot: &Bot, chat_id: ChatId, is_admin: bool) -> ResponseResult<()> {
    bot.send_message(chat_id, "Main menu:")
        .reply_markup(menu::main_menu(is_admin))
        .await?;
    Ok(())
}

async fn unknown(bot: &Bot, chat_id: ChatId, is_admin: bool) -> ResponseResult<()> {
    bot.send_message(chat_id, "❌ Unknown command. Use the menu buttons.")
        .reply_markup(menu::main_menu(is_admin))
        .await?;
    Ok(())
}

/// Classify a message for the wizard. Non-text, non-media content falls back
/// to empty text, which every step rejects with its own re-prompt.
fn wizard_input(msg: &Message) -> WizardInput {
    if let Some(audio) = msg.audio() {
        WizardInput::Audio(audio.file.id.0.clone())
    } else if let Some(voice) = msg.voice() {
        WizardInput::Audio(voice.file.id.0.clone())
    } else if let Some(document) = msg.document() {
        WizardInput::Document(document.file.id.0.clone())
    } else if let Some(sizes) = msg.photo() {
        // Telegram lists photo sizes smallest first; take the largest.
        match sizes.last() {
            Some(photo) => WizardInput::Photo(photo.file.id.0.clone()),
            None => WizardInput::Text(String::new()),
        }
    } else {
        WizardInput::Text(msg.text().unwrap_or("").to_string())
    }
}

fn render_keyboard(keyboard: Keyboard) -> KeyboardMarkup {
    match keyboard {
        Keyboard::Back => menu::back_keyboard(),
        Keyboard::Topics(topics) => menu::topic_keyboard(&topics),
        Keyboard::FileKinds => menu::file_kind_keyboard(),
    }
}

async fn send_step_reply(
    bot: &Bot,
    chat_id: ChatId,
    is_admin: bool,
    reply: StepReply,
) -> ResponseResult<()> {
    match reply {
        StepReply::Prompt { text, keyboard } => {
            bot.send_message(chat_id, text)
                .reply_markup(render_keyboard(keyboard))
                .await?;
            Ok(())
        }
        StepReply::Done { notice } => {
            if let Some(notice) = notice {
                bot.send_message(chat_id, notice).await?;
            }
            go_home(bot, chat_id, is_admin).await
        }
    }
}

async fn send_topic_list(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    course: u8,
) -> ResponseResult<()> {
    let topics = match state.store.topics_by_course(course) {
        Ok(t) => t,
        Err(e) => {
            error!("failed to list topics: {e}");
            bot.send_message(chat_id, "⚠️ Failed to load lectures.").await?;
            return Ok(());
        }
    };
    if topics.is_empty() {
        bot.send_message(chat_id, "📭 No lectures for this course.").await?;
        return Ok(());
    }
    bot.send_message(chat_id, format!("📘 Course {course} lectures:"))
        .reply_markup(menu::topics_inline(course, &topics))
        .await?;
    Ok(())
}

async fn send_database_view(bot: &Bot, chat_id: ChatId, state: &BotState) -> ResponseResult<()> {
    let lectures = match state.store.all_lectures() {
        Ok(l) => l,
        Err(e) => {
            error!("failed to list lectures: {e}");
            bot.send_message(chat_id, "⚠️ Failed to read the database.").await?;
            return Ok(());
        }
    };
    if lectures.is_empty() {
        bot.send_message(chat_id, "📭 The database has no lectures.").await?;
        return Ok(());
    }

    let mut lines = vec!["📚 All lectures:".to_string()];
    for lecture in &lectures {
        let files: Vec<&str> = [
            (lecture.audio.is_some(), "Audio"),
            (lecture.document.is_some(), "Document"),
            (lecture.presentation.is_some(), "Presentation"),
            (lecture.photo.is_some(), "Photo"),
        ]
        .into_iter()
        .filter(|(present, _)| *present)
        .map(|(_, name)| name)
        .collect();

        let mut line = format!("Course {} — {}", lecture.course, lecture.topic);
        if !files.is_empty() {
            line.push_str(&format!(" ({})", files.join(", ")));
        }
        lines.push(line);
    }
    send_chunked(bot, chat_id, &lines.join("\n")).await?;

    bot.send_message(chat_id, "Manage lectures:")
        .reply_markup(menu::database_keyboard(&lectures))
        .await?;
    Ok(())
}

async fn relay_to_ai(bot: &Bot, msg: &Message, state: &BotState) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let Some(text) = msg.text() else {
        bot.send_message(chat_id, "❌ Send plain text, or hit 🔙 Back to leave.").await?;
        return Ok(());
    };

    let reply = match state.gemini.generate(text).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("AI request failed: {e}");
            bot.send_message(chat_id, "⚠️ The AI request failed. Try again later.").await?;
            return Ok(());
        }
    };
    let reply: String = reply.chars().take(MESSAGE_CHAR_LIMIT).collect();

    // Markdown from the model can be malformed; fall back to plain text.
    if bot
        .send_message(chat_id, &reply)
        .parse_mode(ParseMode::Markdown)
        .await
        .is_err()
    {
        warn!("formatted relay rejected, resending as plain text");
        bot.send_message(chat_id, reply).await?;
    }
    Ok(())
}

async fn send_chunked(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    let chars: Vec<char> = text.chars().collect();
    for chunk in chars.chunks(MESSAGE_CHAR_LIMIT) {
        bot.send_message(chat_id, chunk.iter().collect::<String>()).await?;
    }
    Ok(())
}
