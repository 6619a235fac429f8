//! Admin wizards: linear multi-step conversations for adding lectures and
//! attaching files, plus the per-user session store that carries their state.
//!
//! Step logic is a plain transition over the session and the store, so the
//! message handler only renders the returned reply. The `🔙 Back` command is
//! intercepted by the handler before a step runs; it is the only way to
//! cancel a wizard.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

use crate::store::{FileKind, LectureStore};

pub const COURSE_MIN: u8 = 1;
pub const COURSE_MAX: u8 = 4;

/// Prefix rendered on topic selection buttons in the add-file flow.
pub const TOPIC_BUTTON_PREFIX: &str = "🔖 ";

const GENERIC_FAILURE: &str = "⚠️ Something went wrong. Try again later.";

/// One user's conversation state, keyed by (user, chat).
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    AddLecture(AddLectureStep),
    AddFile(AddFileStep),
    /// Free-text chat passthrough to the AI service.
    AiChat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddLectureStep {
    Course,
    Topic { course: u8 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddFileStep {
    Course,
    Topic { course: u8 },
    Kind { course: u8, topic: String },
    Upload { course: u8, topic: String, kind: FileKind },
}

pub type SessionKey = (u64, i64);

/// Session store. Each (user, chat) key owns its own async mutex so that
/// overlapping updates for one user are handled in sequence while updates
/// from different users never contend.
#[derive(Default)]
pub struct Sessions {
    inner: std::sync::Mutex<HashMap<SessionKey, Arc<Mutex<Option<Session>>>>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch (or create) the slot for a key. Hold the slot's lock for the
    /// whole of one update's handling, including any store or network calls.
    pub fn slot(&self, key: SessionKey) -> Arc<Mutex<Option<Session>>> {
        let mut inner = self.inner.lock().unwrap();
        inner.entry(key).or_default().clone()
    }
}

/// What a wizard step received from the user.
#[derive(Debug, Clone)]
pub enum WizardInput {
    Text(String),
    /// Audio or voice media (voice notes count as audio).
    Audio(String),
    Document(String),
    Photo(String),
}

/// Keyboard the reply should carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyboard {
    Back,
    Topics(Vec<String>),
    FileKinds,
}

/// What to send back after a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepReply {
    /// Conversation continues (or re-prompts in place).
    Prompt { text: String, keyboard: Keyboard },
    /// Conversation over; session already cleared. The handler shows the
    /// notice (if any) and returns the user to the main menu.
    Done { notice: Option<String> },
}

fn prompt(text: impl Into<String>, keyboard: Keyboard) -> StepReply {
    StepReply::Prompt { text: text.into(), keyboard }
}

fn done(notice: impl Into<String>) -> StepReply {
    StepReply::Done { notice: Some(notice.into()) }
}

pub fn start_add_lecture(session: &mut Option<Session>) -> StepReply {
    *session = Some(Session::AddLecture(AddLectureStep::Course));
    prompt(format!("Enter the course number ({COURSE_MIN}–{COURSE_MAX}):"), Keyboard::Back)
}

pub fn start_add_file(session: &mut Option<Session>) -> StepReply {
    *session = Some(Session::AddFile(AddFileStep::Course));
    prompt(format!("Enter the course number ({COURSE_MIN}–{COURSE_MAX}):"), Keyboard::Back)
}

/// Advance an active wizard with one user input. The caller has already
/// filtered out the back command.
pub fn advance(store: &LectureStore, session: &mut Option<Session>, input: WizardInput) -> StepReply {
    match session.clone() {
        Some(Session::AddLecture(step)) => advance_add_lecture(store, session, step, input),
        Some(Session::AddFile(step)) => advance_add_file(store, session, step, input),
        Some(Session::AiChat) | None => {
            // Not a wizard state; nothing to advance.
            *session = None;
            StepReply::Done { notice: None }
        }
    }
}

fn parse_course(input: &WizardInput) -> Result<u8, StepReply> {
    let WizardInput::Text(text) = input else {
        return Err(prompt(
            format!("❌ Enter a number from {COURSE_MIN} to {COURSE_MAX}:"),
            Keyboard::Back,
        ));
    };
    match text.trim().parse::<u8>() {
        Ok(course) if (COURSE_MIN..=COURSE_MAX).contains(&course) => Ok(course),
        Ok(_) => Err(prompt(
            format!("❌ The course must be from {COURSE_MIN} to {COURSE_MAX}. Enter the course number:"),
            Keyboard::Back,
        )),
        Err(_) => Err(prompt(
            format!("❌ Enter a number from {COURSE_MIN} to {COURSE_MAX}:"),
            Keyboard::Back,
        )),
    }
}

fn advance_add_lecture(
    store: &LectureStore,
    session: &mut Option<Session>,
    step: AddLectureStep,
    input: WizardInput,
) -> StepReply {
    match step {
        AddLectureStep::Course => {
            let course = match parse_course(&input) {
                Ok(c) => c,
                Err(reply) => return reply,
            };
            *session = Some(Session::AddLecture(AddLectureStep::Topic { course }));
            prompt(format!("Enter the topic title for course {course}:"), Keyboard::Back)
        }
        AddLectureStep::Topic { course } => {
            let WizardInput::Text(text) = input else {
                return prompt(
                    "❌ The topic title cannot be empty. Enter the topic title:",
                    Keyboard::Back,
                );
            };
            let topic = text.trim().to_string();
            if topic.is_empty() {
                return prompt(
                    "❌ The topic title cannot be empty. Enter the topic title:",
                    Keyboard::Back,
                );
            }

            *session = None;
            match store.add_lecture(course, &topic) {
                Ok(true) => done(format!("✅ Lecture '{topic}' for course {course} added!")),
                Ok(false) => done("❌ That lecture already exists."),
                Err(e) => {
                    error!("failed to add lecture: {e}");
                    done(GENERIC_FAILURE)
                }
            }
        }
    }
}

fn advance_add_file(
    store: &LectureStore,
    session: &mut Option<Session>,
    step: AddFileStep,
    input: WizardInput,
) -> StepReply {
    match step {
        AddFileStep::Course => {
            let course = match parse_course(&input) {
                Ok(c) => c,
                Err(reply) => return reply,
            };
            let topics = match store.topics_by_course(course) {
                Ok(t) => t,
                Err(e) => {
                    error!("failed to list topics: {e}");
                    *session = None;
                    return done(GENERIC_FAILURE);
                }
            };
            if topics.is_empty() {
                *session = None;
                return done("📭 This course has no lectures yet. Add a lecture first.");
            }
            *session = Some(Session::AddFile(AddFileStep::Topic { course }));
            prompt("Pick a topic:", Keyboard::Topics(topics))
        }
        AddFileStep::Topic { course } => {
            let topics = match store.topics_by_course(course) {
                Ok(t) => t,
                Err(e) => {
                    error!("failed to list topics: {e}");
                    *session = None;
                    return done(GENERIC_FAILURE);
                }
            };
            let selected = match &input {
                WizardInput::Text(text) => {
                    let name = text.strip_prefix(TOPIC_BUTTON_PREFIX).unwrap_or(text).trim();
                    topics.iter().find(|t| t.as_str() == name).cloned()
                }
                _ => None,
            };
            let Some(topic) = selected else {
                return prompt(
                    "❌ Pick a topic from the list or hit '🔙 Back'.",
                    Keyboard::Topics(topics),
                );
            };
            *session = Some(Session::AddFile(AddFileStep::Kind { course, topic }));
            prompt("Pick the file type to upload:", Keyboard::FileKinds)
        }
        AddFileStep::Kind { course, topic } => {
            let kind = match &input {
                WizardInput::Text(text) => FileKind::from_label(text.trim()),
                _ => None,
            };
            let Some(kind) = kind else {
                return prompt("❌ Pick a file type from the menu first.", Keyboard::FileKinds);
            };
            *session = Some(Session::AddFile(AddFileStep::Upload { course, topic, kind }));
            prompt(
                "Now send the file itself. For audio you can also send a voice note.",
                Keyboard::Back,
            )
        }
        AddFileStep::Upload { course, topic, kind } => {
            let file_id = match (kind, &input) {
                (FileKind::Audio, WizardInput::Audio(id)) => id.clone(),
                (FileKind::Document, WizardInput::Document(id)) => id.clone(),
                // Presentations are stored as plain document media.
                (FileKind::Presentation, WizardInput::Document(id)) => id.clone(),
                (FileKind::Photo, WizardInput::Photo(id)) => id.clone(),
                (_, WizardInput::Text(_)) => {
                    return prompt(
                        "❌ Expected a file. Send the file or hit '🔙 Back' to cancel.",
                        Keyboard::Back,
                    );
                }
                _ => {
                    let expected = match kind {
                        FileKind::Audio => "an audio file or voice note",
                        FileKind::Document => "a document",
                        FileKind::Presentation => "a presentation file",
                        FileKind::Photo => "a photo",
                    };
                    return prompt(
                        format!("❌ Expected {expected}. Send it or hit '🔙 Back'."),
                        Keyboard::Back,
                    );
                }
            };

            *session = None;
            match store.update_lecture_file(course, &topic, kind.as_str(), &file_id) {
                Ok(true) => done(format!(
                    "✅ {} attached to '{topic}' (course {course}).",
                    kind.label()
                )),
                Ok(false) => {
                    error!("file update matched no lecture: course={course}, topic='{topic}'");
                    done(GENERIC_FAILURE)
                }
                Err(e) => {
                    error!("failed to save file reference: {e}");
                    done(GENERIC_FAILURE)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> WizardInput {
        WizardInput::Text(s.to_string())
    }

    fn expect_prompt(reply: &StepReply) -> &str {
        match reply {
            StepReply::Prompt { text, .. } => text,
            StepReply::Done { .. } => panic!("expected Prompt, got Done"),
        }
    }

    fn expect_done(reply: &StepReply) -> &str {
        match reply {
            StepReply::Done { notice: Some(n) } => n,
            other => panic!("expected Done with notice, got {other:?}"),
        }
    }

    #[test]
    fn test_course_step_rejects_non_numeric() {
        let store = LectureStore::in_memory();
        let mut session = None;
        start_add_lecture(&mut session);

        let reply = advance(&store, &mut session, text("abc"));
        assert!(expect_prompt(&reply).contains("number"));
        // Still waiting for a course; no course was recorded.
        assert_eq!(session, Some(Session::AddLecture(AddLectureStep::Course)));
    }

    #[test]
    fn test_course_step_rejects_out_of_range() {
        let store = LectureStore::in_memory();
        let mut session = None;
        start_add_lecture(&mut session);

        let reply = advance(&store, &mut session, text("5"));
        assert!(expect_prompt(&reply).contains("1 to 4") || expect_prompt(&reply).contains("1–4"));
        assert_eq!(session, Some(Session::AddLecture(AddLectureStep::Course)));

        let reply = advance(&store, &mut session, text("0"));
        expect_prompt(&reply);
        assert_eq!(session, Some(Session::AddLecture(AddLectureStep::Course)));
    }

    #[test]
    fn test_add_lecture_happy_path() {
        let store = LectureStore::in_memory();
        let mut session = None;
        start_add_lecture(&mut session);

        advance(&store, &mut session, text("2"));
        assert_eq!(session, Some(Session::AddLecture(AddLectureStep::Topic { course: 2 })));

        let reply = advance(&store, &mut session, text("  Networks  "));
        assert!(expect_done(&reply).contains("Networks"));
        assert!(session.is_none());
        assert!(store.lecture_exists(2, "Networks").unwrap());
    }

    #[test]
    fn test_add_lecture_empty_topic_reprompts() {
        let store = LectureStore::in_memory();
        let mut session = None;
        start_add_lecture(&mut session);
        advance(&store, &mut session, text("1"));

        let reply = advance(&store, &mut session, text("   "));
        assert!(expect_prompt(&reply).contains("empty"));
        assert_eq!(session, Some(Session::AddLecture(AddLectureStep::Topic { course: 1 })));
    }

    #[test]
    fn test_add_lecture_duplicate_aborts() {
        let store = LectureStore::in_memory();
        store.add_lecture(1, "Intro").unwrap();

        let mut session = None;
        start_add_lecture(&mut session);
        advance(&store, &mut session, text("1"));
        let reply = advance(&store, &mut session, text("Intro"));

        assert!(expect_done(&reply).contains("already exists"));
        assert!(session.is_none());
        assert_eq!(store.all_lectures().unwrap().len(), 1);
    }

    #[test]
    fn test_add_file_empty_course_aborts() {
        let store = LectureStore::in_memory();
        let mut session = None;
        start_add_file(&mut session);

        let reply = advance(&store, &mut session, text("3"));
        assert!(expect_done(&reply).contains("Add a lecture first"));
        assert!(session.is_none());
    }

    #[test]
    fn test_add_file_unknown_topic_reprompts() {
        let store = LectureStore::in_memory();
        store.add_lecture(2, "Networks").unwrap();

        let mut session = None;
        start_add_file(&mut session);
        advance(&store, &mut session, text("2"));

        let reply = advance(&store, &mut session, text("🔖 Compilers"));
        assert!(expect_prompt(&reply).contains("from the list"));
        assert_eq!(session, Some(Session::AddFile(AddFileStep::Topic { course: 2 })));
    }

    #[test]
    fn test_add_file_unknown_kind_reprompts() {
        let store = LectureStore::in_memory();
        store.add_lecture(2, "Networks").unwrap();

        let mut session = None;
        start_add_file(&mut session);
        advance(&store, &mut session, text("2"));
        advance(&store, &mut session, text("🔖 Networks"));

        let reply = advance(&store, &mut session, text("something else"));
        assert!(expect_prompt(&reply).contains("file type"));
        assert_eq!(
            session,
            Some(Session::AddFile(AddFileStep::Kind { course: 2, topic: "Networks".into() }))
        );
    }

    #[test]
    fn test_add_file_document_flow() {
        let store = LectureStore::in_memory();
        store.add_lecture(2, "Networks").unwrap();

        let mut session = None;
        start_add_file(&mut session);
        advance(&store, &mut session, text("2"));
        advance(&store, &mut session, text("🔖 Networks"));
        advance(&store, &mut session, text("📄 Document"));
        let reply = advance(&store, &mut session, WizardInput::Document("doc123".into()));

        assert!(expect_done(&reply).contains("attached"));
        assert!(session.is_none());

        let lecture = store.get_lecture(2, "Networks").unwrap().unwrap();
        assert_eq!(lecture.document.as_deref(), Some("doc123"));
        assert!(lecture.audio.is_none());
        assert!(lecture.presentation.is_none());
        assert!(lecture.photo.is_none());
    }

    #[test]
    fn test_add_file_presentation_accepts_document_media() {
        let store = LectureStore::in_memory();
        store.add_lecture(1, "Intro").unwrap();

        let mut session = None;
        start_add_file(&mut session);
        advance(&store, &mut session, text("1"));
        advance(&store, &mut session, text("🔖 Intro"));
        advance(&store, &mut session, text("📊 Presentation"));
        advance(&store, &mut session, WizardInput::Document("slides9".into()));

        let lecture = store.get_lecture(1, "Intro").unwrap().unwrap();
        assert_eq!(lecture.presentation.as_deref(), Some("slides9"));
        assert!(lecture.document.is_none());
    }

    #[test]
    fn test_upload_text_reprompts() {
        let store = LectureStore::in_memory();
        store.add_lecture(1, "Intro").unwrap();

        let mut session = None;
        start_add_file(&mut session);
        advance(&store, &mut session, text("1"));
        advance(&store, &mut session, text("🔖 Intro"));
        advance(&store, &mut session, text("🎧 Audio"));

        let reply = advance(&store, &mut session, text("here you go"));
        assert!(expect_prompt(&reply).contains("Expected a file"));
        assert!(matches!(session, Some(Session::AddFile(AddFileStep::Upload { .. }))));
    }

    #[test]
    fn test_upload_wrong_media_kind_reprompts() {
        let store = LectureStore::in_memory();
        store.add_lecture(1, "Intro").unwrap();

        let mut session = None;
        start_add_file(&mut session);
        advance(&store, &mut session, text("1"));
        advance(&store, &mut session, text("🔖 Intro"));
        advance(&store, &mut session, text("🖼 Photo"));

        let reply = advance(&store, &mut session, WizardInput::Document("doc1".into()));
        assert!(expect_prompt(&reply).contains("photo"));
        assert!(matches!(session, Some(Session::AddFile(AddFileStep::Upload { .. }))));
        assert!(store.get_lecture(1, "Intro").unwrap().unwrap().photo.is_none());
    }

    #[test]
    fn test_voice_counts_as_audio() {
        let store = LectureStore::in_memory();
        store.add_lecture(1, "Intro").unwrap();

        let mut session = None;
        start_add_file(&mut session);
        advance(&store, &mut session, text("1"));
        advance(&store, &mut session, text("🔖 Intro"));
        advance(&store, &mut session, text("🎧 Audio"));
        advance(&store, &mut session, WizardInput::Audio("voice7".into()));

        let lecture = store.get_lecture(1, "Intro").unwrap().unwrap();
        assert_eq!(lecture.audio.as_deref(), Some("voice7"));
    }

    #[tokio::test]
    async fn test_sessions_slot_is_stable_per_key() {
        let sessions = Sessions::new();
        let a = sessions.slot((1, 10));
        let b = sessions.slot((1, 10));
        let c = sessions.slot((2, 10));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));

        *a.lock().await = Some(Session::AiChat);
        assert_eq!(*b.lock().await, Some(Session::AiChat));
    }
}
