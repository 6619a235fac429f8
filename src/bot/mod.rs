//! Telegram bot surface: menu routing, admin wizards, callback actions.

pub mod callback;
pub mod handlers;
pub mod menu;
pub mod wizard;

use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::store::LectureStore;
use crate::bot::wizard::Sessions;

/// Shared state injected into every handler.
pub struct BotState {
    pub config: Config,
    pub store: LectureStore,
    pub sessions: Sessions,
    pub gemini: GeminiClient,
}
