mod bot;
mod config;
mod gemini;
mod store;

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use bot::BotState;
use bot::wizard::Sessions;
use config::Config;
use gemini::GeminiClient;
use store::LectureStore;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "lectern.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("lectern.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting lectern...");
    info!("Loaded config from {config_path}");
    info!("Admin IDs: {:?}", config.admin_ids);

    let store = match LectureStore::open(&config.db_path) {
        Ok(store) => store,
        Err(e) => {
            error!("failed to open database {:?}: {e}", config.db_path);
            std::process::exit(1);
        }
    };
    // A failed schema check is logged but does not abort startup; queries
    // against the missing table will surface as generic errors.
    if let Err(e) = store.init_schema() {
        error!("failed to initialize database schema: {e}");
    }

    let bot = Bot::new(&config.telegram_bot_token);
    let gemini = GeminiClient::new(config.gemini_api_key.clone());
    let state = Arc::new(BotState {
        config,
        store,
        sessions: Sessions::new(),
        gemini,
    });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::handlers::handle_message))
        .branch(Update::filter_callback_query().endpoint(bot::callback::handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
