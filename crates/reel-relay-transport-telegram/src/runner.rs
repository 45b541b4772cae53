use crate::bot;
use crate::bot::handlers::Command;
use crate::config::{BotSettings, RunMode};
use reel_relay_core::access::AccessGuard;
use reel_relay_core::inline::InlineResponder;
use reel_relay_core::slot::VideoSlot;
use reel_relay_core::storage::StateBackends;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{InlineQuery, Me};
use tracing::{info, warn};

/// Run the bot in the configured mode until shutdown.
///
/// # Errors
///
/// Returns an error if the webhook server cannot bind or fails while serving.
pub async fn run(settings: Arc<BotSettings>) -> anyhow::Result<()> {
    match settings.telegram.bot_mode {
        RunMode::Polling => {
            run_polling(settings).await;
            Ok(())
        }
        RunMode::Webhook => crate::webhook::run_webhook(settings).await,
    }
}

/// Run the long-polling dispatcher.
pub async fn run_polling(settings: Arc<BotSettings>) {
    let slot = init_slot(&settings).await;
    slot.ensure_loaded().await;

    let bot = Bot::new(settings.telegram.bot_token.clone());
    let guard = init_guard(&settings);
    let responder = InlineResponder::new(settings.telegram.inline_cache_bust_secs);

    // getUpdates is refused while a webhook is registered
    if let Err(e) = bot.delete_webhook().await {
        warn!("Failed to delete webhook before polling: {e}");
    }

    info!("Bot is running (polling)...");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![slot, settings, guard, responder])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

/// Build the shared video slot from the storage settings.
pub async fn init_slot(settings: &BotSettings) -> Arc<VideoSlot> {
    let backends = StateBackends::from_settings(&settings.storage).await;
    Arc::new(VideoSlot::new(backends))
}

/// Build the access guard and log the ownership mode.
#[must_use]
pub fn init_guard(settings: &BotSettings) -> AccessGuard {
    let guard = AccessGuard::new(settings.owner_id);
    match guard.owner_id() {
        Some(owner) => info!("Owner mode: only user {owner} may change the video."),
        None => warn!("OWNER_ID is not set: anyone may change the stored video."),
    }
    guard
}

/// Update routing shared by polling and webhook modes.
///
/// Expects `Bot`, `Me`, `Update`, `Arc<VideoSlot>`, `Arc<BotSettings>`,
/// `AccessGuard` and `InlineResponder` in the dependency map.
#[must_use]
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_inline_query().endpoint(handle_inline_query))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.video().is_some()).endpoint(handle_video),
                ),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    me: Me,
    slot: Arc<VideoSlot>,
    settings: Arc<BotSettings>,
    guard: AccessGuard,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot.clone(), msg, me, guard).await,
        Command::Help => bot::handlers::help(bot.clone(), msg, me).await,
        Command::Status => {
            bot::handlers::status(bot.clone(), msg, slot, settings.clone()).await
        }
        Command::Clear => bot::handlers::clear(bot.clone(), msg, slot, guard).await,
    };
    if let Err(e) = res {
        bot::notify::report_error(&bot, &settings, "Command", &e).await;
    }
    respond(())
}

async fn handle_video(
    bot: Bot,
    msg: Message,
    me: Me,
    slot: Arc<VideoSlot>,
    settings: Arc<BotSettings>,
    guard: AccessGuard,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::store_video(bot.clone(), msg, me, slot, guard).await {
        bot::notify::report_error(&bot, &settings, "Video handler", &e).await;
    }
    respond(())
}

async fn handle_inline_query(
    bot: Bot,
    query: InlineQuery,
    me: Me,
    slot: Arc<VideoSlot>,
    responder: InlineResponder,
) -> Result<(), teloxide::RequestError> {
    bot::inline::answer(&bot, &query, &me, &slot, responder).await;
    respond(())
}
