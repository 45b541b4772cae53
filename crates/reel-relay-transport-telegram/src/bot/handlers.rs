use crate::bot::resilient::send_message_resilient;
use crate::bot::views;
use crate::config::BotSettings;
use anyhow::Result;
use reel_relay_core::access::{Access, AccessGuard};
use reel_relay_core::slot::VideoSlot;
use std::sync::Arc;
use teloxide::{prelude::*, types::Me, utils::command::BotCommands};
use tracing::{info, warn};

/// Name used in logs for the sender of a message.
#[must_use]
pub fn get_user_name(msg: &Message) -> String {
    if let Some(ref user) = msg.from {
        if let Some(ref username) = user.username {
            return username.clone();
        }
        if !user.first_name.is_empty() {
            return user.first_name.clone();
        }
    }
    "Unknown".to_string()
}

/// Sender ID of a message, `None` for anonymous senders.
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> Option<i64> {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok())
}

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Greet the user
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage
    #[command(description = "Show help.")]
    Help,
    /// Report whether a video is stored
    #[command(description = "Check if a video is stored.")]
    Status,
    /// Forget the stored video
    #[command(description = "Clear the stored video.")]
    Clear,
}

/// Start handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn start(bot: Bot, msg: Message, me: Me, guard: AccessGuard) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let user_name = get_user_name(&msg);
    info!("User {user_id:?} ({user_name}) initiated /start command.");

    let can_upload = guard.check(user_id) == Access::Granted;
    send_message_resilient(&bot, msg.chat.id, views::welcome(can_upload, me.username())).await?;
    Ok(())
}

/// Help handler
///
/// # Errors
///
/// Returns an error if the help message cannot be sent.
pub async fn help(bot: Bot, msg: Message, me: Me) -> Result<()> {
    send_message_resilient(&bot, msg.chat.id, views::help(me.username())).await?;
    Ok(())
}

/// Status handler
///
/// # Errors
///
/// Returns an error if the status message cannot be sent.
pub async fn status(
    bot: Bot,
    msg: Message,
    slot: Arc<VideoSlot>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    let state = slot.snapshot();
    send_message_resilient(&bot, msg.chat.id, views::status(&state, settings.owner_id)).await?;
    Ok(())
}

/// Clear the slot if `actor` may, returning the reply for the chat.
pub async fn clear_reply(slot: &VideoSlot, guard: AccessGuard, actor: Option<i64>) -> String {
    if guard.check(actor) == Access::Denied {
        warn!("User {actor:?} tried to clear the video without permission.");
        return views::CLEAR_DENIED.to_string();
    }

    let outcome = slot.clear().await;
    info!("User {actor:?} cleared the video ({outcome:?}).");
    views::cleared(outcome)
}

/// Store `reference` if `actor` may, returning the reply for the chat.
pub async fn store_reply(
    slot: &VideoSlot,
    guard: AccessGuard,
    actor: Option<i64>,
    reference: String,
    bot_username: &str,
) -> String {
    if guard.check(actor) == Access::Denied {
        warn!("User {actor:?} tried to store a video without permission.");
        return views::STORE_DENIED.to_string();
    }

    let outcome = slot.set(reference).await;
    info!("User {actor:?} stored a video ({outcome:?}).");
    views::stored(bot_username, outcome)
}

/// Clear handler, owner only
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn clear(bot: Bot, msg: Message, slot: Arc<VideoSlot>, guard: AccessGuard) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    info!("User {user_id:?} ({}) initiated /clear command.", get_user_name(&msg));

    let reply = clear_reply(&slot, guard, user_id).await;
    send_message_resilient(&bot, msg.chat.id, reply).await?;
    Ok(())
}

/// Video message handler, owner only. Replaces the stored video.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn store_video(
    bot: Bot,
    msg: Message,
    me: Me,
    slot: Arc<VideoSlot>,
    guard: AccessGuard,
) -> Result<()> {
    let Some(video) = msg.video() else {
        return Ok(());
    };
    let user_id = get_user_id_safe(&msg);
    info!(
        "User {user_id:?} ({}) sent a video ({} bytes).",
        get_user_name(&msg),
        video.file.size
    );

    let reply = store_reply(&slot, guard, user_id, video.file.id.0.clone(), me.username()).await;
    send_message_resilient(&bot, msg.chat.id, reply).await?;
    Ok(())
}
