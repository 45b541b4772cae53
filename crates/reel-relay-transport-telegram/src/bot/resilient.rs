//! Replies with automatic retry on transient Telegram API failures.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message};

/// Send a plain-text message, retrying with exponential backoff.
///
/// Uses [`reel_relay_core::utils::retry_transport_operation`].
///
/// # Errors
///
/// Returns the last error once all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    reel_relay_core::utils::retry_transport_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}
