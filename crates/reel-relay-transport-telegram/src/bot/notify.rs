//! Forwarding handler failures to the owner.

use crate::config::BotSettings;
use reel_relay_core::utils::truncate_str;
use teloxide::prelude::*;
use tracing::{error, warn};

/// Longest error text forwarded to the owner.
pub const MAX_NOTIFICATION_CHARS: usize = 4000;

/// Text of the owner notification for `err`.
#[must_use]
pub fn error_notification(err: &anyhow::Error) -> String {
    truncate_str(format!("⚠️ Bot error: {err}"), MAX_NOTIFICATION_CHARS)
}

/// Log a handler failure and, when enabled, tell the owner about it.
///
/// A failed notification is only logged.
pub async fn report_error(bot: &Bot, settings: &BotSettings, context: &str, err: &anyhow::Error) {
    error!("{context} error: {err:#}");

    if !settings.telegram.notify_owner_on_error() {
        return;
    }
    let Some(owner_id) = settings.owner_id else {
        return;
    };

    if let Err(e) = bot
        .send_message(ChatId(owner_id), error_notification(err))
        .await
    {
        warn!("Failed to notify owner {owner_id} about an error: {e}");
    }
}
