//! Reply texts.

use reel_relay_core::slot::{tail_chars, SaveOutcome, VideoState};

/// Reply to a non-owner trying to store a video.
pub const STORE_DENIED: &str = "❌ Only the owner can update the stored video.";
/// Reply to a non-owner trying to clear the video.
pub const CLEAR_DENIED: &str = "❌ Only the owner can clear the stored video.";
/// Reply after clearing.
pub const CLEARED: &str = "🗑️ Video cleared.";
/// Status when nothing is stored.
pub const NO_VIDEO: &str = "❌ No video stored.";

const MEMORY_ONLY_WARNING: &str =
    "\n\n⚠️ Could not write it to storage. It stays active until the bot restarts.";

/// Greeting for `/start`; the owner (or anyone in open mode) gets upload instructions.
#[must_use]
pub fn welcome(can_upload: bool, bot_username: &str) -> String {
    if can_upload {
        format!(
            "👋 Hi! Send me a video to store it, then use @{bot_username} in any chat to send it!"
        )
    } else {
        format!(
            "👋 Hi! This bot works inline. Type @{bot_username} in any chat to send the stored video."
        )
    }
}

/// Text for `/help`.
#[must_use]
pub fn help(bot_username: &str) -> String {
    format!(
        "📹 Video Bot Commands:\n\n\
         /start - Start the bot\n\
         /help - Show this help message\n\
         /status - Check if a video is stored\n\
         /clear - Clear the stored video\n\n\
         💬 Inline Usage:\n\
         • Type @{bot_username} in any chat to send the stored video\n\
         • Works in private chats, groups, and channels"
    )
}

/// Text for `/status`.
#[must_use]
pub fn status(state: &VideoState, owner_id: Option<i64>) -> String {
    let Some(reference) = state.reference() else {
        return NO_VIDEO.to_string();
    };

    let mut text = format!(
        "✅ Video is stored and ready to send. id…{}",
        tail_chars(reference, 8)
    );
    if let Some(owner) = owner_id {
        text.push_str(&format!(" (owner {owner})"));
    }
    if let Some(at) = state.stored_at {
        text.push_str(&format!("\nStored at {}", at.format("%Y-%m-%d %H:%M UTC")));
    }
    text
}

/// Reply after a video was stored.
#[must_use]
pub fn stored(bot_username: &str, outcome: SaveOutcome) -> String {
    let mut text = format!("✅ Video stored! Use @{bot_username} in any chat to send it.");
    if !outcome.is_durable() {
        text.push_str(MEMORY_ONLY_WARNING);
    }
    text
}

/// Reply after the video was cleared.
#[must_use]
pub fn cleared(outcome: SaveOutcome) -> String {
    let mut text = CLEARED.to_string();
    if !outcome.is_durable() {
        text.push_str(MEMORY_ONLY_WARNING);
    }
    text
}
