//! Inline query handling.

use reel_relay_core::inline::{InlineAnswer, InlineEntry, InlineResponder};
use reel_relay_core::slot::VideoSlot;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{
    FileId, InlineQueryResult, InlineQueryResultArticle, InlineQueryResultCachedVideo,
    InlineQuery, InputMessageContent, InputMessageContentText, Me,
};
use tracing::{debug, warn};

/// Convert a core entry into a Bot API inline result.
#[must_use]
pub fn to_telegram_result(entry: InlineEntry) -> InlineQueryResult {
    match entry {
        InlineEntry::CachedVideo {
            id,
            video_file_id,
            title,
            description,
        } => InlineQueryResult::CachedVideo(
            InlineQueryResultCachedVideo::new(id, FileId(video_file_id), title)
                .description(description),
        ),
        InlineEntry::NoVideo {
            id,
            title,
            description,
            message_text,
        } => InlineQueryResult::Article(
            InlineQueryResultArticle::new(
                id,
                title,
                InputMessageContent::Text(InputMessageContentText::new(message_text)),
            )
            .description(description),
        ),
    }
}

/// Convert a whole answer into Bot API results.
#[must_use]
pub fn to_telegram_results(answer: InlineAnswer) -> Vec<InlineQueryResult> {
    answer.results.into_iter().map(to_telegram_result).collect()
}

/// Answer an inline query with the stored video or the "no video" placeholder.
///
/// Failures are logged and never propagated; an expired query is expected
/// when answers are slow and only logged at debug level.
pub async fn answer(
    bot: &Bot,
    query: &InlineQuery,
    me: &Me,
    slot: &Arc<VideoSlot>,
    responder: InlineResponder,
) {
    let reference = slot.current();
    let answer = responder.respond(reference.as_deref(), me.username());
    let cache_time = answer.cache_time;
    let is_personal = answer.is_personal;

    debug!(
        "Answering inline query {} from {} (video stored: {})",
        query.id,
        query.from.id,
        reference.is_some()
    );

    let result = bot
        .answer_inline_query(query.id.clone(), to_telegram_results(answer))
        .cache_time(cache_time)
        .is_personal(is_personal)
        .await;

    if let Err(e) = result {
        let text = e.to_string();
        if text.contains("query is too old") || text.contains("query ID is invalid") {
            debug!("Inline query {} expired before it was answered: {text}", query.id);
        } else {
            warn!("Failed to answer inline query {}: {text}", query.id);
        }
    }
}
