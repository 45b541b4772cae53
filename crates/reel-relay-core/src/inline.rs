//! Inline query answers.
//!
//! Renders the current slot into a platform-neutral [`InlineAnswer`]; the
//! Telegram transport converts it into Bot API result objects.

use crate::slot::tail_chars;
use chrono::{DateTime, Utc};

/// Inline answers are never cached by Telegram.
pub const INLINE_CACHE_TIME_SECS: u32 = 0;
/// Result id used when no video is stored.
pub const NO_VIDEO_RESULT_ID: &str = "no_video";
/// Number of trailing reference characters used in the result id.
pub const RESULT_ID_SUFFIX_CHARS: usize = 32;
/// Bot API limit on inline result ids.
pub const MAX_RESULT_ID_BYTES: usize = 64;
/// Default cache-busting window for result ids.
pub const DEFAULT_CACHE_BUST_SECS: u64 = 10;

/// One inline query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineEntry {
    /// Re-send a previously uploaded video by its `file_id`
    CachedVideo {
        /// Result id, stable for an unchanged reference within a time bucket
        id: String,
        /// Stored video reference
        video_file_id: String,
        /// Title shown in the results list
        title: String,
        /// Description shown under the title
        description: String,
    },
    /// Placeholder telling the requester that nothing is stored yet
    NoVideo {
        /// Result id
        id: String,
        /// Title shown in the results list
        title: String,
        /// Description shown under the title
        description: String,
        /// Text sent into the chat if the placeholder is chosen
        message_text: String,
    },
}

impl InlineEntry {
    /// Result id of this entry.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::CachedVideo { id, .. } | Self::NoVideo { id, .. } => id,
        }
    }
}

/// Complete answer to one inline query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAnswer {
    /// Results, never empty
    pub results: Vec<InlineEntry>,
    /// Client cache lifetime in seconds
    pub cache_time: u32,
    /// Whether the answer is specific to the requesting user
    pub is_personal: bool,
}

/// Builds inline answers from the slot value.
#[derive(Debug, Clone, Copy)]
pub struct InlineResponder {
    cache_bust_secs: u64,
}

impl Default for InlineResponder {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_BUST_SECS)
    }
}

impl InlineResponder {
    /// Create a responder; `cache_bust_secs == 0` disables time buckets in result ids.
    #[must_use]
    pub const fn new(cache_bust_secs: u64) -> Self {
        Self { cache_bust_secs }
    }

    /// Answer for `reference` at the current time.
    #[must_use]
    pub fn respond(&self, reference: Option<&str>, bot_username: &str) -> InlineAnswer {
        self.respond_at(reference, bot_username, Utc::now())
    }

    /// Answer for `reference` as of `now`.
    #[must_use]
    pub fn respond_at(
        &self,
        reference: Option<&str>,
        bot_username: &str,
        now: DateTime<Utc>,
    ) -> InlineAnswer {
        let entry = match reference.filter(|r| !r.is_empty()) {
            Some(reference) => InlineEntry::CachedVideo {
                id: self.result_id(reference, now),
                video_file_id: reference.to_string(),
                title: "Send stored video".to_string(),
                description: "Click to send the stored video".to_string(),
            },
            None => InlineEntry::NoVideo {
                id: NO_VIDEO_RESULT_ID.to_string(),
                title: "No video stored".to_string(),
                description: "Send a video to the bot first".to_string(),
                message_text: format!("❌ No video stored. Send a video to @{bot_username} first."),
            },
        };

        InlineAnswer {
            results: vec![entry],
            cache_time: INLINE_CACHE_TIME_SECS,
            is_personal: true,
        }
    }

    /// Result id for `reference`: `vid_<suffix>` plus `_<bucket>` when cache-busting.
    #[must_use]
    pub fn result_id(&self, reference: &str, now: DateTime<Utc>) -> String {
        let bucket = self.bucket(now).map(|b| format!("_{b}")).unwrap_or_default();
        let budget = MAX_RESULT_ID_BYTES - "vid_".len() - bucket.len();

        let mut suffix = tail_chars(reference, RESULT_ID_SUFFIX_CHARS);
        while suffix.len() > budget {
            let mut chars = suffix.chars();
            chars.next();
            suffix = chars.as_str();
        }

        format!("vid_{suffix}{bucket}")
    }

    fn bucket(&self, now: DateTime<Utc>) -> Option<i64> {
        if self.cache_bust_secs == 0 {
            return None;
        }
        let window = i64::try_from(self.cache_bust_secs).unwrap_or(i64::MAX);
        Some(now.timestamp().div_euclid(window))
    }
}
