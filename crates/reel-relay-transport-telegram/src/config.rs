//! Telegram transport settings.

use config::ConfigError;
use reel_relay_core::config::StorageSettings;
use reel_relay_core::inline::DEFAULT_CACHE_BUST_SECS;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How updates reach the bot.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Long-lived process pulling updates with `getUpdates`
    #[default]
    Polling,
    /// HTTP server receiving updates pushed by Telegram
    Webhook,
}

/// Default listen address for webhook mode.
pub const DEFAULT_WEBHOOK_BIND: &str = "0.0.0.0:8080";

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    #[serde(alias = "telegram_token")]
    pub bot_token: String,
    /// Numeric Telegram ID of the owner; unset means anyone may change the video.
    #[serde(rename = "owner_id")]
    pub owner_id_str: Option<String>,
    /// Polling or webhook.
    #[serde(default)]
    pub bot_mode: RunMode,
    /// Listen address for webhook mode.
    #[serde(default = "default_webhook_bind")]
    pub webhook_bind: String,
    /// Shared secret expected in `X-Telegram-Bot-Api-Secret-Token`.
    pub webhook_secret: Option<String>,
    /// Public URL to register with Telegram at startup (webhook mode).
    pub webhook_url: Option<String>,
    /// Send handler errors to the owner. Defaults to on for polling, off for webhook.
    pub notify_owner_on_error: Option<bool>,
    /// Width of the time bucket mixed into inline result ids; 0 disables it.
    #[serde(default = "default_cache_bust_secs")]
    pub inline_cache_bust_secs: u64,
}

fn default_webhook_bind() -> String {
    DEFAULT_WEBHOOK_BIND.to_string()
}

const fn default_cache_bust_secs() -> u64 {
    DEFAULT_CACHE_BUST_SECS
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the token is missing or `OWNER_ID` is not an integer.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = reel_relay_core::config::build_config()?.try_deserialize()?;
        settings.owner_id()?;
        Ok(settings)
    }

    /// Parsed owner ID.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the value is present but not an integer.
    pub fn owner_id(&self) -> Result<Option<i64>, ConfigError> {
        match self.owner_id_str.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
                ConfigError::Message(format!("OWNER_ID must be an integer, got '{raw}'"))
            }),
        }
    }

    /// Whether handler errors are forwarded to the owner.
    #[must_use]
    pub fn notify_owner_on_error(&self) -> bool {
        self.notify_owner_on_error
            .unwrap_or(self.bot_mode == RunMode::Polling)
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Persistence settings.
    pub storage: Arc<StorageSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
    /// Owner ID parsed once at startup.
    pub owner_id: Option<i64>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `OWNER_ID` is malformed.
    pub fn new(storage: StorageSettings, telegram: TelegramSettings) -> Result<Self, ConfigError> {
        let owner_id = telegram.owner_id()?;
        Ok(Self {
            storage: Arc::new(storage),
            telegram: Arc::new(telegram),
            owner_id,
        })
    }
}
