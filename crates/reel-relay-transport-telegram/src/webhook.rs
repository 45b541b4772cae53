//! Webhook mode.
//!
//! Telegram pushes updates as JSON to `POST /` (or `/api/bot`). Every request
//! is answered with `200 {"ok": true}` once the update has been processed,
//! including rejected, duplicate and malformed ones, so Telegram never
//! retries them.

use crate::config::BotSettings;
use crate::runner::{init_guard, init_slot, schema};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use moka::future::Cache;
use reel_relay_core::access::AccessGuard;
use reel_relay_core::inline::InlineResponder;
use reel_relay_core::slot::VideoSlot;
use serde_json::{json, Value};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::Me;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Header carrying the secret registered with `setWebhook`.
pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";
/// How long a delivered `update_id` is remembered.
pub const DEDUP_TTL_SECS: u64 = 600;
/// Upper bound on remembered `update_id`s.
pub const DEDUP_MAX_ENTRIES: u64 = 10_000;

/// Processes one raw update received over HTTP.
#[async_trait]
pub trait UpdateProcessor: Send + Sync {
    /// Handle the update; failures are logged, never returned.
    async fn process(&self, update: Value);
}

/// Runs updates through the same handler tree as polling mode.
pub struct TelegramProcessor {
    bot: Bot,
    handler: UpdateHandler<teloxide::RequestError>,
    slot: Arc<VideoSlot>,
    settings: Arc<BotSettings>,
    guard: AccessGuard,
    responder: InlineResponder,
    me: OnceCell<Me>,
}

impl TelegramProcessor {
    /// Create a processor; no network calls happen until the first update.
    #[must_use]
    pub fn new(bot: Bot, slot: Arc<VideoSlot>, settings: Arc<BotSettings>) -> Self {
        let guard = init_guard(&settings);
        let responder = InlineResponder::new(settings.telegram.inline_cache_bust_secs);
        Self {
            bot,
            handler: schema(),
            slot,
            settings,
            guard,
            responder,
            me: OnceCell::new(),
        }
    }

    /// Load the slot and fetch the bot identity, once per process.
    ///
    /// A failed `getMe` leaves the cell empty so the next update retries.
    async fn cold_start(&self) -> Result<Me, teloxide::RequestError> {
        self.slot.ensure_loaded().await;
        let me = self
            .me
            .get_or_try_init(|| async {
                let me = self.bot.get_me().await?;
                info!("Cold start complete, running as @{}", me.username());
                Ok::<_, teloxide::RequestError>(me)
            })
            .await?;
        Ok(me.clone())
    }
}

#[async_trait]
impl UpdateProcessor for TelegramProcessor {
    async fn process(&self, update: Value) {
        let update: Update = match serde_json::from_value(update) {
            Ok(update) => update,
            Err(e) => {
                warn!("Dropping update that does not parse: {e}");
                return;
            }
        };

        let me = match self.cold_start().await {
            Ok(me) => me,
            Err(e) => {
                error!("Cold start failed, dropping update: {e}");
                return;
            }
        };

        let deps = dptree::deps![
            self.bot.clone(),
            me,
            update,
            self.slot.clone(),
            self.settings.clone(),
            self.guard,
            self.responder
        ];

        match self.handler.dispatch(deps).await {
            ControlFlow::Break(Ok(())) => {}
            ControlFlow::Break(Err(e)) => error!("Update handler error: {e}"),
            ControlFlow::Continue(_) => debug!("Update ignored: no matching handler"),
        }
    }
}

/// Shared state of the webhook router.
pub struct WebhookState {
    processor: Arc<dyn UpdateProcessor>,
    secret: Option<String>,
    seen: Cache<i64, ()>,
}

impl WebhookState {
    /// Create router state; `secret` enables header validation.
    #[must_use]
    pub fn new(processor: Arc<dyn UpdateProcessor>, secret: Option<String>) -> Self {
        let seen = Cache::builder()
            .max_capacity(DEDUP_MAX_ENTRIES)
            .time_to_live(Duration::from_secs(DEDUP_TTL_SECS))
            .build();
        Self {
            processor,
            secret: secret.filter(|s| !s.is_empty()),
            seen,
        }
    }

    fn secret_matches(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = self.secret.as_deref() else {
            return true;
        };
        headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|given| given == expected)
    }

    /// Returns false if `update_id` was already delivered recently.
    async fn first_delivery(&self, update_id: i64) -> bool {
        self.seen.entry(update_id).or_insert(()).await.is_fresh()
    }
}

/// HTTP routes: liveness on GET, updates on POST.
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/", get(health).post(receive_update))
        .route("/api/bot", get(health).post(receive_update))
        .with_state(state)
}

fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn health() -> Json<Value> {
    ok()
}

async fn receive_update(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    if !state.secret_matches(&headers) {
        warn!("Rejected webhook request with a missing or wrong secret token");
        return ok();
    }

    let update: Value = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Malformed webhook payload: {e}");
            return ok();
        }
    };

    if let Some(update_id) = update.get("update_id").and_then(Value::as_i64) {
        if !state.first_delivery(update_id).await {
            debug!("Skipping redelivered update {update_id}");
            return ok();
        }
    }

    state.processor.process(update).await;
    ok()
}

/// Serve the webhook endpoint until ctrl-c.
///
/// # Errors
///
/// Returns an error if the listen address cannot be bound or the server fails.
pub async fn run_webhook(settings: Arc<BotSettings>) -> anyhow::Result<()> {
    let bot = Bot::new(settings.telegram.bot_token.clone());
    let slot = init_slot(&settings).await;

    if let Some(url) = settings.telegram.webhook_url.as_deref() {
        register_webhook(&bot, url, settings.telegram.webhook_secret.as_deref()).await;
    }

    let processor = Arc::new(TelegramProcessor::new(bot, slot, settings.clone()));
    let state = Arc::new(WebhookState::new(
        processor,
        settings.telegram.webhook_secret.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(&settings.telegram.webhook_bind).await?;
    info!("Bot is running (webhook) on {}...", settings.telegram.webhook_bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Webhook server stopped.");
    Ok(())
}

async fn register_webhook(bot: &Bot, url: &str, secret: Option<&str>) {
    let url = match url::Url::parse(url) {
        Ok(url) => url,
        Err(e) => {
            error!("WEBHOOK_URL is not a valid URL: {e}");
            return;
        }
    };

    let mut request = bot.set_webhook(url.clone());
    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        request = request.secret_token(secret.to_string());
    }
    match request.await {
        Ok(_) => info!("Webhook registered at {url}"),
        Err(e) => error!("Failed to register webhook at {url}: {e}"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
    info!("Shutdown signal received.");
}
