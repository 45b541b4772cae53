//! Updates pushed through the webhook processor against a stub Bot API.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::Uri;
use axum::{Json, Router};
use reel_relay_core::config::StorageSettings;
use reel_relay_core::slot::VideoSlot;
use reel_relay_core::storage::StateBackends;
use reel_relay_core::testing::MemoryBackend;
use reel_relay_transport_telegram::bot::views;
use reel_relay_transport_telegram::config::{
    BotSettings, RunMode, TelegramSettings, DEFAULT_WEBHOOK_BIND,
};
use reel_relay_transport_telegram::webhook::{TelegramProcessor, UpdateProcessor};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use teloxide::Bot;

const OWNER: i64 = 42;
const VISITOR: i64 = 99;

#[derive(Default)]
struct FakeApi {
    calls: Mutex<Vec<(String, Value)>>,
    fail_get_me: AtomicBool,
}

impl FakeApi {
    fn calls(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(name, _)| name == method)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    fn last(&self, method: &str) -> Value {
        self.calls(method).pop().unwrap_or(Value::Null)
    }
}

async fn fake_api(State(api): State<Arc<FakeApi>>, uri: Uri, body: Bytes) -> Json<Value> {
    let method = uri
        .path()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    api.calls
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push((method.clone(), payload.clone()));

    let result = match method.as_str() {
        "getme" => {
            if api.fail_get_me.load(Ordering::SeqCst) {
                return Json(json!({
                    "ok": false,
                    "error_code": 500,
                    "description": "Internal Server Error"
                }));
            }
            json!({
                "id": 1,
                "is_bot": true,
                "first_name": "Reel",
                "username": "reel_bot",
                "can_join_groups": true,
                "can_read_all_group_messages": false,
                "supports_inline_queries": true,
                "can_connect_to_business": false,
                "has_main_web_app": false
            })
        }
        "sendmessage" => json!({
            "message_id": 1,
            "date": 1_700_000_000,
            "chat": { "id": payload["chat_id"], "type": "private", "first_name": "User" },
            "text": payload["text"]
        }),
        _ => json!(true),
    };
    Json(json!({ "ok": true, "result": result }))
}

struct Harness {
    api: Arc<FakeApi>,
    slot: Arc<VideoSlot>,
    processor: TelegramProcessor,
}

async fn harness(owner: Option<i64>) -> anyhow::Result<Harness> {
    let api = Arc::new(FakeApi::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().fallback(fake_api).with_state(api.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let settings = Arc::new(BotSettings {
        storage: Arc::new(StorageSettings::default()),
        telegram: Arc::new(TelegramSettings {
            bot_token: "123456:TEST".to_string(),
            owner_id_str: owner.map(|id| id.to_string()),
            bot_mode: RunMode::Webhook,
            webhook_bind: DEFAULT_WEBHOOK_BIND.to_string(),
            webhook_secret: None,
            webhook_url: None,
            notify_owner_on_error: Some(false),
            inline_cache_bust_secs: 10,
        }),
        owner_id: owner,
    });

    let backend = Arc::new(MemoryBackend::default());
    let slot = Arc::new(VideoSlot::new(StateBackends::new(None, backend)));
    let bot = Bot::new("123456:TEST").set_api_url(url::Url::parse(&format!("http://{addr}"))?);
    let processor = TelegramProcessor::new(bot, slot.clone(), settings);

    Ok(Harness {
        api,
        slot,
        processor,
    })
}

fn message(update_id: i64, from: i64, content: &Value) -> Value {
    let mut message = json!({
        "message_id": update_id,
        "date": 1_700_000_000,
        "chat": { "id": from, "type": "private", "first_name": "User" },
        "from": { "id": from, "is_bot": false, "first_name": "User" }
    });
    if let (Some(fields), Some(extra)) = (message.as_object_mut(), content.as_object()) {
        for (key, value) in extra {
            fields.insert(key.clone(), value.clone());
        }
    }
    json!({ "update_id": update_id, "message": message })
}

fn video(file_id: &str) -> Value {
    json!({
        "video": {
            "file_id": file_id,
            "file_unique_id": format!("u-{file_id}"),
            "width": 640,
            "height": 360,
            "duration": 3,
            "file_size": 1024
        }
    })
}

fn command(text: &str) -> Value {
    json!({
        "text": text,
        "entities": [{ "type": "bot_command", "offset": 0, "length": text.len() }]
    })
}

fn inline_query(update_id: i64, from: i64) -> Value {
    json!({
        "update_id": update_id,
        "inline_query": {
            "id": format!("q{update_id}"),
            "from": { "id": from, "is_bot": false, "first_name": "User" },
            "query": "",
            "offset": ""
        }
    })
}

#[tokio::test]
async fn visitor_store_and_clear_are_rejected() -> anyhow::Result<()> {
    let h = harness(Some(OWNER)).await?;

    h.processor.process(message(1, VISITOR, &video("INTRUDER"))).await;
    let reply = h.api.last("sendmessage");
    assert_eq!(reply["chat_id"], VISITOR);
    assert_eq!(reply["text"], views::STORE_DENIED);
    assert_eq!(h.slot.current(), None);

    h.processor.process(message(2, OWNER, &video("OWNER_FILE"))).await;
    assert_eq!(h.slot.current().as_deref(), Some("OWNER_FILE"));
    assert!(h.api.last("sendmessage")["text"]
        .as_str()
        .is_some_and(|text| text.starts_with("✅ Video stored!")));

    h.processor.process(message(3, VISITOR, &command("/clear"))).await;
    let reply = h.api.last("sendmessage");
    assert_eq!(reply["chat_id"], VISITOR);
    assert_eq!(reply["text"], views::CLEAR_DENIED);
    assert_eq!(h.slot.current().as_deref(), Some("OWNER_FILE"));

    assert!(h.slot.is_loaded());
    assert_eq!(h.api.calls("getme").len(), 1);
    Ok(())
}

#[tokio::test]
async fn owner_store_visitor_inline_owner_clear() -> anyhow::Result<()> {
    let h = harness(Some(OWNER)).await?;

    h.processor.process(message(1, OWNER, &video("ABCDEF123"))).await;
    h.processor.process(inline_query(2, VISITOR)).await;

    let answer = h.api.last("answerinlinequery");
    assert_eq!(answer["cache_time"], 0);
    assert_eq!(answer["is_personal"], true);
    assert_eq!(answer["results"][0]["type"], "video");
    assert_eq!(answer["results"][0]["video_file_id"], "ABCDEF123");

    h.processor.process(message(3, OWNER, &command("/clear"))).await;
    assert_eq!(h.api.last("sendmessage")["text"], views::CLEARED);
    assert_eq!(h.slot.current(), None);

    h.processor.process(inline_query(4, VISITOR)).await;
    let answer = h.api.last("answerinlinequery");
    assert_eq!(answer["results"][0]["type"], "article");
    assert_eq!(answer["results"][0]["id"], "no_video");
    Ok(())
}

#[tokio::test]
async fn failed_handshake_is_retried_on_next_update() -> anyhow::Result<()> {
    let h = harness(Some(OWNER)).await?;

    h.api.fail_get_me.store(true, Ordering::SeqCst);
    h.processor.process(message(1, OWNER, &video("FIRST"))).await;
    assert_eq!(h.slot.current(), None);
    assert!(h.api.calls("sendmessage").is_empty());

    h.api.fail_get_me.store(false, Ordering::SeqCst);
    h.processor.process(message(2, OWNER, &video("SECOND"))).await;
    assert_eq!(h.slot.current().as_deref(), Some("SECOND"));
    assert_eq!(h.api.calls("getme").len(), 2);
    Ok(())
}

#[tokio::test]
async fn open_mode_lets_visitors_store() -> anyhow::Result<()> {
    let h = harness(None).await?;

    h.processor.process(message(1, VISITOR, &video("ANYONE"))).await;
    assert_eq!(h.slot.current().as_deref(), Some("ANYONE"));

    h.processor.process(message(2, VISITOR, &command("/start"))).await;
    assert!(h.api.last("sendmessage")["text"]
        .as_str()
        .is_some_and(|text| text.contains("Send me a video")));
    Ok(())
}
