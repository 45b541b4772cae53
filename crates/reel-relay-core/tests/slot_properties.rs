use chrono::{TimeZone, Utc};
use reel_relay_core::access::{Access, AccessGuard};
use reel_relay_core::inline::{InlineEntry, InlineResponder};
use reel_relay_core::slot::{SaveOutcome, VideoSlot};
use reel_relay_core::storage::{BackendKind, KvBackend, StateBackends, VIDEO_STATE_KEY};
use reel_relay_core::testing::MemoryBackend;
use std::sync::Arc;

fn slot_over(backend: &Arc<MemoryBackend>) -> VideoSlot {
    VideoSlot::new(StateBackends::new(None, backend.clone()))
}

/// What the bot does on "store video": guard first, then the slot.
async fn try_store(guard: &AccessGuard, slot: &VideoSlot, actor: i64, reference: &str) -> Access {
    let access = guard.check(Some(actor));
    if access == Access::Granted {
        slot.set(reference).await;
    }
    access
}

async fn try_clear(guard: &AccessGuard, slot: &VideoSlot, actor: i64) -> Access {
    let access = guard.check(Some(actor));
    if access == Access::Granted {
        slot.clear().await;
    }
    access
}

#[tokio::test]
async fn last_write_wins() {
    let backend = Arc::new(MemoryBackend::default());
    let slot = slot_over(&backend);

    slot.set("first").await;
    slot.set("second").await;
    assert_eq!(slot.current().as_deref(), Some("second"));

    slot.clear().await;
    assert_eq!(slot.current(), None);

    slot.set("third").await;
    assert_eq!(slot.current().as_deref(), Some("third"));
}

#[tokio::test]
async fn non_owner_cannot_mutate() {
    let backend = Arc::new(MemoryBackend::default());
    let slot = slot_over(&backend);
    let guard = AccessGuard::new(Some(42));

    assert_eq!(try_store(&guard, &slot, 42, "OWNER_VIDEO").await, Access::Granted);
    assert_eq!(try_store(&guard, &slot, 99, "INTRUDER").await, Access::Denied);
    assert_eq!(try_clear(&guard, &slot, 99).await, Access::Denied);

    assert_eq!(slot.current().as_deref(), Some("OWNER_VIDEO"));
}

#[tokio::test]
async fn open_mode_lets_anyone_mutate() {
    let backend = Arc::new(MemoryBackend::default());
    let slot = slot_over(&backend);
    let guard = AccessGuard::new(None);

    assert_eq!(try_store(&guard, &slot, 7, "SEVEN").await, Access::Granted);
    assert_eq!(slot.current().as_deref(), Some("SEVEN"));
    assert_eq!(try_clear(&guard, &slot, 8).await, Access::Granted);
    assert_eq!(slot.current(), None);
}

#[tokio::test]
async fn load_then_save_is_idempotent() {
    let backend = Arc::new(MemoryBackend::default());
    slot_over(&backend).set("STABLE").await;
    let before = backend.raw();

    let slot = slot_over(&backend);
    let loaded = slot.load().await;
    let outcome = slot.save(&loaded).await;

    assert_eq!(outcome, SaveOutcome::Persisted(BackendKind::Memory));
    assert_eq!(backend.raw(), before);
}

#[tokio::test]
async fn inline_answer_follows_slot() {
    let backend = Arc::new(MemoryBackend::default());
    let slot = slot_over(&backend);
    let responder = InlineResponder::new(10);

    let empty = responder.respond(slot.current().as_deref(), "reel_bot");
    assert!(!empty.results.is_empty());
    assert!(matches!(
        &empty.results[0],
        InlineEntry::NoVideo { message_text, .. } if message_text.contains("Send a video")
    ));

    slot.set("REF-123").await;
    let stored = responder.respond(slot.current().as_deref(), "reel_bot");
    assert!(matches!(
        &stored.results[0],
        InlineEntry::CachedVideo { video_file_id, .. } if video_file_id == "REF-123"
    ));
}

#[test]
fn result_ids_differ_across_buckets_but_reference_is_kept() {
    let responder = InlineResponder::new(5);
    let t1 = Utc.timestamp_opt(100, 0).single().unwrap_or_else(Utc::now);
    let t2 = Utc.timestamp_opt(105, 0).single().unwrap_or_else(Utc::now);

    let a = responder.respond_at(Some("SAME"), "reel_bot", t1);
    let b = responder.respond_at(Some("SAME"), "reel_bot", t2);

    assert_ne!(a.results[0].id(), b.results[0].id());
    for answer in [a, b] {
        assert!(matches!(
            &answer.results[0],
            InlineEntry::CachedVideo { video_file_id, .. } if video_file_id == "SAME"
        ));
    }
}

#[tokio::test]
async fn owner_store_visitor_query_owner_clear() {
    let backend = Arc::new(MemoryBackend::default());
    let slot = slot_over(&backend);
    let guard = AccessGuard::new(Some(42));
    let responder = InlineResponder::new(0);

    try_store(&guard, &slot, 42, "ABCDEF123").await;
    assert_eq!(slot.current().as_deref(), Some("ABCDEF123"));

    let answer = responder.respond(slot.current().as_deref(), "reel_bot");
    assert!(matches!(
        &answer.results[0],
        InlineEntry::CachedVideo { video_file_id, .. } if video_file_id == "ABCDEF123"
    ));

    try_clear(&guard, &slot, 42).await;
    assert_eq!(slot.current(), None);

    let answer = responder.respond(slot.current().as_deref(), "reel_bot");
    assert!(matches!(&answer.results[0], InlineEntry::NoVideo { .. }));
}

#[tokio::test]
async fn failed_save_survives_in_memory_but_not_restart() {
    let backend = Arc::new(MemoryBackend::default());
    let slot = slot_over(&backend);

    assert!(slot.set("DURABLE").await.is_durable());

    backend.fail_writes(true);
    assert_eq!(slot.set("VOLATILE").await, SaveOutcome::Failed);
    assert_eq!(slot.current().as_deref(), Some("VOLATILE"));

    // Simulated restart against the same store
    let restarted = slot_over(&backend);
    restarted.load().await;
    assert_eq!(restarted.current().as_deref(), Some("DURABLE"));
}

#[tokio::test]
async fn remote_outage_falls_back_to_file_and_reloads_from_it() {
    let remote = Arc::new(MemoryBackend::default());
    let file = Arc::new(MemoryBackend::default());
    let backends = StateBackends::new(Some(remote.clone()), file.clone());

    let slot = VideoSlot::new(backends.clone());
    remote.fail_writes(true);
    assert_eq!(slot.set("DURING_OUTAGE").await, SaveOutcome::FellBack(BackendKind::Memory));
    assert_eq!(remote.raw(), None);

    let restarted = VideoSlot::new(backends);
    restarted.load().await;
    assert_eq!(restarted.current().as_deref(), Some("DURING_OUTAGE"));
}

#[tokio::test]
async fn outage_write_outlives_older_remote_value() {
    let remote = Arc::new(MemoryBackend::default());
    let file = Arc::new(MemoryBackend::default());
    let backends = StateBackends::new(Some(remote.clone()), file.clone());

    let slot = VideoSlot::new(backends.clone());
    assert_eq!(slot.set("OLD").await, SaveOutcome::Persisted(BackendKind::Memory));

    remote.fail_writes(true);
    let outcome = slot.set("NEW").await;
    assert_eq!(outcome, SaveOutcome::FellBack(BackendKind::Memory));
    assert!(outcome.is_durable());
    assert!(remote.raw().is_some_and(|raw| raw.contains("OLD")));

    let restarted = VideoSlot::new(backends);
    restarted.load().await;
    assert_eq!(restarted.current().as_deref(), Some("NEW"));
}

#[tokio::test]
async fn clear_during_outage_survives_restart() {
    let remote = Arc::new(MemoryBackend::default());
    let file = Arc::new(MemoryBackend::default());
    let backends = StateBackends::new(Some(remote.clone()), file.clone());

    let slot = VideoSlot::new(backends.clone());
    slot.set("OLD").await;

    remote.fail_writes(true);
    assert!(slot.clear().await.is_durable());

    let restarted = VideoSlot::new(backends);
    restarted.load().await;
    assert_eq!(restarted.current(), None);
}

#[tokio::test]
async fn recovered_remote_wins_over_stale_file() {
    let remote = Arc::new(MemoryBackend::default());
    let file = Arc::new(MemoryBackend::default());
    let backends = StateBackends::new(Some(remote.clone()), file.clone());

    let slot = VideoSlot::new(backends.clone());
    remote.fail_writes(true);
    slot.set("DURING_OUTAGE").await;

    remote.fail_writes(false);
    assert_eq!(slot.set("AFTER").await, SaveOutcome::Persisted(BackendKind::Memory));
    assert!(file.raw().is_some_and(|raw| raw.contains("DURING_OUTAGE")));

    let restarted = VideoSlot::new(backends);
    restarted.load().await;
    assert_eq!(restarted.current().as_deref(), Some("AFTER"));
}

#[tokio::test]
async fn unreadable_backends_load_empty() {
    let remote = Arc::new(MemoryBackend::with_value(r#"{"video_reference":"X"}"#));
    let file = Arc::new(MemoryBackend::with_value(r#"{"video_reference":"Y"}"#));
    remote.fail_reads(true);
    file.fail_reads(true);

    let slot = VideoSlot::new(StateBackends::new(Some(remote), file));
    slot.load().await;
    assert_eq!(slot.current(), None);
}

#[tokio::test]
async fn state_is_stored_as_json_document() -> anyhow::Result<()> {
    let backend = Arc::new(MemoryBackend::default());
    slot_over(&backend).set("DOC").await;

    let raw = backend
        .get(VIDEO_STATE_KEY)
        .await?
        .ok_or_else(|| anyhow::anyhow!("nothing written"))?;
    let doc: serde_json::Value = serde_json::from_str(&raw)?;
    assert_eq!(doc["video_reference"], "DOC");
    assert!(doc["stored_at"].is_string());
    Ok(())
}
