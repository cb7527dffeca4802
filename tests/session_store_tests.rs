// Integration tests for session bookkeeping
//
// These tests verify that the in-memory store hands out one shared session
// per user, keeps the streaming flag consistent and evicts idle sessions.

use anyhow::Result;
use radio_recorder::{InMemorySessionStore, SessionSnapshot, SessionStore};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_get_or_create_returns_shared_session() -> Result<()> {
    let store = InMemorySessionStore::new();

    assert!(store.get("alice").await.is_none());
    assert!(store.is_empty().await);

    let first = store.get_or_create("alice").await;
    let second = store.get_or_create("alice").await;
    let looked_up = store.get("alice").await.expect("session exists");

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &looked_up));
    assert_eq!(first.user_id(), "alice");
    assert_eq!(store.len().await, 1);

    store.get_or_create("bob").await;
    assert_eq!(store.len().await, 2);

    Ok(())
}

#[tokio::test]
async fn test_new_session_is_idle() -> Result<()> {
    let store = InMemorySessionStore::new();
    let session = store.get_or_create("carol").await;

    assert_eq!(session.snapshot(), SessionSnapshot::default());

    Ok(())
}

#[tokio::test]
async fn test_stream_flag_is_idempotent() -> Result<()> {
    let store = InMemorySessionStore::new();
    let session = store.get_or_create("dave").await;

    assert!(session.start_stream().await, "first start raises the flag");
    assert!(!session.start_stream().await, "second start reports already active");

    // Mutations are visible through any lookup
    let again = store.get("dave").await.expect("session exists");
    assert!(again.snapshot().is_streaming);

    assert!(again.stop_stream().await);
    assert!(!again.stop_stream().await, "flag already lowered");
    assert!(!session.snapshot().is_streaming);

    Ok(())
}

#[tokio::test]
async fn test_snapshot_serializes_camel_case() -> Result<()> {
    let snapshot = SessionSnapshot {
        is_recording: true,
        is_streaming: false,
        recording_file: Some("erin_1700000000000.mp3".to_string()),
    };

    let json = serde_json::to_value(&snapshot)?;
    assert_eq!(json["isRecording"], true);
    assert_eq!(json["isStreaming"], false);
    assert_eq!(json["recordingFile"], "erin_1700000000000.mp3");

    let idle = serde_json::to_value(SessionSnapshot::default())?;
    assert!(idle.get("recordingFile").is_none());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_evict_idle_keeps_recently_seen_sessions() -> Result<()> {
    let store = InMemorySessionStore::new();
    store.get_or_create("old").await;
    store.get_or_create("touched").await;

    tokio::time::advance(Duration::from_secs(30)).await;
    // Any lookup refreshes the session
    store.get("touched").await;
    store.get_or_create("new").await;

    tokio::time::advance(Duration::from_secs(20)).await;

    let evicted = store.evict_idle(Duration::from_secs(40)).await;
    let evicted: Vec<&str> = evicted.iter().map(|session| session.user_id()).collect();

    assert_eq!(evicted, vec!["old"]);
    assert_eq!(store.len().await, 2);
    assert!(store.get("old").await.is_none());

    Ok(())
}

#[tokio::test]
async fn test_remove_and_drain() -> Result<()> {
    let store = InMemorySessionStore::new();
    for user in ["a", "b", "c"] {
        store.get_or_create(user).await;
    }

    let removed = store.remove("b").await.expect("session exists");
    assert_eq!(removed.user_id(), "b");
    assert!(store.remove("b").await.is_none());

    let mut drained: Vec<String> = store
        .drain()
        .await
        .iter()
        .map(|session| session.user_id().to_string())
        .collect();
    drained.sort();

    assert_eq!(drained, vec!["a", "c"]);
    assert!(store.is_empty().await);

    Ok(())
}

#[tokio::test]
async fn test_snapshot_reads_last_released_state() -> Result<()> {
    let store = InMemorySessionStore::new();
    let session = store.get_or_create("frank").await;

    let mut state = session.lock().await;
    state.stream_active = true;
    // Readable while the lock is held, showing the state before this change
    assert!(!session.snapshot().is_streaming);

    drop(state);
    assert!(session.snapshot().is_streaming);

    Ok(())
}
