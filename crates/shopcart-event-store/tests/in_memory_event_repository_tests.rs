//! Integration tests for `InMemoryEventRepository`.

use chrono::Utc;
use shopcart_core::error::DomainError;
use shopcart_core::repository::{EventRepository, StoredEvent};
use shopcart_event_store::in_memory_event_repository::InMemoryEventRepository;
use uuid::Uuid;

/// Helper to build a `StoredEvent` with sensible defaults.
fn make_stored_event(aggregate_id: &str, sequence_number: i64) -> StoredEvent {
    StoredEvent {
        event_id: Uuid::new_v4(),
        aggregate_id: aggregate_id.to_owned(),
        event_type: "TestEvent".to_string(),
        payload: serde_json::json!({"key": "value"}),
        sequence_number,
        correlation_id: Uuid::new_v4(),
        causation_id: Uuid::new_v4(),
        occurred_at: Utc::now(),
    }
}

// --- load_events ---

#[tokio::test]
async fn test_load_events_returns_empty_vec_for_nonexistent_aggregate() {
    let repo = InMemoryEventRepository::new();

    let events = repo.load_events("missing-cart").await.unwrap();

    assert!(events.is_empty());
}

// --- append_events + load_events ---

#[tokio::test]
async fn test_append_and_load_single_event() {
    let repo = InMemoryEventRepository::new();
    let event = make_stored_event("C1", 1);
    let expected = event.clone();

    repo.append_events("C1", 0, &[event]).await.unwrap();

    let loaded = repo.load_events("C1").await.unwrap();
    assert_eq!(loaded, vec![expected]);
}

// --- ordering ---

#[tokio::test]
async fn test_append_multiple_events_preserves_sequence_order() {
    let repo = InMemoryEventRepository::new();
    let events = vec![
        make_stored_event("C1", 1),
        make_stored_event("C1", 2),
        make_stored_event("C1", 3),
    ];

    repo.append_events("C1", 0, &events).await.unwrap();

    let loaded = repo.load_events("C1").await.unwrap();
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded[0].sequence_number, 1);
    assert_eq!(loaded[1].sequence_number, 2);
    assert_eq!(loaded[2].sequence_number, 3);
}

// --- aggregate isolation ---

#[tokio::test]
async fn test_aggregate_isolation() {
    let repo = InMemoryEventRepository::new();

    repo.append_events("C1", 0, &[make_stored_event("C1", 1)])
        .await
        .unwrap();
    repo.append_events("C2", 0, &[make_stored_event("C2", 1)])
        .await
        .unwrap();

    let loaded_a = repo.load_events("C1").await.unwrap();
    let loaded_b = repo.load_events("C2").await.unwrap();

    assert_eq!(loaded_a.len(), 1);
    assert_eq!(loaded_b.len(), 1);
    assert_eq!(loaded_a[0].aggregate_id, "C1");
    assert_eq!(loaded_b[0].aggregate_id, "C2");
    assert_eq!(repo.event_count().unwrap(), 2);
}

// --- concurrency ---

#[tokio::test]
async fn test_concurrency_conflict_on_duplicate_sequence_number() {
    let repo = InMemoryEventRepository::new();

    // First append succeeds.
    repo.append_events("C1", 0, &[make_stored_event("C1", 1)])
        .await
        .unwrap();

    // Second append from the same stale version should fail.
    let result = repo
        .append_events("C1", 0, &[make_stored_event("C1", 1)])
        .await;

    match result {
        Err(DomainError::ConcurrencyConflict {
            aggregate_id,
            expected,
            actual,
        }) => {
            assert_eq!(aggregate_id, "C1");
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stale_expected_version_with_non_overlapping_sequences() {
    let repo = InMemoryEventRepository::new();

    repo.append_events(
        "C1",
        0,
        &[make_stored_event("C1", 1), make_stored_event("C1", 2)],
    )
    .await
    .unwrap();

    // Sequence numbers don't collide, but the version check must still reject.
    let result = repo
        .append_events(
            "C1",
            0,
            &[make_stored_event("C1", 3), make_stored_event("C1", 4)],
        )
        .await;

    match result {
        Err(DomainError::ConcurrencyConflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 2);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
    assert_eq!(repo.load_events("C1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_sequential_appends_with_correct_expected_version() {
    let repo = InMemoryEventRepository::new();

    repo.append_events(
        "C1",
        0,
        &[make_stored_event("C1", 1), make_stored_event("C1", 2)],
    )
    .await
    .unwrap();
    repo.append_events(
        "C1",
        2,
        &[make_stored_event("C1", 3), make_stored_event("C1", 4)],
    )
    .await
    .unwrap();

    let loaded = repo.load_events("C1").await.unwrap();
    assert_eq!(loaded.len(), 4);
    for (i, event) in loaded.iter().enumerate() {
        assert_eq!(event.sequence_number, i64::try_from(i + 1).unwrap());
    }
}

// --- malformed batches ---

#[tokio::test]
async fn test_append_rejects_gap_in_sequence_numbers() {
    let repo = InMemoryEventRepository::new();

    let result = repo
        .append_events("C1", 0, &[make_stored_event("C1", 2)])
        .await;

    assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    assert!(repo.load_events("C1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_append_rejects_event_for_other_aggregate() {
    let repo = InMemoryEventRepository::new();

    let result = repo
        .append_events("C1", 0, &[make_stored_event("C2", 1)])
        .await;

    assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    assert_eq!(repo.event_count().unwrap(), 0);
}

#[tokio::test]
async fn test_append_empty_events_is_noop() {
    let repo = InMemoryEventRepository::new();

    repo.append_events("C1", 0, &[]).await.unwrap();

    let loaded = repo.load_events("C1").await.unwrap();
    assert!(loaded.is_empty());
}

// --- delivery feed ---

#[tokio::test]
async fn test_feed_replays_history_then_delivers_live_events_in_commit_order() {
    let repo = InMemoryEventRepository::new();
    let first = make_stored_event("C1", 1);
    let second = make_stored_event("C2", 1);
    let third = make_stored_event("C1", 2);
    repo.append_events("C1", 0, std::slice::from_ref(&first))
        .await
        .unwrap();

    let mut feed = repo.subscribe().unwrap();
    repo.append_events("C2", 0, std::slice::from_ref(&second))
        .await
        .unwrap();
    repo.append_events("C1", 1, std::slice::from_ref(&third))
        .await
        .unwrap();

    assert_eq!(feed.recv().await.unwrap(), first);
    assert_eq!(feed.recv().await.unwrap(), second);
    assert_eq!(feed.recv().await.unwrap(), third);
    assert!(feed.try_recv().is_err());
}

#[tokio::test]
async fn test_rejected_append_is_not_delivered() {
    let repo = InMemoryEventRepository::new();
    let mut feed = repo.subscribe().unwrap();
    repo.append_events("C1", 0, &[make_stored_event("C1", 1)])
        .await
        .unwrap();

    let _ = repo
        .append_events("C1", 0, &[make_stored_event("C1", 1)])
        .await;

    assert!(feed.recv().await.is_some());
    assert!(feed.try_recv().is_err());
}

#[tokio::test]
async fn test_dropped_feed_does_not_block_appends() {
    let repo = InMemoryEventRepository::new();
    let feed = repo.subscribe().unwrap();
    drop(feed);

    repo.append_events("C1", 0, &[make_stored_event("C1", 1)])
        .await
        .unwrap();

    assert_eq!(repo.event_count().unwrap(), 1);
}
