use std::time::{Duration, Instant};

use docsync::error::ErrorKind;
use docsync::pipeline::{Pipeline, PipelineStatus};
use docsync::store::memory::MemoryDocumentStore;
use docsync::test_utils::faulty_store::FaultyStore;
use docsync::test_utils::messages::{insert, item_row, owner_row, update, with_owner};
use docsync::test_utils::notifying_store::NotifyingStore;
use docsync::transport::channel::ChannelTransport;
use docsync_telemetry::tracing::init_test_tracing;
use serde_json::json;

use crate::common::{drain, pipeline_config, send_all, start_pipeline, wait_for_stats};

#[tokio::test(flavor = "multi_thread")]
async fn changes_of_one_owner_are_applied_in_order_test() {
    init_test_tracing();

    let store = MemoryDocumentStore::new();
    let (pipeline, sender) = start_pipeline(pipeline_config(4), store.clone()).await;

    let mut messages = vec![insert("users", owner_row(1, "v0"))];
    for version in 1..50 {
        messages.push(update("users", json!({ "id": 1, "name": format!("v{version}") })));
    }
    for item_id in 1..=20 {
        messages.push(insert(
            "projects",
            with_owner(item_row(item_id, "item", "item", ""), 1),
        ));
    }
    send_all(&sender, messages).await;
    let stats = drain(pipeline, sender).await;

    let document = store.document(1).await.unwrap();
    assert_eq!(document.name, "v49");
    assert_eq!(
        document.items.iter().map(|item| item.id).collect::<Vec<_>>(),
        (1..=20).collect::<Vec<_>>()
    );
    assert_eq!(stats.applied, 70);
    assert_eq!(stats.failed, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn owners_are_spread_over_partitions_test() {
    init_test_tracing();

    let store = MemoryDocumentStore::new();
    let (pipeline, sender) = start_pipeline(pipeline_config(4), store.clone()).await;
    let monitor = pipeline.monitor().unwrap();

    send_all(
        &sender,
        (1..=8).map(|owner_id| insert("users", owner_row(owner_id, "owner"))),
    )
    .await;
    drain(pipeline, sender).await;

    assert_eq!(store.documents().await.len(), 8);
    assert_eq!(monitor.applied_per_partition(), vec![2, 2, 2, 2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn undecodable_messages_are_dropped_test() {
    init_test_tracing();

    let store = MemoryDocumentStore::new();
    let (pipeline, sender) = start_pipeline(pipeline_config(2), store.clone()).await;

    send_all(
        &sender,
        [
            "not json".to_string(),
            insert("invoices", json!({ "id": 1 })),
            insert("users", json!({ "id": "one" })),
            insert("users", owner_row(1, "Alice")),
        ],
    )
    .await;
    let stats = drain(pipeline, sender).await;

    assert_eq!(stats.received, 4);
    assert_eq!(stats.dropped, 3);
    assert_eq!(stats.applied, 1);
    assert_eq!(store.document(1).await.unwrap().name, "Alice");
}

#[tokio::test(flavor = "multi_thread")]
async fn store_failure_only_affects_its_change_test() {
    init_test_tracing();

    let store = FaultyStore::wrap(MemoryDocumentStore::new());
    store.fail_writes_for(1);
    let (pipeline, sender) = start_pipeline(pipeline_config(1), store.clone()).await;

    send_all(
        &sender,
        [
            insert("users", owner_row(1, "Alice")),
            insert("users", owner_row(2, "Bob")),
            insert("projects", with_owner(item_row(20, "Proj", "proj", ""), 2)),
        ],
    )
    .await;
    let stats = drain(pipeline, sender).await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.applied, 2);
    assert!(store.wrapped().document(1).await.is_none());
    assert_eq!(store.wrapped().document(2).await.unwrap().items.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_drains_queued_changes_test() {
    init_test_tracing();

    let store = FaultyStore::wrap(MemoryDocumentStore::new());
    store.delay_writes(Duration::from_millis(10));
    let notifying = NotifyingStore::wrap(store);
    let (pipeline, sender) = start_pipeline(pipeline_config(1), notifying.clone()).await;
    let monitor = pipeline.monitor().unwrap();

    send_all(
        &sender,
        (1..=20).map(|owner_id| insert("users", owner_row(owner_id, "owner"))),
    )
    .await;
    let first_write = notifying.wait_for_writes(1).await;
    first_write.notified().await;

    pipeline.shutdown_and_wait().await.unwrap();

    // Every change that reached the router was applied, none were abandoned mid-queue.
    let stats = monitor.stats();
    assert_eq!(stats.routed, stats.received);
    assert_eq!(stats.applied + stats.failed, stats.routed);
    assert_eq!(notifying.writes().await, stats.applied);
    drop(sender);
}

#[tokio::test(flavor = "multi_thread")]
async fn drain_timeout_forces_workers_to_stop_test() {
    init_test_tracing();

    let store = FaultyStore::wrap(MemoryDocumentStore::new());
    store.delay_writes(Duration::from_secs(5));
    let mut config = pipeline_config(1);
    config.shutdown_drain_timeout_ms = 50;
    let (pipeline, sender) = start_pipeline(config, store.clone()).await;
    let monitor = pipeline.monitor().unwrap();

    send_all(
        &sender,
        (1..=5).map(|owner_id| insert("users", owner_row(owner_id, "owner"))),
    )
    .await;
    wait_for_stats(&monitor, |stats| stats.routed >= 1).await;

    let started = Instant::now();
    pipeline.shutdown_and_wait().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(monitor.stats().applied, 0);
    drop(sender);
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_is_guarded_and_stop_is_idempotent_test() {
    init_test_tracing();

    let (transport, _sender) = ChannelTransport::new(8);
    let mut pipeline = Pipeline::new(pipeline_config(2), MemoryDocumentStore::new(), transport);
    assert_eq!(pipeline.status(), PipelineStatus::Created);
    assert!(pipeline.stats().is_none());

    pipeline.start().await.unwrap();
    assert_eq!(pipeline.status(), PipelineStatus::Running);

    let err = pipeline.start().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    pipeline.shutdown();
    pipeline.shutdown();
    assert!(!pipeline.shutdown_tx().shutdown());
    assert_eq!(pipeline.status(), PipelineStatus::Stopped);

    pipeline.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn stopped_pipeline_cannot_start_test() {
    init_test_tracing();

    let (transport, _sender) = ChannelTransport::new(8);
    let mut pipeline = Pipeline::new(pipeline_config(1), MemoryDocumentStore::new(), transport);

    pipeline.shutdown();
    let err = pipeline.start().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(pipeline.status(), PipelineStatus::Stopped);
    // A pipeline that never started has nothing to wait for.
    pipeline.wait().await.unwrap();
}
