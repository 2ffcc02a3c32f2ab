use docsync::store::memory::MemoryDocumentStore;
use docsync::test_utils::faulty_store::FaultyStore;
use docsync::test_utils::messages::{
    delete, insert, item_row, item_tag_row, owner_item_row, owner_row, tag_row, update,
    with_owner,
};
use docsync::types::{Document, Item, Tag};
use docsync_telemetry::tracing::init_test_tracing;
use serde_json::json;

use crate::common::{drain, pipeline_config, send_all, start_pipeline};

fn shared_item_messages() -> Vec<String> {
    vec![
        insert("users", owner_row(1, "Alice")),
        insert("users", owner_row(2, "Bob")),
        insert(
            "projects",
            with_owner(item_row(10, "Shared", "shared", "common work"), 1),
        ),
        insert("user_projects", owner_item_row(2, 10)),
        insert("hashtags", tag_row(100, "rust")),
        insert("project_hashtags", item_tag_row(10, 100)),
    ]
}

#[tokio::test(flavor = "multi_thread")]
async fn shared_item_changes_reach_every_owner_test() {
    init_test_tracing();

    let store = MemoryDocumentStore::new();
    let (pipeline, sender) = start_pipeline(pipeline_config(4), store.clone()).await;

    let mut messages = shared_item_messages();
    messages.push(update("projects", json!({ "id": 10, "name": "Renamed" })));
    messages.push(update("hashtags", json!({ "id": 100, "name": "rustlang" })));
    send_all(&sender, messages).await;
    drain(pipeline, sender).await;

    for owner_id in [1, 2] {
        let document = store.document(owner_id).await.unwrap();
        assert_eq!(document.items.len(), 1, "owner {owner_id}");
        let item = &document.items[0];
        assert_eq!(item.name, "Renamed");
        // The attach row only carries ids, the attributes come from owner 1's copy.
        assert_eq!(item.slug, "shared");
        assert_eq!(item.tags.len(), 1);
        assert_eq!(item.tags[0].name, "rustlang");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn detach_only_affects_its_owner_test() {
    init_test_tracing();

    let store = MemoryDocumentStore::new();
    let (pipeline, sender) = start_pipeline(pipeline_config(4), store.clone()).await;

    let mut messages = shared_item_messages();
    messages.push(delete("user_projects", owner_item_row(2, 10)));
    messages.push(update("projects", json!({ "id": 10, "name": "Renamed" })));
    send_all(&sender, messages).await;
    drain(pipeline, sender).await;

    assert!(store.document(2).await.unwrap().items.is_empty());
    assert_eq!(store.document(1).await.unwrap().items[0].name, "Renamed");
}

#[tokio::test(flavor = "multi_thread")]
async fn tag_delete_reaches_every_owner_test() {
    init_test_tracing();

    let store = MemoryDocumentStore::new();
    let (pipeline, sender) = start_pipeline(pipeline_config(4), store.clone()).await;

    let mut messages = shared_item_messages();
    messages.push(delete("hashtags", json!({ "id": 100 })));
    send_all(&sender, messages).await;
    drain(pipeline, sender).await;

    for document in store.documents().await {
        assert!(!document.contains_tag(100), "owner {}", document.id);
        assert!(document.contains_item(10));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn documents_written_before_start_are_routed_through_the_store_test() {
    init_test_tracing();

    let store = MemoryDocumentStore::new();
    let mut item = Item::new(50);
    item.name = "Existing".to_string();
    item.tags.push(Tag::new(500));
    let mut document = Document::new(5);
    document.items.push(item);
    store.insert(document).await;

    let (pipeline, sender) = start_pipeline(pipeline_config(4), store.clone()).await;
    send_all(
        &sender,
        [
            update("projects", json!({ "id": 50, "name": "Updated" })),
            update("hashtags", json!({ "id": 500, "name": "tagged" })),
        ],
    )
    .await;
    let stats = drain(pipeline, sender).await;

    let item = store.document(5).await.unwrap().items.remove(0);
    assert_eq!(item.name, "Updated");
    assert_eq!(item.tags[0].name, "tagged");
    assert_eq!(stats.routed, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn changes_without_known_owner_are_dropped_test() {
    init_test_tracing();

    let store = MemoryDocumentStore::new();
    let (pipeline, sender) = start_pipeline(pipeline_config(2), store.clone()).await;

    send_all(
        &sender,
        [
            update("projects", json!({ "id": 70, "name": "Orphan" })),
            insert("hashtags", tag_row(700, "orphan")),
        ],
    )
    .await;
    let stats = drain(pipeline, sender).await;

    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.routed, 0);
    assert!(store.documents().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_owner_lookup_drops_only_that_change_test() {
    init_test_tracing();

    let store = FaultyStore::wrap(MemoryDocumentStore::new());
    store.fail_reads(true);
    let (pipeline, sender) = start_pipeline(pipeline_config(1), store.clone()).await;

    send_all(
        &sender,
        [update("projects", json!({ "id": 10, "name": "Lost" }))],
    )
    .await;
    let stats = drain(pipeline, sender).await;

    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.routed, 0);
    assert!(store.wrapped().documents().await.is_empty());
}

/// An owner document persisted by an earlier run, holding item 10 tagged with 100.
async fn persisted_store() -> MemoryDocumentStore {
    let store = MemoryDocumentStore::new();
    let mut item = Item::new(10);
    item.name = "Proj".to_string();
    item.slug = "p-slug".to_string();
    item.description = "desc".to_string();
    item.created_at = "2024-01-02T00:00:00Z".to_string();
    item.tags.push(Tag {
        id: 100,
        name: "go".to_string(),
        created_at: "2024-01-03T00:00:00Z".to_string(),
    });
    let mut document = Document::new(1);
    document.name = "Alice".to_string();
    document.items.push(item);
    store.insert(document).await;

    store
}

#[tokio::test(flavor = "multi_thread")]
async fn attach_after_partial_update_keeps_item_attributes_test() {
    init_test_tracing();

    let store = persisted_store().await;
    let (pipeline, sender) = start_pipeline(pipeline_config(4), store.clone()).await;

    send_all(
        &sender,
        [
            update("projects", json!({ "id": 10, "description": "new" })),
            insert("user_projects", owner_item_row(2, 10)),
            insert("user_projects", owner_item_row(1, 10)),
        ],
    )
    .await;
    drain(pipeline, sender).await;

    let existing = store.document(1).await.unwrap().items.remove(0);
    assert_eq!(existing.name, "Proj");
    assert_eq!(existing.slug, "p-slug");
    assert_eq!(existing.description, "new");
    assert_eq!(existing.tags.len(), 1);

    let attached = store.document(2).await.unwrap().items.remove(0);
    assert_eq!(attached.name, "Proj");
    assert_eq!(attached.slug, "p-slug");
    assert_eq!(attached.description, "new");
    assert_eq!(attached.created_at, "2024-01-02T00:00:00Z");
}

#[tokio::test(flavor = "multi_thread")]
async fn redelivered_tag_attach_keeps_tag_attributes_test() {
    init_test_tracing();

    let store = persisted_store().await;
    let (pipeline, sender) = start_pipeline(pipeline_config(4), store.clone()).await;

    send_all(
        &sender,
        [
            update("hashtags", json!({ "id": 100, "name": "golang" })),
            insert("project_hashtags", item_tag_row(10, 100)),
            insert("project_hashtags", item_tag_row(10, 100)),
        ],
    )
    .await;
    drain(pipeline, sender).await;

    let item = store.document(1).await.unwrap().items.remove(0);
    assert_eq!(item.name, "Proj");
    assert_eq!(
        item.tags,
        vec![Tag {
            id: 100,
            name: "golang".to_string(),
            created_at: "2024-01-03T00:00:00Z".to_string(),
        }]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn redelivered_attaches_of_persisted_entities_change_nothing_test() {
    init_test_tracing();

    let store = persisted_store().await;
    let before = store.documents().await;
    let (pipeline, sender) = start_pipeline(pipeline_config(4), store.clone()).await;

    send_all(
        &sender,
        [
            insert("user_projects", owner_item_row(1, 10)),
            insert("project_hashtags", item_tag_row(10, 100)),
        ],
    )
    .await;
    drain(pipeline, sender).await;

    assert_eq!(store.documents().await, before);
}
