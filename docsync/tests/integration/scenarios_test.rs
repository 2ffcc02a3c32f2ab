use docsync::query::QueryService;
use docsync::store::memory::MemoryDocumentStore;
use docsync::test_utils::messages::{
    delete, insert, item_row, item_tag_row, owner_item_row, owner_row, tag_row, update,
    with_item, with_owner,
};
use docsync::types::{Document, Item, Tag};
use docsync_telemetry::tracing::init_test_tracing;
use serde_json::json;

use crate::common::{drain, pipeline_config, send_all, start_pipeline};

fn alice_messages() -> Vec<String> {
    vec![
        insert("users", owner_row(1, "Alice")),
        insert(
            "projects",
            with_owner(item_row(10, "Proj", "p-slug", "desc"), 1),
        ),
        insert("hashtags", with_item(tag_row(100, "go"), 10)),
    ]
}

fn alice_document() -> Document {
    Document {
        id: 1,
        name: "Alice".to_string(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
        items: vec![Item {
            id: 10,
            name: "Proj".to_string(),
            slug: "p-slug".to_string(),
            description: "desc".to_string(),
            created_at: "2024-01-02T00:00:00Z".to_string(),
            tags: vec![Tag {
                id: 100,
                name: "go".to_string(),
                created_at: "2024-01-03T00:00:00Z".to_string(),
            }],
        }],
    }
}

async fn mirror(messages: Vec<String>) -> MemoryDocumentStore {
    let store = MemoryDocumentStore::new();
    let (pipeline, sender) = start_pipeline(pipeline_config(4), store.clone()).await;

    send_all(&sender, messages).await;
    drain(pipeline, sender).await;

    store
}

#[tokio::test(flavor = "multi_thread")]
async fn inserts_build_nested_document_test() {
    init_test_tracing();

    let store = mirror(alice_messages()).await;

    assert_eq!(store.documents().await, vec![alice_document()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn item_update_only_touches_item_fields_test() {
    init_test_tracing();

    let mut messages = alice_messages();
    messages.push(update("projects", json!({ "id": 10, "name": "Proj2" })));
    let store = mirror(messages).await;

    let mut expected = alice_document();
    expected.items[0].name = "Proj2".to_string();
    assert_eq!(store.document(1).await, Some(expected));
}

#[tokio::test(flavor = "multi_thread")]
async fn tag_delete_prunes_tag_and_keeps_item_test() {
    init_test_tracing();

    let mut messages = alice_messages();
    messages.push(delete("hashtags", json!({ "id": 100 })));
    let store = mirror(messages).await;

    let document = store.document(1).await.unwrap();
    assert_eq!(document.items.len(), 1);
    assert_eq!(document.items[0].id, 10);
    assert!(document.items[0].tags.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn item_delete_keeps_owner_document_test() {
    init_test_tracing();

    let mut messages = alice_messages();
    messages.push(delete("projects", json!({ "id": 10 })));
    let store = mirror(messages).await;

    let document = store.document(1).await.unwrap();
    assert_eq!(document.name, "Alice");
    assert!(document.items.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn fuzzy_prefix_match_on_name_outranks_description_match_test() {
    init_test_tracing();

    let mut messages = alice_messages();
    messages.push(insert("users", owner_row(2, "Bob")));
    messages.push(insert(
        "projects",
        with_owner(item_row(20, "Zeta", "zeta", "a pro tool"), 2),
    ));
    let store = mirror(messages).await;

    let results = QueryService::new(store).fuzzy_search("Pro").await.unwrap();

    let owners = results
        .iter()
        .map(|result| result.document.id)
        .collect::<Vec<_>>();
    assert_eq!(owners, vec![1, 2]);
    assert!(results[0].score > results[1].score);
}

#[tokio::test(flavor = "multi_thread")]
async fn redelivered_inserts_are_idempotent_test() {
    init_test_tracing();

    let mut messages = alice_messages();
    messages.extend(alice_messages());
    let store = mirror(messages).await;

    assert_eq!(store.documents().await, vec![alice_document()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn redelivered_join_attaches_are_idempotent_test() {
    init_test_tracing();

    let attaches = [
        insert("user_projects", owner_item_row(1, 10)),
        insert("project_hashtags", item_tag_row(10, 100)),
    ];
    let mut messages = alice_messages();
    messages.extend(attaches.clone());
    messages.push(update(
        "projects",
        json!({ "id": 10, "description": "new desc" }),
    ));
    messages.extend(attaches);
    let store = mirror(messages).await;

    let mut expected = alice_document();
    expected.items[0].description = "new desc".to_string();
    assert_eq!(store.documents().await, vec![expected]);
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_update_keeps_other_fields_test() {
    init_test_tracing();

    let mut messages = alice_messages();
    messages.push(update(
        "projects",
        json!({ "id": 10, "description": "new desc" }),
    ));
    let store = mirror(messages).await;

    let mut expected = alice_document();
    expected.items[0].description = "new desc".to_string();
    assert_eq!(store.document(1).await, Some(expected));
}

#[tokio::test(flavor = "multi_thread")]
async fn deletes_of_absent_entities_change_nothing_test() {
    init_test_tracing();

    let mut messages = alice_messages();
    messages.push(delete("hashtags", json!({ "id": 999 })));
    messages.push(delete("projects", json!({ "id": 999 })));
    messages.push(delete("users", json!({ "id": 999 })));
    let store = mirror(messages).await;

    assert_eq!(store.documents().await, vec![alice_document()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn owner_delete_removes_document_test() {
    init_test_tracing();

    let mut messages = alice_messages();
    messages.push(delete("users", json!({ "id": 1 })));
    let store = mirror(messages).await;

    assert!(store.documents().await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn disjoint_items_commute_test() {
    init_test_tracing();

    let first = insert("projects", with_owner(item_row(10, "A", "a", "first"), 1));
    let second = insert("projects", with_owner(item_row(20, "B", "b", "second"), 1));
    let rename_first = update("projects", json!({ "id": 10, "name": "A2" }));
    let rename_second = update("projects", json!({ "id": 20, "name": "B2" }));

    let store = mirror(vec![
        insert("users", owner_row(1, "Alice")),
        first.clone(),
        second.clone(),
        rename_first.clone(),
        rename_second.clone(),
    ])
    .await;
    let swapped = mirror(vec![
        insert("users", owner_row(1, "Alice")),
        first,
        second,
        rename_second,
        rename_first,
    ])
    .await;

    assert_eq!(store.documents().await, swapped.documents().await);
    let names = store.document(1).await.unwrap().items.into_iter().map(|item| item.name).collect::<Vec<_>>();
    assert_eq!(names, vec!["A2", "B2"]);
}
