use super::*;
use crate::resources::lookup;
use crate::store::PageRequest;
use serde_json::json;

fn row(value: Value) -> Row {
    crate::store::into_row(value)
}

fn deals() -> &'static ResourceDef {
    lookup("deals").expect("deals registered")
}

async fn seed_deals(store: &MemoryStore, titles: &[(&str, &str)]) -> Vec<String> {
    let mut ids = Vec::new();
    for (title, stage) in titles {
        let inserted = store.insert(deals(), row(json!({"title": title, "stage": stage}))).await.unwrap();
        ids.push(inserted["id"].as_str().unwrap().to_owned());
    }
    ids
}

#[tokio::test]
async fn insert_generates_id_and_timestamps() {
    let store = MemoryStore::new();
    let inserted = store
        .insert(deals(), row(json!({"id": "client-chosen", "title": "Renewal"})))
        .await
        .unwrap();

    let id = inserted["id"].as_str().unwrap();
    assert_ne!(id, "client-chosen");
    assert!(Uuid::parse_str(id).is_ok());
    assert!(inserted["created_at"].is_string());
    assert!(inserted["updated_at"].is_string());
}

#[tokio::test]
async fn insert_keeps_explicit_created_at() {
    let store = MemoryStore::new();
    let inserted = store
        .insert(deals(), row(json!({"title": "Old", "created_at": "2020-01-01T00:00:00Z"})))
        .await
        .unwrap();
    assert_eq!(inserted["created_at"], json!("2020-01-01T00:00:00Z"));
}

#[tokio::test]
async fn insert_client_id_resource_requires_unique_id() {
    let store = MemoryStore::new();
    let users = lookup("users").unwrap();

    let missing = store.insert(users, row(json!({"email": "a@example.com"}))).await;
    assert!(matches!(missing, Err(StoreError::Invalid(_))));

    let created = store.insert(users, row(json!({"id": "auth|1", "email": "a@example.com"}))).await.unwrap();
    assert_eq!(created["id"], json!("auth|1"));

    let duplicate = store.insert(users, row(json!({"id": "auth|1"}))).await;
    assert!(matches!(duplicate, Err(StoreError::Invalid(_))));
}

#[tokio::test]
async fn list_returns_newest_first() {
    let store = MemoryStore::new();
    let contacts = lookup("contacts").unwrap();
    for name in ["first", "second", "third"] {
        store.insert(contacts, row(json!({"first_name": name}))).await.unwrap();
    }

    let page = store.list(contacts, &ListQuery::default()).await.unwrap();
    let names = page.rows.iter().map(|r| r["first_name"].as_str().unwrap()).collect::<Vec<_>>();
    assert_eq!(names, vec!["third", "second", "first"]);
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn list_of_untouched_table_is_empty() {
    let store = MemoryStore::new();
    let page = store.list(deals(), &ListQuery::default()).await.unwrap();
    assert!(page.rows.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn list_orders_by_position_before_recency() {
    let store = MemoryStore::new();
    let ids = seed_deals(&store, &[("a", "New"), ("b", "New"), ("c", "New")]).await;
    store.reorder(deals(), &[ids[0].clone(), ids[1].clone()]).await.unwrap();

    let query = ListQuery { by_position: true, ..ListQuery::default() };
    let page = store.list(deals(), &query).await.unwrap();
    let titles = page.rows.iter().map(|r| r["title"].as_str().unwrap()).collect::<Vec<_>>();
    assert_eq!(titles, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn list_ignores_position_unless_asked() {
    let store = MemoryStore::new();
    let ids = seed_deals(&store, &[("a", "New"), ("b", "New"), ("c", "New")]).await;
    store.reorder(deals(), &[ids[0].clone(), ids[1].clone()]).await.unwrap();

    let page = store.list(deals(), &ListQuery::default()).await.unwrap();
    let titles = page.rows.iter().map(|r| r["title"].as_str().unwrap()).collect::<Vec<_>>();
    assert_eq!(titles, vec!["c", "b", "a"]);
}

#[tokio::test]
async fn list_orders_by_created_at_not_insertion() {
    let store = MemoryStore::new();
    let contacts = lookup("contacts").unwrap();
    store.insert(contacts, row(json!({"first_name": "fresh"}))).await.unwrap();
    store
        .insert(contacts, row(json!({"first_name": "backdated", "created_at": "2020-01-01T00:00:00Z"})))
        .await
        .unwrap();
    store
        .insert(contacts, row(json!({"first_name": "older", "created_at": "2019-06-01T12:00:00+02:00"})))
        .await
        .unwrap();

    let page = store.list(contacts, &ListQuery::default()).await.unwrap();
    let names = page.rows.iter().map(|r| r["first_name"].as_str().unwrap()).collect::<Vec<_>>();
    assert_eq!(names, vec!["fresh", "backdated", "older"]);
}

#[tokio::test]
async fn list_applies_filters_search_and_paging() {
    let store = MemoryStore::new();
    seed_deals(
        &store,
        &[("Alpha renewal", "New"), ("Beta upsell", "New"), ("Gamma renewal", "Won"), ("Delta renewal", "New")],
    )
    .await;

    let query = ListQuery {
        filters: vec![("stage", "New".into())],
        search: Some("RENEWAL".into()),
        page: Some(PageRequest { page: 1, limit: 1 }),
        by_position: false,
    };
    let page = store.list(deals(), &query).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0]["title"], json!("Delta renewal"));

    let second = ListQuery { page: Some(PageRequest { page: 2, limit: 1 }), ..query.clone() };
    let page = store.list(deals(), &second).await.unwrap();
    assert_eq!(page.rows[0]["title"], json!("Alpha renewal"));

    let past_end = ListQuery { page: Some(PageRequest { page: 3, limit: 1 }), ..query };
    assert!(store.list(deals(), &past_end).await.unwrap().rows.is_empty());
}

#[tokio::test]
async fn filters_compare_numbers_by_text() {
    let store = MemoryStore::new();
    let leads = lookup("leads").unwrap();
    store.insert(leads, row(json!({"score": 40}))).await.unwrap();
    store.insert(leads, row(json!({"score": 90}))).await.unwrap();

    let query = ListQuery { filters: vec![("score", "90".into())], ..ListQuery::default() };
    assert_eq!(store.list(leads, &query).await.unwrap().total, 1);
}

#[tokio::test]
async fn update_merges_patch_and_stamps_updated_at() {
    let store = MemoryStore::new();
    let inserted = store
        .insert(deals(), row(json!({"title": "Deal", "stage": "New", "updated_at": "2000-01-01T00:00:00Z"})))
        .await
        .unwrap();
    let id = inserted["id"].as_str().unwrap();

    let updated = store.update(deals(), id, row(json!({"stage": "Won"}))).await.unwrap().unwrap();
    assert_eq!(updated["stage"], json!("Won"));
    assert_eq!(updated["title"], json!("Deal"));
    assert_ne!(updated["updated_at"], json!("2000-01-01T00:00:00Z"));

    let fetched = store.get(deals(), id).await.unwrap().unwrap();
    assert_eq!(fetched["stage"], json!("Won"));
}

#[tokio::test]
async fn update_missing_row_is_none() {
    let store = MemoryStore::new();
    assert!(store.update(deals(), "nope", Row::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_removes_row_once() {
    let store = MemoryStore::new();
    let ids = seed_deals(&store, &[("a", "New")]).await;

    assert!(store.delete(deals(), &ids[0]).await.unwrap());
    assert!(!store.delete(deals(), &ids[0]).await.unwrap());
    assert!(store.get(deals(), &ids[0]).await.unwrap().is_none());
}

#[tokio::test]
async fn count_by_groups_and_skips_nulls() {
    let store = MemoryStore::new();
    seed_deals(&store, &[("a", "New"), ("b", "New"), ("c", "Won")]).await;
    store.insert(deals(), row(json!({"title": "stageless"}))).await.unwrap();

    let counts = store.count_by(deals(), "stage", &ListQuery::default()).await.unwrap();
    assert_eq!(counts.get("New"), Some(&2));
    assert_eq!(counts.get("Won"), Some(&1));
    assert_eq!(counts.len(), 2);
}

#[tokio::test]
async fn count_by_honours_search() {
    let store = MemoryStore::new();
    seed_deals(&store, &[("acme", "New"), ("globex", "New"), ("acme two", "Won")]).await;

    let query = ListQuery { search: Some("acme".into()), ..ListQuery::default() };
    let counts = store.count_by(deals(), "stage", &query).await.unwrap();
    assert_eq!(counts.get("New"), Some(&1));
    assert_eq!(counts.get("Won"), Some(&1));
}

#[tokio::test]
async fn reorder_skips_unknown_ids_and_rejects_unordered_resources() {
    let store = MemoryStore::new();
    let ids = seed_deals(&store, &[("a", "New"), ("b", "New")]).await;

    let touched = store.reorder(deals(), &[ids[1].clone(), "ghost".into(), ids[0].clone()]).await.unwrap();
    assert_eq!(touched, 2);
    let b = store.get(deals(), &ids[1]).await.unwrap().unwrap();
    assert_eq!(b["position"], json!(0));
    let a = store.get(deals(), &ids[0]).await.unwrap().unwrap();
    assert_eq!(a["position"], json!(2));

    let contacts = lookup("contacts").unwrap();
    assert!(matches!(store.reorder(contacts, &ids).await, Err(StoreError::Invalid(_))));
}
