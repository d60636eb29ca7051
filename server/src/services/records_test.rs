use super::*;
use crate::resources::lookup;
use crate::store::MemoryStore;
use serde_json::json;

fn deals() -> &'static ResourceDef {
    lookup("deals").expect("deals registered")
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect()
}

async fn create_deal(store: &MemoryStore, title: &str, stage: &str) -> Row {
    create(store, deals(), json!({"title": title, "stage": stage})).await.unwrap()
}

#[test]
fn parse_list_query_without_paging_params_lists_everything() {
    let query = parse_list_query(deals(), &params(&[]), PageLimits::default()).unwrap();
    assert_eq!(query, ListQuery::default());
}

#[test]
fn parse_list_query_translates_filters_and_paging() {
    let query = parse_list_query(
        deals(),
        &params(&[("stage", "Won"), ("accountId", "a1"), ("page", "3"), ("search", " acme ")]),
        PageLimits::default(),
    )
    .unwrap();
    assert_eq!(query.filters, vec![("account_id", "a1".to_owned()), ("stage", "Won".to_owned())]);
    assert_eq!(query.search.as_deref(), Some("acme"));
    assert_eq!(query.page, Some(PageRequest { page: 3, limit: 20 }));
}

#[test]
fn parse_list_query_clamps_limit_and_page() {
    let limits = PageLimits { default_limit: 20, max_limit: 50 };
    let query = parse_list_query(deals(), &params(&[("page", "0"), ("limit", "999")]), limits).unwrap();
    assert_eq!(query.page, Some(PageRequest { page: 1, limit: 50 }));
}

#[test]
fn parse_list_query_rejects_bad_values() {
    let err = parse_list_query(deals(), &params(&[("page", "two")]), PageLimits::default()).unwrap_err();
    assert!(matches!(err, ResourceError::InvalidQuery { param: "page", .. }));

    let err = parse_list_query(deals(), &params(&[("color", "red")]), PageLimits::default()).unwrap_err();
    assert!(matches!(err, ResourceError::UnknownField(_)));
}

#[tokio::test]
async fn create_strips_client_id_and_returns_api_fields() {
    let store = MemoryStore::new();
    let created = create(
        &store,
        deals(),
        json!({"id": "mine", "title": "Renewal", "expectedCloseDate": "2026-03-01"}),
    )
    .await
    .unwrap();

    assert_ne!(created["id"], json!("mine"));
    assert_eq!(created["expectedCloseDate"], json!("2026-03-01"));
    assert!(created.contains_key("createdAt"));
    assert!(!created.contains_key("created_at"));
}

#[tokio::test]
async fn create_keeps_client_id_for_users() {
    let store = MemoryStore::new();
    let users = lookup("users").unwrap();
    let created = create(&store, users, json!({"id": "auth|42", "fullName": "Ada"})).await.unwrap();
    assert_eq!(created["id"], json!("auth|42"));
    assert_eq!(created["fullName"], json!("Ada"));
}

#[tokio::test]
async fn create_rejects_non_object_and_unknown_fields() {
    let store = MemoryStore::new();
    assert!(matches!(
        create(&store, deals(), json!([1, 2])).await,
        Err(ResourceError::InvalidBody(_))
    ));
    assert!(matches!(
        create(&store, deals(), json!({"bogus": true})).await,
        Err(ResourceError::UnknownField(_))
    ));
}

#[tokio::test]
async fn update_ignores_id_and_created_at() {
    let store = MemoryStore::new();
    let created = create_deal(&store, "Deal", "New").await;
    let id = created["id"].as_str().unwrap();

    let updated = update(
        &store,
        deals(),
        id,
        json!({"id": "other", "createdAt": "1999-01-01T00:00:00Z", "stage": "Won"}),
    )
    .await
    .unwrap();
    assert_eq!(updated["id"], json!(id));
    assert_eq!(updated["createdAt"], created["createdAt"]);
    assert_eq!(updated["stage"], json!("Won"));
}

#[tokio::test]
async fn get_update_delete_report_not_found() {
    let store = MemoryStore::new();
    assert!(matches!(get(&store, deals(), "ghost").await, Err(ResourceError::NotFound { .. })));
    assert!(matches!(
        update(&store, deals(), "ghost", json!({"stage": "Won"})).await,
        Err(ResourceError::NotFound { .. })
    ));
    assert!(matches!(delete(&store, deals(), "ghost").await, Err(ResourceError::NotFound { .. })));
}

#[tokio::test]
async fn list_page_reports_has_next() {
    let store = MemoryStore::new();
    for i in 0..5 {
        create_deal(&store, &format!("deal {i}"), "New").await;
    }
    let limits = PageLimits::default();

    let first = ListQuery { page: Some(PageRequest { page: 1, limit: 2 }), ..ListQuery::default() };
    let paged = list_page(&store, deals(), &first, limits).await.unwrap();
    assert_eq!(paged.data.len(), 2);
    assert_eq!(paged.pagination, Pagination { page: 1, limit: 2, total: 5, has_next: true });

    let last = ListQuery { page: Some(PageRequest { page: 3, limit: 2 }), ..ListQuery::default() };
    let paged = list_page(&store, deals(), &last, limits).await.unwrap();
    assert_eq!(paged.data.len(), 1);
    assert!(!paged.pagination.has_next);
}

#[tokio::test]
async fn list_page_serializes_camel_case_envelope() {
    let store = MemoryStore::new();
    create_deal(&store, "only", "New").await;
    let paged = list_page(&store, deals(), &ListQuery::default(), PageLimits::default()).await.unwrap();
    let json = serde_json::to_value(&paged).unwrap();
    assert_eq!(json["pagination"]["hasNext"], json!(false));
    assert_eq!(json["pagination"]["limit"], json!(20));
    assert_eq!(json["data"][0]["title"], json!("only"));
}

#[tokio::test]
async fn list_ignores_paging() {
    let store = MemoryStore::new();
    for i in 0..3 {
        create_deal(&store, &format!("deal {i}"), "New").await;
    }
    let query = ListQuery { page: Some(PageRequest { page: 1, limit: 1 }), ..ListQuery::default() };
    assert_eq!(list(&store, deals(), &query).await.unwrap().len(), 3);
}

#[tokio::test]
async fn list_stays_newest_first_after_reorder() {
    fn titles(rows: &[Row]) -> Vec<Value> {
        rows.iter().map(|r| r["title"].clone()).collect()
    }

    let store = MemoryStore::new();
    let older = create_deal(&store, "older", "New").await;
    let newer = create_deal(&store, "newer", "New").await;
    let ids = [older["id"].as_str().unwrap().to_owned(), newer["id"].as_str().unwrap().to_owned()];
    reorder(&store, deals(), &ids).await.unwrap();

    let listed = list(&store, deals(), &ListQuery::default()).await.unwrap();
    assert_eq!(titles(&listed), vec![json!("newer"), json!("older")]);

    let paged = list_page(&store, deals(), &ListQuery::default(), PageLimits::default()).await.unwrap();
    assert_eq!(titles(&paged.data), vec![json!("older"), json!("newer")]);
}

#[tokio::test]
async fn stage_counts_default_to_stage_column() {
    let store = MemoryStore::new();
    create_deal(&store, "a", "New").await;
    create_deal(&store, "b", "Won").await;
    create_deal(&store, "c", "Won").await;

    let counts = stage_counts(&store, deals(), None, &ListQuery::default()).await.unwrap();
    assert_eq!(counts.get("New"), Some(&1));
    assert_eq!(counts.get("Won"), Some(&2));
}

#[tokio::test]
async fn stage_counts_need_a_field_for_stageless_resources() {
    let store = MemoryStore::new();
    let contacts = lookup("contacts").unwrap();
    assert!(matches!(
        stage_counts(&store, contacts, None, &ListQuery::default()).await,
        Err(ResourceError::NoStageColumn("contacts"))
    ));
    assert!(stage_counts(&store, contacts, Some("accountId"), &ListQuery::default()).await.is_ok());
    assert!(matches!(
        stage_counts(&store, contacts, Some("nope"), &ListQuery::default()).await,
        Err(ResourceError::UnknownField(_))
    ));
}

#[tokio::test]
async fn reorder_requires_position_column() {
    let store = MemoryStore::new();
    let a = create_deal(&store, "a", "New").await;
    let ids = vec![a["id"].as_str().unwrap().to_owned()];

    assert_eq!(reorder(&store, deals(), &ids).await.unwrap(), 1);
    let accounts = lookup("accounts").unwrap();
    assert!(matches!(reorder(&store, accounts, &ids).await, Err(ResourceError::NotOrderable("accounts"))));
}
