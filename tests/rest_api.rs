mod common;

use common::*;
use serde_json::{json, Value};

async fn seed_houses(app: &axum::Router, n: usize) {
    let houses: Vec<Value> = (0..n).map(|i| json!({ "name": format!("House {:02}", i) })).collect();
    let created = post(app, "/house", Value::Array(houses)).await;
    assert_eq!(created.status, 201);
}

#[tokio::test]
async fn default_page_is_twenty_rows_with_partial_content() {
    let app = router();
    seed_houses(&app, 25).await;

    let page = get(&app, "/house").await;
    assert_eq!(page.status, 206);
    assert_eq!(page.body.as_array().unwrap().len(), 20);
    assert_eq!(page.range(), Some("objects 0-20/25"));

    let tail = get(&app, "/house?_offset=20").await;
    assert_eq!(tail.status, 200);
    assert_eq!(tail.body.as_array().unwrap().len(), 5);
    assert_eq!(tail.range(), Some("objects 20-25/25"));
}

#[tokio::test]
async fn small_collections_are_complete() {
    let app = router();
    seed_houses(&app, 3).await;
    let page = get(&app, "/house").await;
    assert_eq!(page.status, 200);
    assert_eq!(page.range(), Some("objects 0-3/3"));

    let empty = get(&app, "/got/books").await;
    assert_eq!(empty.status, 200);
    assert_eq!(empty.body, json!([]));
    assert_eq!(empty.range(), Some("objects 0-0/0"));
}

#[tokio::test]
async fn offset_and_limit_window_the_result() {
    let app = router();
    seed_houses(&app, 25).await;

    let window = get(&app, "/house?_offset=5&_limit=10").await;
    assert_eq!(window.status, 206);
    assert_eq!(window.body.as_array().unwrap().len(), 10);
    assert_eq!(window.range(), Some("objects 5-15/25"));

    let past_end = get(&app, "/house?_offset=30").await;
    assert_eq!(past_end.status, 200);
    assert_eq!(past_end.body, json!([]));
    assert_eq!(past_end.range(), Some("objects 30-30/25"));
}

#[tokio::test]
async fn malformed_directives_are_rejected() {
    let app = router();
    let bad = get(&app, "/house?_limit=lots").await;
    assert_eq!(bad.status, 400);
    assert_eq!(bad.body["error"]["code"], "invalid_query");

    let bad_order = get(&app, &format!("/house?_order={}", enc("\"name\""))).await;
    assert_eq!(bad_order.status, 400);
}

#[tokio::test]
async fn unknown_query_keys_are_ignored() {
    let app = router();
    seed_houses(&app, 2).await;
    let page = get(&app, "/house?colour=grey&_cache=no").await;
    assert_eq!(page.status, 200);
    assert_eq!(page.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn array_post_preserves_input_order() {
    let app = router();
    let names = ["Tully", "Arryn", "Martell", "Greyjoy"];
    let body = Value::Array(names.iter().map(|n| json!({ "name": n })).collect());
    let created = post(&app, "/house", body).await;
    assert_eq!(created.status, 201);
    let rows = created.body.as_array().unwrap();
    assert_eq!(rows.len(), names.len());
    for (row, name) in rows.iter().zip(names) {
        assert_eq!(row["name"], name);
    }
}

#[tokio::test]
async fn filters_order_and_attributes() {
    let app = router();
    seed_houses(&app, 5).await;

    let one = get(&app, &format!("/house?name={}", enc("House 03"))).await;
    assert_eq!(one.body.as_array().unwrap().len(), 1);
    assert_eq!(one.range(), Some("objects 0-1/1"));

    let two = get(
        &app,
        &format!("/house?name%5B%5D={}&name%5B%5D={}", enc("House 01"), enc("House 02")),
    )
    .await;
    assert_eq!(two.body.as_array().unwrap().len(), 2);

    let ordered = get(&app, &format!("/house?_order={}", enc(r#"[["name","DESC"]]"#))).await;
    assert_eq!(ordered.body[0]["name"], "House 04");

    let names = get(&app, &format!("/house?_attributes={}", enc(r#"["name"]"#))).await;
    let first = names.body[0].as_object().unwrap();
    assert_eq!(first.len(), 1);
    assert!(first.contains_key("name"));

    let unknown = get(&app, &format!("/house?_attributes={}", enc(r#"["colour"]"#))).await;
    assert_eq!(unknown.status, 400);
    assert_eq!(unknown.body["error"]["code"], "unknown_field");
}

#[tokio::test]
async fn client_supplied_primary_key_is_ignored_on_post() {
    let app = router();
    let created = post(&app, "/house", json!({ "id": 999, "name": "Tyrell" })).await;
    assert_eq!(created.status, 201);
    assert_ne!(created.id(), 999);
    assert_eq!(get(&app, "/house/999").await.status, 404);
}

#[tokio::test]
async fn item_read_update_delete() {
    let app = router();
    let id = post(&app, "/house", json!({ "name": "Stark" })).await.id();

    let read = get(&app, &format!("/house/{}", id)).await;
    assert_eq!(read.status, 200);
    assert_eq!(read.body["name"], "Stark");

    let updated = put(&app, &format!("/house/{}", id), json!({ "words": "Winter is Coming" })).await;
    assert_eq!(updated.status, 200);
    assert_eq!(updated.body["words"], "Winter is Coming");
    assert_eq!(updated.body["name"], "Stark");

    assert_eq!(put(&app, "/house/999", json!({ "words": "?" })).await.status, 404);
    assert_eq!(delete(&app, "/house/999").await.status, 404);

    let deleted = delete(&app, &format!("/house/{}", id)).await;
    assert_eq!(deleted.status, 204);
    assert_eq!(deleted.body, Value::Null);
    assert_eq!(get(&app, &format!("/house/{}", id)).await.status, 404);
}

#[tokio::test]
async fn bad_ids_and_bodies_are_client_errors() {
    let app = router();
    assert_eq!(get(&app, "/house/abc").await.status, 400);
    assert_eq!(post(&app, "/house", json!({ "colour": "grey" })).await.status, 400);
    assert_eq!(post(&app, "/house", json!("Stark")).await.status, 400);
    let id = post(&app, "/house", json!({ "name": "Bolton" })).await.id();
    assert_eq!(put(&app, &format!("/house/{}", id), json!([{ "name": "x" }])).await.status, 400);
}

#[tokio::test]
async fn live_unique_conflict_is_409() {
    let app = router();
    post(&app, "/house", json!({ "name": "Stark", "words": "Winter is Coming" })).await;
    let dup = post(&app, "/house", json!({ "name": "Stark", "words": "?" })).await;
    assert_eq!(dup.status, 409);
    assert_eq!(dup.body["error"]["code"], "conflict");
    let rows = get(&app, &format!("/house?name={}", enc("Stark"))).await;
    assert_eq!(rows.body[0]["words"], "Winter is Coming");
}

#[tokio::test]
async fn grouping_counts_and_having() {
    let app = router();
    let stark = post(&app, "/house", json!({ "name": "Stark" })).await.id();
    let lannister = post(&app, "/house", json!({ "name": "Lannister" })).await.id();
    for (name, house) in [("Jon", stark), ("Arya", stark), ("Sansa", stark), ("Tyrion", lannister)] {
        post(&app, "/got/characters", json!({ "name": name, "house_id": house })).await;
    }

    let groups = get(&app, &format!("/got/characters?_group={}", enc(r#"["house_id"]"#))).await;
    assert_eq!(groups.status, 200);
    assert_eq!(groups.range(), Some("objects 0-2/2"));
    let total: u64 = groups
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["count"].as_u64().unwrap())
        .sum();
    assert_eq!(total, 4);

    let big = get(
        &app,
        &format!(
            "/got/characters?_group={}&_having={}",
            enc(r#"["house_id"]"#),
            enc(r#"{"count":{"$gt":1}}"#)
        ),
    )
    .await;
    assert_eq!(big.body.as_array().unwrap().len(), 1);
    assert_eq!(big.body[0]["house_id"], stark);
    assert_eq!(big.body[0]["count"], 3);
}

#[tokio::test]
async fn common_routes_respond() {
    let app = router();
    let health = get(&app, "/health").await;
    assert_eq!(health.status, 200);
    assert_eq!(health.body["status"], "ok");
    let ready = get(&app, "/ready").await;
    assert_eq!(ready.status, 200);
    assert_eq!(ready.body["store"], "ok");
    assert_eq!(get(&app, "/version").await.body["name"], "schema-rest");
}
