#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use schema_rest::{app, resolve, AppState, FullConfig, MemoryStore, Settings};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// house -< character (soft delete, unique name) >-< book, house -- sigil, character -> house.
pub fn westeros() -> FullConfig {
    FullConfig {
        schemas: serde_json::from_value(json!([{ "id": "main", "name": "public" }])).unwrap(),
        tables: serde_json::from_value(json!([
            { "id": "house", "name": "house", "primary_key": "id" },
            { "id": "sigil", "name": "sigil", "primary_key": "id" },
            { "id": "character", "name": "character", "primary_key": "id",
              "soft_delete": { "column": "deleted_at" } },
            { "id": "book", "name": "book", "primary_key": "id" },
            { "id": "character_book", "name": "character_book", "primary_key": "id",
              "unique": [["character_id", "book_id"]] }
        ]))
        .unwrap(),
        columns: serde_json::from_value(json!([
            { "id": "h1", "table_id": "house", "name": "id", "type": "serial", "nullable": false },
            { "id": "h2", "table_id": "house", "name": "name", "type": "text", "unique": true },
            { "id": "h3", "table_id": "house", "name": "words", "type": "text" },
            { "id": "s1", "table_id": "sigil", "name": "id", "type": "serial", "nullable": false },
            { "id": "s2", "table_id": "sigil", "name": "description", "type": "text" },
            { "id": "s3", "table_id": "sigil", "name": "house_id", "type": "integer", "unique": true },
            { "id": "c1", "table_id": "character", "name": "id", "type": "serial", "nullable": false },
            { "id": "c2", "table_id": "character", "name": "name", "type": "text", "unique": true },
            { "id": "c3", "table_id": "character", "name": "house_id", "type": "integer" },
            { "id": "c4", "table_id": "character", "name": "deleted_at", "type": "timestamptz" },
            { "id": "b1", "table_id": "book", "name": "id", "type": "serial", "nullable": false },
            { "id": "b2", "table_id": "book", "name": "title", "type": "text", "unique": true },
            { "id": "b3", "table_id": "book", "name": "year", "type": "integer" },
            { "id": "j1", "table_id": "character_book", "name": "id", "type": "serial", "nullable": false },
            { "id": "j2", "table_id": "character_book", "name": "character_id", "type": "integer" },
            { "id": "j3", "table_id": "character_book", "name": "book_id", "type": "integer" },
            { "id": "j4", "table_id": "character_book", "name": "pov", "type": "boolean", "default": false }
        ]))
        .unwrap(),
        relationships: serde_json::from_value(json!([
            { "id": "r1", "from_table_id": "house", "to_table_id": "character",
              "kind": "has_many", "alias": "members", "foreign_key": "house_id" },
            { "id": "r2", "from_table_id": "house", "to_table_id": "sigil",
              "kind": "has_one", "alias": "sigil", "foreign_key": "house_id" },
            { "id": "r3", "from_table_id": "character", "to_table_id": "house",
              "kind": "belongs_to", "alias": "house", "foreign_key": "house_id" },
            { "id": "r4", "from_table_id": "character", "to_table_id": "book",
              "kind": "many_to_many", "alias": "books",
              "through": { "table_id": "character_book", "owner_key": "character_id", "target_key": "book_id" } }
        ]))
        .unwrap(),
        api_entities: serde_json::from_value(json!([
            { "entity_id": "house", "path_segment": "house" },
            { "entity_id": "character", "path_segment": "characters", "namespace": "got" },
            { "entity_id": "book", "path_segment": "books", "namespace": "got" }
        ]))
        .unwrap(),
    }
}

pub fn router() -> Router {
    let model = resolve(&westeros()).unwrap();
    let state = AppState::new(model, Arc::new(MemoryStore::new())).unwrap();
    app(state, &Settings::default())
}

/// Percent-encode a querystring value.
pub fn enc(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn range(&self) -> Option<&str> {
        self.headers.get("x-range").and_then(|v| v.to_str().ok())
    }

    pub fn id(&self) -> i64 {
        self.body["id"].as_i64().unwrap()
    }
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply { status, headers, body }
}

pub async fn get(app: &Router, uri: &str) -> Reply {
    send(app, Method::GET, uri, None).await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> Reply {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put(app: &Router, uri: &str, body: Value) -> Reply {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: &Router, uri: &str) -> Reply {
    send(app, Method::DELETE, uri, None).await
}
