//! Demo server: serves the sample Westeros schema from `example_consumer/config` on the in-memory
//! store, seeded with a few rows.
//!
//! Run: `cargo run --example server`, then `curl 'localhost:3000/house?_include=["members"]'`.

use schema_rest::config::ResolvedModel;
use schema_rest::service::Repository;
use schema_rest::{app, load_from_dir, resolve, AppState, MemoryStore, Settings, Store};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

async fn seed(model: &ResolvedModel, store: &dyn Store) -> Result<(), Box<dyn std::error::Error>> {
    let repo = Repository::new(store);
    let entity = |name: &str| model.entity(name).ok_or_else(|| format!("missing entity {}", name));
    let rows = |v: serde_json::Value| v.as_array().cloned().unwrap_or_default();

    for house in rows(json!([
        { "name": "Stark", "words": "Winter is Coming" },
        { "name": "Lannister", "words": "Hear Me Roar!" }
    ])) {
        if let serde_json::Value::Object(attrs) = house {
            repo.create(entity("house")?, &attrs).await?;
        }
    }
    for character in rows(json!([
        { "name": "Jon Snow", "house_id": 1 },
        { "name": "Arya Stark", "house_id": 1 },
        { "name": "Tyrion Lannister", "house_id": 2 }
    ])) {
        if let serde_json::Value::Object(attrs) = character {
            repo.create(entity("character")?, &attrs).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("schema_rest=debug".parse()?))
        .init();

    let settings = Settings {
        schema_config_path: "example_consumer/config".into(),
        bind_addr: "127.0.0.1:3000".parse()?,
        ..Settings::default()
    };
    let model = resolve(&load_from_dir(&settings.schema_config_path).await?)?;
    let store = Arc::new(MemoryStore::new());
    seed(&model, store.as_ref()).await?;

    let state = AppState::new(model, store)?;
    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state, &settings)).await?;
    Ok(())
}
