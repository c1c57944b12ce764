//! Example consumer: a separate Rust project that uses schema-rest as a dependency.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Without `DATABASE_URL` the API runs on the in-memory store.

use schema_rest::{app, load_from_dir, resolve, AppState, MemoryStore, PgStore, Settings, Store};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("schema_rest=info,example_consumer=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let config = load_from_dir(&settings.schema_config_path).await?;
    let model = resolve(&config)?;

    let store: Arc<dyn Store> = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.db_max_connections)
                .connect(url)
                .await?;
            tracing::info!("using PostgreSQL store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(model, store)?;
    tracing::info!(routes = state.routes.len(), "schema loaded");
    let router = app(state, &settings);

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("Example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router).await?;
    Ok(())
}
