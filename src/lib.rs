//! schema-rest: a REST surface derived from a relational schema description.

pub mod config;
pub mod error;
pub mod handlers;
pub mod query;
pub mod resolver;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_from_dir, resolve, FullConfig, ResolvedEntity, ResolvedModel};
pub use error::{AppError, ConfigError, StoreError};
pub use query::{compile, QueryDescriptor};
pub use response::Range;
pub use routes::{app, common_routes, common_routes_with_ready, entity_routes, plan, RouteRule, RouteTable, Verb};
pub use service::CrudService;
pub use settings::Settings;
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Store};
