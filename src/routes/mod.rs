//! Route planning and mounting.

pub mod common;
pub mod entity;
pub mod planner;

pub use common::{common_routes, common_routes_with_ready};
pub use entity::entity_routes;
pub use planner::{plan, PathShape, RouteRule, RouteTable, Verb, RESERVED_SEGMENTS};

use crate::settings::Settings;
use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Full application router: common routes plus every planned entity route, with a body size limit.
pub fn app(state: AppState, settings: &Settings) -> Router {
    Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .merge(entity_routes(state))
        .layer(RequestBodyLimitLayer::new(settings.max_body_bytes))
}
