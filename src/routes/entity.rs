//! Entity routes built from the planned rule table.
//! Every planned pattern is mounted once; the rule itself is picked by `RouteTable::find`,
//! so the first planned rule for a verb and path serves the request.

use super::Verb;
use crate::error::AppError;
use crate::handlers::entity::dispatch;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{Method, Uri},
    response::Response,
    routing::any,
    Router,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

async fn handle(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    params: Option<Path<HashMap<String, String>>>,
    Query(pairs): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let routes = Arc::clone(&state.routes);
    let rule = Verb::from_method(method.as_str())
        .and_then(|verb| routes.find(verb, uri.path()))
        .ok_or_else(|| AppError::MethodNotAllowed(format!("{} {}", method, uri.path())))?;
    let params = params.map(|Path(p)| p).unwrap_or_default();
    dispatch(state, rule, params, pairs, body).await
}

pub fn entity_routes(state: AppState) -> Router {
    let mut seen = HashSet::new();
    let router = state
        .routes
        .rules()
        .iter()
        .filter(|rule| seen.insert(rule.pattern.as_str()))
        .fold(Router::new(), |router, rule| router.route(&rule.pattern, any(handle)));
    tracing::debug!(patterns = seen.len(), "entity routes mounted");
    router.with_state(state.clone())
}
