//! Shared application state for all routes. Model and route plan are built once and read-only afterwards.

use crate::config::ResolvedModel;
use crate::error::ConfigError;
use crate::routes::{plan, RouteTable};
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub model: Arc<ResolvedModel>,
    pub routes: Arc<RouteTable>,
}

impl AppState {
    /// Plan routes for `model`. Fails on alias or path collisions.
    pub fn new(model: ResolvedModel, store: Arc<dyn Store>) -> Result<Self, ConfigError> {
        let routes = plan(&model)?;
        Ok(AppState {
            store,
            model: Arc::new(model),
            routes: Arc::new(routes),
        })
    }
}
