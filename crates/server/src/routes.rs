use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use grocer_agent::AgentContext;
use grocer_db::DbPool;

use crate::{health, invocations, tools};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub agents: Arc<AgentContext>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::health))
        .route("/invocations", post(invocations::invoke))
        .route("/events/object-created", post(invocations::object_created))
        .route("/tools/orders", post(tools::orders))
        .route("/tools/catalog", post(tools::catalog))
        .with_state(state)
}
