use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use grocer_agent::Readiness;
use grocer_db::DbPool;
use serde::Serialize;
use serde_json::{json, Value};

use crate::routes::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub agents: Readiness,
    pub database: HealthCheck,
    pub checked_at: String,
}

/// Liveness probe used by the hosting runtime.
pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "Healthy" }))
}

/// Agent flags report what has been built so far; only the database gates
/// the status code, since agents are built on first invocation.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "healthy" } else { "degraded" },
        agents: state.agents.readiness(),
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
