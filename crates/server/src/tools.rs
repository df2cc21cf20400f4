//! Gateway tool targets served in-process: the order tools and catalog
//! population handlers, backed by the application database.

use axum::{extract::State, http::StatusCode, Json};
use grocer_db::repositories::SqlOrderRepository;
use grocer_handlers::{catalog_population, order_tools, HandlerResponse};
use serde_json::Value;

use crate::routes::AppState;

pub async fn orders(
    State(state): State<AppState>,
    Json(event): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let repository = SqlOrderRepository::new(state.db_pool.clone());
    reply(order_tools::handle(&repository, &event).await)
}

pub async fn catalog(
    State(state): State<AppState>,
    Json(event): Json<Value>,
) -> (StatusCode, Json<Value>) {
    reply(catalog_population::handle_with_pool(&state.db_pool, &event).await)
}

fn reply(response: HandlerResponse) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use serde_json::json;

    use super::{catalog, orders};
    use crate::routes::testing;

    #[tokio::test]
    async fn catalog_route_populates_then_lists() {
        let state = testing::state().await;

        let (status, Json(body)) = catalog(State(state.clone()), Json(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["inserted"], 17);

        let (_, Json(listed)) =
            catalog(State(state), Json(json!({"operation": "select"}))).await;
        assert_eq!(listed["message"], "Retrieved 17 products");
    }

    #[tokio::test]
    async fn order_route_maps_handler_status_codes() {
        let state = testing::state().await;

        let (status, Json(body)) = orders(State(state.clone()), Json(json!({"sku": "X"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request format");

        let (status, Json(body)) =
            orders(State(state), Json(json!({"order_id": "ORD-MISSING"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "Order ORD-MISSING not found");
    }
}
