//! Order tools published through the gateway: place, get and update orders.
//!
//! The gateway forwards tool arguments as the raw event, so the operation is
//! chosen from which keys are present.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use grocer_core::domain::order::{OrderId, OrderStatus, PlaceOrder};
use grocer_core::errors::{ApplicationError, DomainError};
use grocer_db::repositories::OrderRepository;

use crate::response::HandlerResponse;

#[derive(Clone, Debug, PartialEq)]
pub enum OrderRequest {
    Place(PlaceOrder),
    UpdateStatus { order_id: OrderId, status: OrderStatus },
    Get { order_id: OrderId },
}

impl OrderRequest {
    /// `Ok(None)` when the event matches no known operation.
    pub fn parse(event: &Map<String, Value>) -> Result<Option<Self>, DomainError> {
        if event.contains_key("customer_id") && event.contains_key("items") {
            return PlaceOrder::from_event(event).map(|order| Some(Self::Place(order)));
        }

        if event.contains_key("order_id") && event.contains_key("new_status") {
            let (Some(order_id), Some(status)) =
                (non_empty(event, "order_id"), non_empty(event, "new_status"))
            else {
                return Err(DomainError::Validation(
                    "order_id and new_status are required".to_string(),
                ));
            };
            return Ok(Some(Self::UpdateStatus {
                order_id: OrderId(order_id.to_string()),
                status: status.parse()?,
            }));
        }

        if event.contains_key("order_id") {
            let order_id = non_empty(event, "order_id")
                .ok_or_else(|| DomainError::Validation("order_id is required".to_string()))?;
            return Ok(Some(Self::Get { order_id: OrderId(order_id.to_string()) }));
        }

        Ok(None)
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Place(_) => "place_order",
            Self::UpdateStatus { .. } => "update_order_status",
            Self::Get { .. } => "get_order",
        }
    }
}

fn non_empty<'a>(event: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    event.get(key).and_then(Value::as_str).map(str::trim).filter(|value| !value.is_empty())
}

pub async fn handle(repository: &dyn OrderRepository, event: &Value) -> HandlerResponse {
    handle_at(repository, event, Utc::now()).await
}

pub async fn handle_at(
    repository: &dyn OrderRepository,
    event: &Value,
    at: DateTime<Utc>,
) -> HandlerResponse {
    let empty = Map::new();
    let fields = event.as_object().unwrap_or(&empty);

    let request = match OrderRequest::parse(fields) {
        Ok(Some(request)) => request,
        Ok(None) => {
            warn!(event_name = "handler.orders.unknown_shape", "unknown order tool event");
            return HandlerResponse::bad_request(json!({
                "error": "Invalid request format",
                "expected": "One of: place_order, get_order, update_order_status",
                "received_keys": fields.keys().collect::<Vec<_>>(),
            }));
        }
        Err(domain) => {
            warn!(event_name = "handler.orders.invalid", error = %domain, "order tool validation failed");
            return HandlerResponse::from_error(&ApplicationError::from(domain));
        }
    };

    let operation = request.operation();
    info!(event_name = "handler.orders.dispatch", operation, "order tool called");

    match execute(repository, request, at).await {
        Ok(body) => HandlerResponse::ok(body),
        Err(failure) => {
            error!(event_name = "handler.orders.failed", operation, error = %failure, "order tool failed");
            HandlerResponse::from_error(&failure)
        }
    }
}

async fn execute(
    repository: &dyn OrderRepository,
    request: OrderRequest,
    at: DateTime<Utc>,
) -> Result<Value, ApplicationError> {
    match request {
        OrderRequest::Place(place) => {
            let order = place.into_order(at);
            let confirmation = order.confirmation();
            info!(event_name = "handler.orders.placed", order_id = %order.id, "order placed");
            repository.save(order).await?;
            Ok(confirmation)
        }
        OrderRequest::Get { order_id } => Ok(match repository.find_by_id(&order_id).await? {
            Some(order) => order.to_json(),
            None => not_found(&order_id),
        }),
        OrderRequest::UpdateStatus { order_id, status } => {
            Ok(match repository.update_status(&order_id, status, at).await? {
                Some(order) => order.to_json(),
                None => not_found(&order_id),
            })
        }
    }
}

fn not_found(order_id: &OrderId) -> Value {
    info!(event_name = "handler.orders.not_found", order_id = %order_id, "order not found");
    json!({ "error": format!("Order {order_id} not found") })
}
